//! Plan / apply / refresh / destroy / import lifecycle
//!
//! The engine owns the service client and a [`Registry`] of reconcilers.
//! Every declared resource is addressed by `type:name`; its identity key and
//! last observed attributes live in a [`ProviderState`].

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::attribute::{Attributes, normalize};
use crate::error::{CloudError, Result};
use crate::provider::{ResourceConfig, ResourceSet};
use crate::registry::{DynReconciler, Registry};
use crate::state::{ProviderState, ResourceState, ResourceStatus};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Mutex;
use std::time::Instant;

/// Difference between recorded and observed state found by a refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    pub address: String,
    pub resource_type: String,
    pub id: String,
    pub kind: DriftKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "attributes")]
pub enum DriftKind {
    /// The remote object no longer exists
    Vanished,
    /// The remote object exists but these attributes changed
    Changed(Vec<String>),
}

/// Result of one applied action, recorded into state by the caller
enum Outcome {
    Present {
        id: String,
        attributes: Attributes,
        created: bool,
    },
    /// Created but failed to settle, and the cleanup delete failed as well
    Stranded {
        id: String,
        attributes: Attributes,
        error: CloudError,
    },
    Removed,
    Unchanged,
}

/// Identity of an object created by the action in flight, before the engine
/// has recorded it
#[derive(Default)]
struct InFlight(Mutex<Option<String>>);

impl InFlight {
    fn set(&self, id: &str) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(id.to_string());
        }
    }

    fn take(&self) -> Option<String> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

pub struct Engine<C: ?Sized> {
    client: Box<C>,
    registry: Registry<C>,
}

impl<C> Engine<C>
where
    C: ?Sized + Send + Sync + 'static,
{
    pub fn new(client: Box<C>, registry: Registry<C>) -> Self {
        Self { client, registry }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn registry(&self) -> &Registry<C> {
        &self.registry
    }

    fn reconciler(&self, resource_type: &str) -> Result<&dyn DynReconciler<C>> {
        self.registry.get(resource_type)
    }

    /// Normalize an import string for a resource type
    pub fn parse_id(&self, resource_type: &str, raw: &str) -> Result<String> {
        self.reconciler(resource_type)?.parse_id(raw)
    }

    /// Calculate the actions that move `state` to `desired`
    pub async fn plan(&self, desired: &ResourceSet, state: &ProviderState) -> Result<Plan> {
        let mut actions = Vec::new();

        let mut declared: Vec<&ResourceConfig> = desired.iter().collect();
        declared.sort_by_key(|r| r.key());

        for resource in declared {
            let reconciler = self.reconciler(&resource.resource_type)?;
            let address = resource.key();
            let recorded = state.get(&address);

            let change = reconciler
                .plan(
                    self.client(),
                    recorded.map(|s| s.id.as_str()),
                    &resource.config,
                )
                .await?;

            // An entry left in error is re-read through an update even when
            // its attributes already match
            let action = match change.action {
                ActionType::NoOp
                    if recorded.is_some_and(|r| r.status == ResourceStatus::Error) =>
                {
                    ActionType::Update
                }
                other => other,
            };

            actions.push(
                Action::new(
                    action,
                    &resource.resource_type,
                    &address,
                    recorded.map(|s| s.id.clone()),
                )
                .with_diff(change.diff),
            );
        }

        for address in state.addresses() {
            if desired.get_by_key(&address).is_some() {
                continue;
            }
            if let Some(recorded) = state.get(&address) {
                actions.push(Action::new(
                    ActionType::Delete,
                    &recorded.resource_type,
                    &address,
                    Some(recorded.id.clone()),
                ));
            }
        }

        let plan = Plan::new(actions);
        tracing::debug!("Planned: {}", plan.summary());
        Ok(plan)
    }

    /// Apply a plan, recording every successful action into `state`.
    ///
    /// Failed actions are reported in the result; the remaining actions still run.
    pub async fn apply(
        &self,
        plan: &Plan,
        desired: &ResourceSet,
        state: &mut ProviderState,
    ) -> Result<ApplyResult> {
        self.apply_until(plan, desired, state, std::future::pending::<()>())
            .await
    }

    /// Apply a plan until `cancel` resolves.
    ///
    /// On cancellation every object created by this call is deleted
    /// (best effort) before [`CloudError::Cancelled`] is returned.
    pub async fn apply_until<F>(
        &self,
        plan: &Plan,
        desired: &ResourceSet,
        state: &mut ProviderState,
        cancel: F,
    ) -> Result<ApplyResult>
    where
        F: Future<Output = ()>,
    {
        let mut result = ApplyResult::new();
        let start = Instant::now();
        let mut created: Vec<String> = Vec::new();
        let in_flight = InFlight::default();
        tokio::pin!(cancel);

        for action in &plan.actions {
            if action.action_type == ActionType::NoOp {
                continue;
            }

            let prior_id = state.get(&action.resource_id).map(|s| s.id.clone());
            if let Some(recorded) = state.get_mut(&action.resource_id) {
                recorded.transition(match action.action_type {
                    ActionType::Update => ResourceStatus::Updating,
                    ActionType::Create => ResourceStatus::Creating,
                    _ => ResourceStatus::Deleting,
                });
            }

            in_flight.take();
            let step = self.apply_action(action, prior_id, desired, &in_flight);
            let outcome = tokio::select! {
                biased;
                _ = &mut cancel => {
                    tracing::warn!(
                        "Apply cancelled during {}; cleaning up {} created resource(s)",
                        action.id,
                        created.len()
                    );
                    if let Some(id) = in_flight.take() {
                        self.cleanup_unrecorded(&action.resource_type, &id).await;
                    }
                    self.cleanup(&created, state).await;
                    return Err(CloudError::Cancelled(format!(
                        "apply interrupted during {}",
                        action.id
                    )));
                }
                outcome = step => outcome,
            };

            match outcome {
                Ok(Outcome::Present {
                    id,
                    attributes,
                    created: is_new,
                }) => {
                    let mut entry = match state.remove(&action.resource_id) {
                        Some(mut existing) if !is_new => {
                            existing.id = id.clone();
                            existing.attributes = attributes;
                            existing
                        }
                        _ => ResourceState::new(&id, &action.resource_type)
                            .with_status(ResourceStatus::Creating)
                            .with_attributes(attributes),
                    };
                    entry.transition(ResourceStatus::Present);
                    state.add(action.resource_id.clone(), entry);
                    if is_new {
                        created.push(action.resource_id.clone());
                    }
                    result.add_success(
                        action.id.clone(),
                        format!("{} ({})", action.description, id),
                    );
                }
                Ok(Outcome::Stranded {
                    id,
                    attributes,
                    error,
                }) => {
                    tracing::warn!("{} left {} behind: {}", action.id, id, error);
                    let entry = ResourceState::new(&id, &action.resource_type)
                        .with_status(ResourceStatus::Error)
                        .with_attributes(attributes);
                    state.add(action.resource_id.clone(), entry);
                    created.push(action.resource_id.clone());
                    result.add_failure(action.id.clone(), error.to_string());
                }
                Ok(Outcome::Removed) => {
                    state.remove(&action.resource_id);
                    result.add_success(action.id.clone(), action.description.clone());
                }
                Ok(Outcome::Unchanged) => {}
                Err(e) => {
                    tracing::warn!("{} failed: {}", action.id, e);
                    if let Some(recorded) = state.get_mut(&action.resource_id) {
                        recorded.transition(ResourceStatus::Error);
                    }
                    result.add_failure(action.id.clone(), e.to_string());
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn apply_action(
        &self,
        action: &Action,
        prior_id: Option<String>,
        desired: &ResourceSet,
        in_flight: &InFlight,
    ) -> Result<Outcome> {
        let reconciler = self.reconciler(&action.resource_type)?;
        let config = || {
            desired
                .get_by_key(&action.resource_id)
                .map(|r| &r.config)
                .ok_or_else(|| {
                    CloudError::InvalidConfig(format!(
                        "{} is not declared",
                        action.resource_id
                    ))
                })
        };
        let recorded_id = || {
            prior_id.clone().ok_or_else(|| {
                CloudError::StateError(format!("{} has no recorded identity", action.resource_id))
            })
        };

        match action.action_type {
            ActionType::Create => self.create_settled(reconciler, config()?, in_flight).await,
            ActionType::Update => {
                let id = recorded_id()?;
                let attributes = reconciler.update(self.client(), &id, config()?).await?;
                Ok(Outcome::Present {
                    id,
                    attributes,
                    created: false,
                })
            }
            ActionType::Replace => {
                let id = recorded_id()?;
                reconciler.delete(self.client(), &id).await?;
                self.create_settled(reconciler, config()?, in_flight).await
            }
            ActionType::Delete => {
                let id = recorded_id()?;
                reconciler.delete(self.client(), &id).await?;
                Ok(Outcome::Removed)
            }
            ActionType::NoOp => Ok(Outcome::Unchanged),
        }
    }

    /// Create an object and finish it. An object that fails to settle is
    /// deleted again before the error is returned.
    async fn create_settled(
        &self,
        reconciler: &dyn DynReconciler<C>,
        config: &serde_json::Value,
        in_flight: &InFlight,
    ) -> Result<Outcome> {
        let (id, attributes) = reconciler.create(self.client(), config).await?;
        in_flight.set(&id);

        let error = match reconciler.settle(self.client(), &id, config).await {
            Ok(settled) => {
                return Ok(Outcome::Present {
                    id,
                    attributes: settled.unwrap_or(attributes),
                    created: true,
                });
            }
            Err(e) => e,
        };

        tracing::warn!(
            "{} {} was created but did not settle, deleting it: {}",
            reconciler.resource_type(),
            id,
            error
        );
        match reconciler.delete(self.client(), &id).await {
            Ok(()) => {
                in_flight.take();
                Err(error)
            }
            Err(e) => {
                tracing::warn!("Failed to delete {} {}: {}", reconciler.resource_type(), id, e);
                Ok(Outcome::Stranded {
                    id,
                    attributes,
                    error,
                })
            }
        }
    }

    /// Delete an object whose create was interrupted before it was recorded
    async fn cleanup_unrecorded(&self, resource_type: &str, id: &str) {
        let deleted = match self.reconciler(resource_type) {
            Ok(reconciler) => reconciler.delete(self.client(), id).await,
            Err(e) => Err(e),
        };
        match deleted {
            Ok(()) => tracing::info!("Cleaned up unrecorded {} {}", resource_type, id),
            Err(e) => tracing::warn!("Failed to clean up {} {}: {}", resource_type, id, e),
        }
    }

    async fn cleanup(&self, created: &[String], state: &mut ProviderState) {
        for address in created.iter().rev() {
            let Some(recorded) = state.get(address) else {
                continue;
            };
            let deleted = match self.reconciler(&recorded.resource_type) {
                Ok(reconciler) => reconciler.delete(self.client(), &recorded.id).await,
                Err(e) => Err(e),
            };
            match deleted {
                Ok(()) => {
                    tracing::info!("Cleaned up {} ({})", address, recorded.id);
                    state.remove(address);
                }
                Err(e) => tracing::warn!("Failed to clean up {}: {}", address, e),
            }
        }
    }

    /// Re-read every recorded resource and report drift.
    ///
    /// Vanished resources stay in state with status `Absent` so the next
    /// plan re-creates them.
    pub async fn refresh(&self, state: &mut ProviderState) -> Result<Vec<Drift>> {
        let mut drifts = Vec::new();

        for address in state.addresses() {
            let Some(recorded) = state.get_mut(&address) else {
                continue;
            };
            let reconciler = self.reconciler(&recorded.resource_type)?;

            match reconciler.read(self.client(), &recorded.id).await? {
                Some((id, attributes)) => {
                    let changed = changed_attributes(&recorded.attributes, &attributes);
                    if !changed.is_empty() {
                        drifts.push(Drift {
                            address: address.clone(),
                            resource_type: recorded.resource_type.clone(),
                            id: id.clone(),
                            kind: DriftKind::Changed(changed),
                        });
                    }
                    recorded.id = id;
                    recorded.attributes = attributes;
                    recorded.transition(ResourceStatus::Present);
                }
                None => {
                    tracing::warn!("{} ({}) no longer exists", address, recorded.id);
                    drifts.push(Drift {
                        address: address.clone(),
                        resource_type: recorded.resource_type.clone(),
                        id: recorded.id.clone(),
                        kind: DriftKind::Vanished,
                    });
                    recorded.transition(ResourceStatus::Absent);
                }
            }
        }

        Ok(drifts)
    }

    /// Delete one recorded resource. Already-absent objects count as deleted.
    pub async fn destroy(&self, address: &str, state: &mut ProviderState) -> Result<()> {
        let recorded = state
            .get_mut(address)
            .ok_or_else(|| CloudError::NotFound(format!("{} is not in state", address)))?;
        let reconciler = self.reconciler(&recorded.resource_type)?;

        recorded.transition(ResourceStatus::Deleting);
        let id = recorded.id.clone();

        let verified = match reconciler.delete(self.client(), &id).await {
            Ok(()) => match reconciler.read(self.client(), &id).await {
                Ok(None) => Ok(()),
                Ok(Some(_)) => Err(CloudError::Conflict(format!(
                    "{} ({}) still exists after delete",
                    address, id
                ))),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = verified {
            if let Some(recorded) = state.get_mut(address) {
                recorded.transition(ResourceStatus::Error);
            }
            return Err(e);
        }

        state.remove(address);
        tracing::info!("Destroyed {} ({})", address, id);
        Ok(())
    }

    /// Delete every recorded resource, in reverse address order
    pub async fn destroy_all(&self, state: &mut ProviderState) -> Result<ApplyResult> {
        let mut result = ApplyResult::new();
        let start = Instant::now();

        for address in state.addresses().into_iter().rev() {
            let action_id = format!("delete-{}", address);
            match self.destroy(&address, state).await {
                Ok(()) => result.add_success(action_id, format!("{} deleted", address)),
                Err(e) => result.add_failure(action_id, e.to_string()),
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Adopt an existing remote object under `address`
    pub async fn import(
        &self,
        resource_type: &str,
        name: &str,
        raw_id: &str,
        state: &mut ProviderState,
    ) -> Result<ResourceState> {
        let reconciler = self.reconciler(resource_type)?;
        let id = reconciler.parse_id(raw_id)?;
        let address = format!("{}:{}", resource_type, name);

        if let Some(existing) = state.get(&address) {
            return Err(CloudError::Conflict(format!(
                "{} is already managed as {}",
                address, existing.id
            )));
        }

        let (id, attributes) = reconciler
            .read(self.client(), &id)
            .await?
            .ok_or_else(|| {
                CloudError::NotFound("cannot import a non-existent object".into())
                    .for_resource(resource_type, &id)
            })?;

        let imported = ResourceState::new(&id, resource_type)
            .with_status(ResourceStatus::Present)
            .with_attributes(attributes);
        state.add(address.clone(), imported.clone());
        tracing::info!("Imported {} as {}", id, address);
        Ok(imported)
    }
}

fn changed_attributes(recorded: &Attributes, observed: &Attributes) -> Vec<String> {
    let mut names: Vec<String> = recorded
        .keys()
        .chain(observed.keys())
        .filter(|k| {
            let before = recorded.get(*k).map(normalize).unwrap_or_default();
            let after = observed.get(*k).map(normalize).unwrap_or_default();
            before != after
        })
        .cloned()
        .collect();
    names.sort();
    names.dedup();
    names
}
