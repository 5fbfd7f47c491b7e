//! Type-erased reconciler registry
//!
//! The engine works with declared configurations as JSON values and identity
//! keys as strings; [`Typed`] bridges those to a typed [`Reconciler`].

use crate::action::ActionType;
use crate::attribute::{AttributeDiff, Attributes};
use crate::error::{CloudError, Result};
use crate::identity::IdentityKey;
use crate::reconciler::Reconciler;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Planned change for one declared resource
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub action: ActionType,
    pub diff: AttributeDiff,
}

/// Reconciler operations over JSON configuration and string identities
#[async_trait]
pub trait DynReconciler<C: ?Sized + Sync>: Send + Sync {
    fn resource_type(&self) -> &'static str;

    /// Parse and normalize an import string
    fn parse_id(&self, raw: &str) -> Result<String>;

    /// Read the remote object; returns its normalized id and attributes
    async fn read(&self, client: &C, id: &str) -> Result<Option<(String, Attributes)>>;

    async fn plan(
        &self,
        client: &C,
        id: Option<&str>,
        desired: &serde_json::Value,
    ) -> Result<PlannedChange>;

    /// Issue the create call; returns the new identity and attributes
    async fn create(
        &self,
        client: &C,
        desired: &serde_json::Value,
    ) -> Result<(String, Attributes)>;

    /// Finish a create started by [`DynReconciler::create`]. `None` when there
    /// was nothing left to do.
    async fn settle(
        &self,
        client: &C,
        id: &str,
        desired: &serde_json::Value,
    ) -> Result<Option<Attributes>>;

    async fn update(
        &self,
        client: &C,
        id: &str,
        desired: &serde_json::Value,
    ) -> Result<Attributes>;

    async fn delete(&self, client: &C, id: &str) -> Result<()>;
}

/// Adapter exposing a typed reconciler as a [`DynReconciler`]
pub struct Typed<R, C: ?Sized> {
    inner: R,
    _client: PhantomData<fn(&C)>,
}

impl<R, C: ?Sized> Typed<R, C> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            _client: PhantomData,
        }
    }
}

impl<R, C> Typed<R, C>
where
    C: ?Sized + Sync,
    R: Reconciler<C>,
{
    fn desired(&self, value: &serde_json::Value) -> Result<R::Desired> {
        serde_json::from_value(value.clone()).map_err(|e| {
            CloudError::InvalidInput(format!(
                "invalid {} configuration: {}",
                self.inner.resource_type(),
                e
            ))
        })
    }

    fn key(&self, id: &str) -> Result<R::Key> {
        R::Key::parse(id)
    }
}

#[async_trait]
impl<R, C> DynReconciler<C> for Typed<R, C>
where
    C: ?Sized + Sync,
    R: Reconciler<C>,
{
    fn resource_type(&self) -> &'static str {
        self.inner.resource_type()
    }

    fn parse_id(&self, raw: &str) -> Result<String> {
        self.inner.import(raw).map(|key| key.to_id())
    }

    async fn read(&self, client: &C, id: &str) -> Result<Option<(String, Attributes)>> {
        let key = self.key(id)?;
        let remote = self
            .inner
            .find(client, &key)
            .await
            .map_err(|e| e.for_resource(self.resource_type(), id))?;
        Ok(remote.map(|r| (self.inner.key_of(&r).to_id(), self.inner.attributes(&r))))
    }

    async fn plan(
        &self,
        client: &C,
        id: Option<&str>,
        desired: &serde_json::Value,
    ) -> Result<PlannedChange> {
        let desired = self.desired(desired)?;
        let remote = match id {
            Some(id) => {
                let key = self.key(id)?;
                self.inner
                    .find(client, &key)
                    .await
                    .map_err(|e| e.for_resource(self.resource_type(), id))?
            }
            None => None,
        };

        let Some(remote) = remote else {
            if let Some(id) = id {
                tracing::info!(
                    "{} {} no longer exists, planning re-creation",
                    self.resource_type(),
                    id
                );
            }
            return Ok(PlannedChange {
                action: ActionType::Create,
                diff: AttributeDiff::default(),
            });
        };

        let diff = self.inner.diff(&remote, &desired);
        let action = if diff.is_empty() {
            ActionType::NoOp
        } else if diff.requires_replacement() {
            ActionType::Replace
        } else {
            ActionType::Update
        };
        Ok(PlannedChange { action, diff })
    }

    async fn create(
        &self,
        client: &C,
        desired: &serde_json::Value,
    ) -> Result<(String, Attributes)> {
        let desired = self.desired(desired)?;
        let (key, remote) = self.inner.create(client, &desired).await?;
        tracing::info!("Created {} {}", self.resource_type(), key.to_id());
        Ok((key.to_id(), self.inner.attributes(&remote)))
    }

    async fn settle(
        &self,
        client: &C,
        id: &str,
        desired: &serde_json::Value,
    ) -> Result<Option<Attributes>> {
        let desired = self.desired(desired)?;
        let key = self.key(id)?;
        let settled = self
            .inner
            .settle(client, &key, &desired)
            .await
            .map_err(|e| e.for_resource(self.resource_type(), id))?;
        Ok(settled.map(|remote| self.inner.attributes(&remote)))
    }

    async fn update(
        &self,
        client: &C,
        id: &str,
        desired: &serde_json::Value,
    ) -> Result<Attributes> {
        let desired = self.desired(desired)?;
        let key = self.key(id)?;
        let context = |e: CloudError| e.for_resource(self.resource_type(), id);

        let remote = self
            .inner
            .find(client, &key)
            .await
            .map_err(context)?
            .ok_or_else(|| context(CloudError::NotFound("object vanished before update".into())))?;

        let diff = self.inner.diff(&remote, &desired);
        if diff.is_empty() {
            return Ok(self.inner.attributes(&remote));
        }
        if diff.requires_replacement() {
            return Err(context(CloudError::InvalidInput(format!(
                "attributes {} cannot be updated in place",
                diff.names().join(", ")
            ))));
        }

        tracing::info!(
            "Updating {} {} ({})",
            self.resource_type(),
            id,
            diff.names().join(", ")
        );
        let remote = self
            .inner
            .update(client, &key, &desired, &diff)
            .await
            .map_err(context)?;
        Ok(self.inner.attributes(&remote))
    }

    async fn delete(&self, client: &C, id: &str) -> Result<()> {
        let key = self.key(id)?;
        self.inner.delete(client, &key).await
    }
}

/// Reconcilers indexed by resource type
pub struct Registry<C: ?Sized> {
    entries: BTreeMap<&'static str, Box<dyn DynReconciler<C>>>,
}

impl<C: ?Sized + Sync + 'static> Registry<C> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a typed reconciler under its resource type
    pub fn register<R>(&mut self, reconciler: R) -> &mut Self
    where
        R: Reconciler<C> + 'static,
    {
        let typed = Typed::new(reconciler);
        let resource_type = DynReconciler::<C>::resource_type(&typed);
        self.entries.insert(resource_type, Box::new(typed));
        self
    }

    pub fn with<R>(mut self, reconciler: R) -> Self
    where
        R: Reconciler<C> + 'static,
    {
        self.register(reconciler);
        self
    }

    pub fn get(&self, resource_type: &str) -> Result<&dyn DynReconciler<C>> {
        self.entries
            .get(resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| CloudError::UnsupportedResource(resource_type.to_string()))
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}

impl<C: ?Sized + Sync + 'static> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}
