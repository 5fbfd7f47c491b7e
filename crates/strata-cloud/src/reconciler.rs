//! Typed resource reconcilers
//!
//! A [`Reconciler`] maps one declarative resource type onto the remote API
//! calls of a service client `C`. The client is passed into every call;
//! reconcilers hold configuration only.

use crate::action::ActionType;
use crate::attribute::{self, AttributeDiff, AttributeSpec, Attributes};
use crate::error::Result;
use crate::identity::IdentityKey;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Create / read / update / delete / import logic for one resource type
#[async_trait]
pub trait Reconciler<C: ?Sized + Sync>: Send + Sync {
    /// Identity key addressing one remote object
    type Key: IdentityKey;

    /// Declared configuration
    type Desired: DeserializeOwned + Send + Sync;

    /// Remote object as reported by the service
    type Remote: Send + Sync;

    fn resource_type(&self) -> &'static str {
        <Self::Key as IdentityKey>::RESOURCE_TYPE
    }

    /// Attribute schema, including the update policy of every attribute
    fn schema(&self) -> &'static [AttributeSpec];

    /// Flatten the declared configuration into attributes
    fn desired_attributes(&self, desired: &Self::Desired) -> Attributes;

    /// Full observed attribute set of a remote object
    fn attributes(&self, remote: &Self::Remote) -> Attributes;

    /// Rebuild the identity key from the remote object's own fields
    fn key_of(&self, remote: &Self::Remote) -> Self::Key;

    /// Read the remote object; `None` when it does not exist
    async fn find(&self, client: &C, key: &Self::Key) -> Result<Option<Self::Remote>>;

    /// Issue the create call and derive the identity key.
    ///
    /// Work that can fail after the object exists belongs in [`Reconciler::settle`],
    /// so the caller learns the identity first.
    async fn create(
        &self,
        client: &C,
        desired: &Self::Desired,
    ) -> Result<(Self::Key, Self::Remote)>;

    /// Finish a create: wait for the object to become usable or apply
    /// settings the create call does not accept. `None` keeps the remote
    /// returned by `create`.
    async fn settle(
        &self,
        _client: &C,
        _key: &Self::Key,
        _desired: &Self::Desired,
    ) -> Result<Option<Self::Remote>> {
        Ok(None)
    }

    /// Apply in-place changes. Never called with a diff that requires replacement.
    async fn update(
        &self,
        client: &C,
        key: &Self::Key,
        desired: &Self::Desired,
        diff: &AttributeDiff,
    ) -> Result<Self::Remote>;

    /// Issue the delete call; may fail with a not-found error
    async fn delete_remote(&self, client: &C, key: &Self::Key) -> Result<()>;

    /// Delete the remote object. An object that is already gone is a success.
    async fn delete(&self, client: &C, key: &Self::Key) -> Result<()> {
        match self.delete_remote(client, key).await {
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "{} {} already absent, nothing to delete",
                    self.resource_type(),
                    key.to_id()
                );
                Ok(())
            }
            other => other.map_err(|e| e.for_resource(self.resource_type(), key.to_id())),
        }
    }

    /// Parse an import string into the identity key
    fn import(&self, raw: &str) -> Result<Self::Key> {
        Self::Key::parse(raw)
    }

    /// Changes needed to move `remote` to `desired`
    fn diff(&self, remote: &Self::Remote, desired: &Self::Desired) -> AttributeDiff {
        attribute::diff(
            self.schema(),
            &self.attributes(remote),
            &self.desired_attributes(desired),
        )
    }
}

/// Outcome of driving one object to its desired state
#[derive(Debug)]
pub struct Converged<K, R> {
    pub key: K,
    pub remote: R,
    pub action: ActionType,
}

/// Drive one object to its desired state.
///
/// `key` is the identity recorded by a previous apply, if any. An object that
/// vanished out of band is re-created rather than treated as an error.
pub async fn converge<C, R>(
    reconciler: &R,
    client: &C,
    key: Option<&R::Key>,
    desired: &R::Desired,
) -> Result<Converged<R::Key, R::Remote>>
where
    C: ?Sized + Sync,
    R: Reconciler<C>,
{
    let existing = match key {
        Some(key) => reconciler
            .find(client, key)
            .await
            .map_err(|e| e.for_resource(reconciler.resource_type(), key.to_id()))?
            .map(|remote| (key.clone(), remote)),
        None => None,
    };

    let Some((key, remote)) = existing else {
        let (key, remote) = create_settled(reconciler, client, desired).await?;
        tracing::info!("Created {} {}", reconciler.resource_type(), key.to_id());
        return Ok(Converged {
            key,
            remote,
            action: ActionType::Create,
        });
    };

    let diff = reconciler.diff(&remote, desired);
    if diff.is_empty() {
        return Ok(Converged {
            key,
            remote,
            action: ActionType::NoOp,
        });
    }

    if diff.requires_replacement() {
        tracing::info!(
            "Replacing {} {} ({})",
            reconciler.resource_type(),
            key.to_id(),
            diff.names().join(", ")
        );
        reconciler.delete(client, &key).await?;
        let (key, remote) = create_settled(reconciler, client, desired).await?;
        return Ok(Converged {
            key,
            remote,
            action: ActionType::Replace,
        });
    }

    tracing::info!(
        "Updating {} {} ({})",
        reconciler.resource_type(),
        key.to_id(),
        diff.names().join(", ")
    );
    let remote = reconciler
        .update(client, &key, desired, &diff)
        .await
        .map_err(|e| e.for_resource(reconciler.resource_type(), key.to_id()))?;
    Ok(Converged {
        key,
        remote,
        action: ActionType::Update,
    })
}

async fn create_settled<C, R>(
    reconciler: &R,
    client: &C,
    desired: &R::Desired,
) -> Result<(R::Key, R::Remote)>
where
    C: ?Sized + Sync,
    R: Reconciler<C>,
{
    let (key, remote) = reconciler.create(client, desired).await?;
    let settled = reconciler
        .settle(client, &key, desired)
        .await
        .map_err(|e| e.for_resource(reconciler.resource_type(), key.to_id()))?;
    Ok((key, settled.unwrap_or(remote)))
}

/// Read-only lookup against a service client
#[async_trait]
pub trait DataSource<C: ?Sized + Sync>: Send + Sync {
    type Query: DeserializeOwned + Send + Sync;
    type Output: Serialize + Send;

    fn data_source_type(&self) -> &'static str;

    async fn read(&self, client: &C, query: &Self::Query) -> Result<Self::Output>;
}
