//! `aws_iam_user_policy_attachment`
//!
//! An attachment has no identity of its own: it exists while the policy
//! shows up in the user's attached policy list. Both attributes force
//! replacement.

use super::IamApi;
use crate::client::found;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use strata_cloud::{
    AttributeDiff, AttributeSpec, Attributes, CloudError, IdentityKey, Reconciler, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPolicyAttachmentKey {
    pub user: String,
    pub policy_arn: String,
}

impl IdentityKey for UserPolicyAttachmentKey {
    const RESOURCE_TYPE: &'static str = "aws_iam_user_policy_attachment";
    const ARITY: usize = 2;
    const TRAILING_REMAINDER: bool = true;

    fn parts(&self) -> Vec<&str> {
        vec![&self.user, &self.policy_arn]
    }

    fn from_parts(parts: Vec<String>) -> Self {
        let mut parts = parts.into_iter();
        Self {
            user: parts.next().unwrap_or_default(),
            policy_arn: parts.next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPolicyAttachmentConfig {
    pub user: String,
    pub policy_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPolicyAttachment {
    pub user: String,
    pub policy_arn: String,
}

static SCHEMA: &[AttributeSpec] = &[
    AttributeSpec::required("user").forces_replacement(),
    AttributeSpec::required("policy_arn").forces_replacement(),
];

#[derive(Debug, Default)]
pub struct UserPolicyAttachmentReconciler;

impl UserPolicyAttachmentReconciler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<C: IamApi + ?Sized> Reconciler<C> for UserPolicyAttachmentReconciler {
    type Key = UserPolicyAttachmentKey;
    type Desired = UserPolicyAttachmentConfig;
    type Remote = UserPolicyAttachment;

    fn schema(&self) -> &'static [AttributeSpec] {
        SCHEMA
    }

    fn desired_attributes(&self, desired: &UserPolicyAttachmentConfig) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("user".into(), json!(desired.user));
        attrs.insert("policy_arn".into(), json!(desired.policy_arn));
        attrs
    }

    fn attributes(&self, remote: &UserPolicyAttachment) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("user".into(), json!(remote.user));
        attrs.insert("policy_arn".into(), json!(remote.policy_arn));
        attrs
    }

    fn key_of(&self, remote: &UserPolicyAttachment) -> UserPolicyAttachmentKey {
        UserPolicyAttachmentKey {
            user: remote.user.clone(),
            policy_arn: remote.policy_arn.clone(),
        }
    }

    async fn find(
        &self,
        client: &C,
        key: &UserPolicyAttachmentKey,
    ) -> Result<Option<UserPolicyAttachment>> {
        // A missing user means the attachment is gone too
        let Some(policies) = found(client.list_attached_user_policies(&key.user).await)? else {
            return Ok(None);
        };

        Ok(policies
            .iter()
            .any(|p| p.policy_arn == key.policy_arn)
            .then(|| UserPolicyAttachment {
                user: key.user.clone(),
                policy_arn: key.policy_arn.clone(),
            }))
    }

    async fn create(
        &self,
        client: &C,
        desired: &UserPolicyAttachmentConfig,
    ) -> Result<(UserPolicyAttachmentKey, UserPolicyAttachment)> {
        client
            .attach_user_policy(&desired.user, &desired.policy_arn)
            .await?;
        tracing::debug!("Attached {} to user {}", desired.policy_arn, desired.user);

        let key = UserPolicyAttachmentKey {
            user: desired.user.clone(),
            policy_arn: desired.policy_arn.clone(),
        };
        let remote = UserPolicyAttachment {
            user: key.user.clone(),
            policy_arn: key.policy_arn.clone(),
        };
        Ok((key, remote))
    }

    async fn update(
        &self,
        _client: &C,
        key: &UserPolicyAttachmentKey,
        _desired: &UserPolicyAttachmentConfig,
        _diff: &AttributeDiff,
    ) -> Result<UserPolicyAttachment> {
        Err(CloudError::InvalidInput(format!(
            "policy attachment {} has no updatable attributes",
            key.to_id()
        )))
    }

    async fn delete_remote(&self, client: &C, key: &UserPolicyAttachmentKey) -> Result<()> {
        client.detach_user_policy(&key.user, &key.policy_arn).await
    }

    fn import(&self, raw: &str) -> Result<UserPolicyAttachmentKey> {
        let key = UserPolicyAttachmentKey::parse(raw)?;
        if !key.policy_arn.starts_with("arn:") {
            return Err(CloudError::InvalidImportId {
                resource_type: UserPolicyAttachmentKey::RESOURCE_TYPE,
                raw: raw.to_string(),
                reason: "expected <user>/<policy_arn>".to_string(),
            });
        }
        Ok(key)
    }
}
