//! AWS Identity and Access Management

pub mod user_policy_attachment;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_cloud::Result;

pub use user_policy_attachment::{
    UserPolicyAttachment, UserPolicyAttachmentConfig, UserPolicyAttachmentKey,
    UserPolicyAttachmentReconciler,
};

pub const NOT_FOUND_CODES: &[&str] = &["NoSuchEntity", "NoSuchEntityException"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedPolicy {
    pub policy_name: String,
    pub policy_arn: String,
}

#[async_trait]
pub trait IamApi: Send + Sync {
    /// Managed policies attached to `user_name`; fails when the user is unknown
    async fn list_attached_user_policies(&self, user_name: &str) -> Result<Vec<AttachedPolicy>>;

    async fn attach_user_policy(&self, user_name: &str, policy_arn: &str) -> Result<()>;

    async fn detach_user_policy(&self, user_name: &str, policy_arn: &str) -> Result<()>;
}
