//! AWS resources for Strata
//!
//! Reconcilers for five AWS resource types, two data sources, and the
//! clients they run against.
//!
//! # Resources
//!
//! | Type | Identity |
//! |------|----------|
//! | `aws_api_gateway_stage` | `rest_api_id/stage_name` |
//! | `aws_glue_user_defined_function` | `catalog_id/database_name/function_name` |
//! | `aws_iam_user_policy_attachment` | `user/policy_arn` |
//! | `aws_appconfig_configuration_profile` | `profile_id:application_id` |
//! | `aws_mskconnect_custom_plugin` | plugin ARN |
//!
//! # Clients
//!
//! - [`MemoryCloud`]: local sandbox with the real services' validation rules
//! - `SdkClients` (feature `sdk`): the official AWS SDK
//!
//! # Example
//!
//! ```ignore
//! use strata_aws::{AccountContext, AwsProvider, MemoryCloud};
//! use strata_cloud::CloudProvider;
//!
//! let settings = strata_config::load_settings()?;
//! let provider = AwsProvider::new(MemoryCloud::new(AccountContext::from(&settings)), settings);
//!
//! let plan = provider.plan(&desired, &state).await?;
//! provider.apply(&plan, &desired, &mut state).await?;
//! ```

pub mod apigateway;
pub mod appconfig;
pub mod client;
pub mod error;
pub mod glue;
pub mod iam;
pub mod kafkaconnect;
pub mod memory;
pub mod provider;
#[cfg(feature = "sdk")]
pub mod sdk;

pub use client::{AccountApi, AccountContext, AwsApi, CallerIdentity, retry_config, wait_config};
pub use error::{AwsError, Result};
pub use memory::MemoryCloud;
pub use provider::{AwsProvider, DATA_SOURCE_TYPES, registry};
#[cfg(feature = "sdk")]
pub use sdk::SdkClients;
