//! Strata core
//!
//! Typed resource reconcilers and the declarative lifecycle that drives them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   strata CLI                     │
//! │         (plan / apply / refresh / destroy)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 strata-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Engine (plan → Plan → ApplyResult)      │   │
//! │  │   Registry<C> of DynReconciler<C>         │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ IdentityKey  │  │  State Mgmt  │            │
//! │  │ Attributes   │  │  Retry/Wait  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │ trait Reconciler<C>
//! ┌───────▼───────────────────────────────────────┐
//! │ strata-aws: stage, glue function, iam attach, │
//! │ appconfig profile, mskconnect plugin          │
//! └───────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod attribute;
pub mod engine;
pub mod error;
pub mod identity;
pub mod provider;
pub mod reconciler;
pub mod registry;
pub mod retry;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, ApplyResult, Plan, PlanSummary};
pub use attribute::{AttributeDiff, AttributeMode, AttributeSpec, Attributes, UpdatePolicy};
pub use engine::{Drift, DriftKind, Engine};
pub use error::{CloudError, ErrorKind, Result};
pub use identity::IdentityKey;
pub use provider::{AuthStatus, CloudProvider, ResourceConfig, ResourceSet};
pub use reconciler::{Converged, DataSource, Reconciler, converge};
pub use registry::{DynReconciler, PlannedChange, Registry};
pub use retry::{RetryConfig, WaitConfig, wait_until, with_retry};
pub use state::{
    GlobalState, ProviderState, ResourceState, ResourceStatus, StateLock, StateManager,
};
