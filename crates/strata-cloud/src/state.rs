//! Recorded state of managed resources
//!
//! Manages the `.strata/state.json` file which records the identity key and
//! last observed attributes of every managed resource.

use crate::attribute::Attributes;
use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
pub const DEFAULT_STATE_DIR: &str = ".strata";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_STAGING: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";
const STALE_LOCK_AFTER: Duration = Duration::from_secs(60 * 60);

/// Global state containing all provider states
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by provider:type:id
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, key: String, state: ResourceState) {
        self.resources.insert(key, state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, key: &str) -> Option<ResourceState> {
        let result = self.resources.remove(key);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Get a resource by key
    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    /// Extract the resources of one provider, keyed without the provider prefix
    pub fn provider_state(&self, provider: &str) -> ProviderState {
        let prefix = format!("{}:", provider);
        let mut state = ProviderState::new();
        for (key, resource) in &self.resources {
            if let Some(address) = key.strip_prefix(&prefix) {
                state.add(address.to_string(), resource.clone());
            }
        }
        state
    }

    /// Replace all resources of one provider
    pub fn set_provider_state(&mut self, provider: &str, state: &ProviderState) {
        let prefix = format!("{}:", provider);
        self.resources.retain(|k, _| !k.starts_with(&prefix));
        for (address, resource) in state.iter() {
            self.resources
                .insert(format!("{}{}", prefix, address), resource.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// State for a single provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderState {
    /// Resources managed by this provider
    pub resources: BTreeMap<String, ResourceState>,
}

impl ProviderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: String, state: ResourceState) {
        self.resources.insert(id, state);
    }

    pub fn get(&self, id: &str) -> Option<&ResourceState> {
        self.resources.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ResourceState> {
        self.resources.remove(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ResourceState> {
        self.resources.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResourceState)> {
        self.resources.iter()
    }

    /// Addresses in a stable order
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.resources.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Identity key of the remote object, in its import string form
    pub id: String,

    /// Resource type
    pub resource_type: String,

    /// Current status
    pub status: ResourceStatus,

    /// Last observed attributes
    pub attributes: Attributes,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Unknown,
            attributes: Attributes::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Move to a new lifecycle status, logging transitions the lifecycle
    /// does not expect
    pub fn transition(&mut self, next: ResourceStatus) {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                "Unexpected lifecycle transition for {} ({}): {} -> {}",
                self.resource_type,
                self.id,
                self.status,
                next
            );
        }
        self.status = next;
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Lifecycle status of a resource
///
/// `Absent -> Creating -> Present -> [Updating -> Present]* -> Deleting -> Absent`.
/// Any status may fall back to `Absent` when the object is deleted out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// No remote object exists
    Absent,
    /// Creation has been requested
    Creating,
    /// Remote object exists
    Present,
    /// An in-place update is in flight
    Updating,
    /// Deletion has been requested
    Deleting,
    /// Last operation failed
    Error,
    /// Status is unknown (e.g. freshly imported)
    Unknown,
}

impl ResourceStatus {
    pub fn can_transition_to(self, next: ResourceStatus) -> bool {
        use ResourceStatus::*;
        match (self, next) {
            (_, Absent) | (_, Error) | (_, Unknown) => true,
            (Absent, Creating) | (Unknown, Creating) | (Error, Creating) => true,
            (Creating, Present) => true,
            (Present, Updating) | (Updating, Present) | (Error, Updating) => true,
            (Present, Deleting)
            | (Updating, Deleting)
            | (Error, Deleting)
            | (Unknown, Deleting) => true,
            (Unknown, Present) | (Error, Present) | (Present, Present) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Absent => write!(f, "absent"),
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Present => write!(f, "present"),
            ResourceStatus::Updating => write!(f, "updating"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reads and writes `state.json` under the state directory, keeping one
/// backup and guarding mutations with a lock file.
pub struct StateManager {
    project_root: PathBuf,
    /// Relative to the project root unless absolute
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_root.join(&self.state_dir)
    }

    fn path(&self, file: &str) -> PathBuf {
        self.state_dir().join(file)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory {}", dir.display());
        }
        Ok(())
    }

    /// Load the state file; a missing file is an empty state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.path(STATE_FILE);
        if !path.exists() {
            tracing::debug!("No state file at {}", path.display());
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content).map_err(|e| {
            CloudError::StateError(format!("{} is not a valid state file: {}", path.display(), e))
        })?;
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "state file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded {} resource(s) from state", state.resources.len());
        Ok(state)
    }

    /// Write the state, keeping the previous file as a backup.
    ///
    /// The new content goes to a temporary file first so a crash never
    /// leaves a truncated state file behind.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.path(STATE_FILE);
        let staging = self.path(STATE_STAGING);
        fs::write(&staging, serde_json::to_string_pretty(state)?).await?;

        if path.exists() {
            fs::copy(&path, self.path(STATE_BACKUP)).await?;
        }
        fs::rename(&staging, &path).await?;

        tracing::debug!("Saved {} resource(s) to state", state.resources.len());
        Ok(())
    }

    /// Take the state lock. A lock older than an hour is assumed abandoned
    /// and replaced.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;
        let lock_path = self.path(LOCK_FILE);
        let info = LockInfo::current();
        let content = serde_json::to_string_pretty(&info)?;

        for _ in 0..2 {
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await;
            match created {
                Ok(mut file) => {
                    file.write_all(content.as_bytes()).await?;
                    file.flush().await?;
                    tracing::debug!("Acquired state lock {}", lock_path.display());
                    return Ok(StateLock {
                        lock_path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    check_stale(&lock_path).await?;
                    fs::remove_file(&lock_path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CloudError::LockError(format!(
            "could not take {} after removing a stale lock",
            lock_path.display()
        )))
    }
}

/// Succeed only when the existing lock is old enough to be replaced.
///
/// A lock file that cannot be parsed (left half-written by a crash) is
/// judged by its modification time.
async fn check_stale(lock_path: &Path) -> Result<()> {
    match LockInfo::read(lock_path).await {
        Ok(holder) => {
            let age = Utc::now()
                .signed_duration_since(holder.acquired_at)
                .to_std()
                .unwrap_or_default();
            if age < STALE_LOCK_AFTER {
                return Err(CloudError::LockError(format!(
                    "state is locked by {} (pid {}) since {}",
                    holder.holder, holder.pid, holder.acquired_at
                )));
            }
            tracing::warn!(
                "Replacing stale state lock held by {} since {}",
                holder.holder,
                holder.acquired_at
            );
        }
        Err(e) => {
            let age = fs::metadata(lock_path)
                .await?
                .modified()?
                .elapsed()
                .unwrap_or_default();
            if age < STALE_LOCK_AFTER {
                return Err(e);
            }
            tracing::warn!("Replacing stale unreadable state lock: {}", e);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    async fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| {
            CloudError::LockError(format!("unreadable lock file {}: {}", path.display(), e))
        })
    }
}

/// Held state lock; dropping it without [`StateLock::release`] still
/// removes the lock file.
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path).await?;
            tracing::debug!("Released state lock");
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
