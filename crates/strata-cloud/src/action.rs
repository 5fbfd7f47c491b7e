//! Planned actions and their outcomes

use crate::attribute::AttributeDiff;
use serde::{Deserialize, Serialize};

/// Represents a planned action for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g., "aws_api_gateway_stage")
    pub resource_type: String,

    /// Resource address (`type:name`)
    pub resource_id: String,

    /// Identity key of the remote object, when one is known
    pub identity: Option<String>,

    /// Description of the action
    pub description: String,

    /// Attribute changes behind an update or replacement
    #[serde(default)]
    pub diff: AttributeDiff,
}

impl Action {
    pub fn new(
        action_type: ActionType,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        identity: Option<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        let resource_id = resource_id.into();
        let description = match (&action_type, &identity) {
            (ActionType::Create, _) => format!("{} will be created", resource_id),
            (ActionType::NoOp, _) => format!("{} is up to date", resource_id),
            (action, Some(identity)) => {
                format!("{} ({}) will be {}d", resource_id, identity, action)
            }
            (action, None) => format!("{} will be {}d", resource_id, action),
        };
        Self {
            id: format!("{}-{}", action_type, resource_id),
            action_type,
            resource_type,
            resource_id,
            identity,
            description,
            diff: AttributeDiff::default(),
        }
    }

    pub fn with_diff(mut self, diff: AttributeDiff) -> Self {
        if !diff.is_empty() {
            self.description = format!("{} [{}]", self.description, diff.names().join(", "));
        }
        self.diff = diff;
        self
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Delete and re-create a resource
    Replace,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of applying actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult {
            action_id,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, action_id: String, error: String) {
        self.failed.push(ActionResult {
            action_id,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// ID of the action
    pub action_id: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Find the action planned for a resource address
    pub fn action_for(&self, resource_id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.resource_id == resource_id)
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(vec![
            Action::new(ActionType::Create, "t", "t:a", None),
            Action::new(ActionType::Replace, "t", "t:b", Some("x/y".into())),
            Action::new(ActionType::NoOp, "t", "t:c", Some("x/z".into())),
        ]);
        assert!(plan.has_changes);
        assert_eq!(
            plan.summary().to_string(),
            "1 to create, 0 to update, 1 to replace, 0 to delete, 1 unchanged"
        );
        assert_eq!(plan.action_for("t:b").unwrap().id, "replace-t:b");
    }

    #[test]
    fn test_noop_plan_has_no_changes() {
        let plan = Plan::new(vec![Action::new(ActionType::NoOp, "t", "t:a", None)]);
        assert!(!plan.has_changes);
        assert!(!Plan::empty().has_changes);
    }

    #[test]
    fn test_description_names_identity() {
        let action = Action::new(ActionType::Delete, "t", "t:a", Some("api/prod".into()));
        assert_eq!(action.description, "t:a (api/prod) will be deleted");
    }
}
