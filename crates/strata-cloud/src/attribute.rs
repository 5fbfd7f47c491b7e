//! Attribute schemas and desired/observed diffs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Flattened attribute set of a resource
pub type Attributes = BTreeMap<String, Value>;

/// How an attribute is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeMode {
    /// Must be declared
    Required,
    /// May be declared; leaving it out means "empty"
    Optional,
    /// May be declared; leaving it out keeps whatever the service reports
    OptionalComputed,
    /// Reported by the service only
    Computed,
}

/// How a change to an attribute is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    InPlace,
    ForcesReplacement,
}

/// Schema entry for one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub mode: AttributeMode,
    pub update: UpdatePolicy,
}

impl AttributeSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            mode: AttributeMode::Required,
            update: UpdatePolicy::InPlace,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            mode: AttributeMode::Optional,
            update: UpdatePolicy::InPlace,
        }
    }

    pub const fn optional_computed(name: &'static str) -> Self {
        Self {
            name,
            mode: AttributeMode::OptionalComputed,
            update: UpdatePolicy::InPlace,
        }
    }

    pub const fn computed(name: &'static str) -> Self {
        Self {
            name,
            mode: AttributeMode::Computed,
            update: UpdatePolicy::InPlace,
        }
    }

    pub const fn forces_replacement(mut self) -> Self {
        self.update = UpdatePolicy::ForcesReplacement;
        self
    }
}

/// A single attribute that differs between observed and desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub name: String,
    pub before: Value,
    pub after: Value,
    pub update: UpdatePolicy,
}

impl AttributeChange {
    /// Keys of an object-valued attribute that were added or changed, with
    /// their new values, and keys that were removed.
    pub fn map_delta(&self) -> (BTreeMap<String, Value>, Vec<String>) {
        let empty = serde_json::Map::new();
        let before = self.before.as_object().unwrap_or(&empty);
        let after = self.after.as_object().unwrap_or(&empty);

        let upserts = after
            .iter()
            .filter(|(k, v)| before.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let removals = before
            .keys()
            .filter(|k| !after.contains_key(*k))
            .cloned()
            .collect();

        (upserts, removals)
    }
}

/// Set of changes between observed and desired state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeDiff {
    pub changes: Vec<AttributeChange>,
}

impl AttributeDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn requires_replacement(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.update == UpdatePolicy::ForcesReplacement)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeChange> {
        self.changes.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Compare observed attributes against desired ones, attribute by attribute.
///
/// Computed attributes are ignored. Optional-computed attributes are only
/// compared when declared.
pub fn diff(
    schema: &[AttributeSpec],
    observed: &Attributes,
    desired: &Attributes,
) -> AttributeDiff {
    let mut changes = Vec::new();

    for spec in schema {
        if spec.mode == AttributeMode::Computed {
            continue;
        }

        let after = desired.get(spec.name).map(normalize).unwrap_or(Value::Null);
        if spec.mode == AttributeMode::OptionalComputed && after.is_null() {
            continue;
        }

        let before = observed.get(spec.name).map(normalize).unwrap_or(Value::Null);
        if before != after {
            changes.push(AttributeChange {
                name: spec.name.to_string(),
                before,
                after,
                update: spec.update,
            });
        }
    }

    AttributeDiff { changes }
}

/// Collapse empty strings, arrays and objects to `null`, recursively, so
/// that "unset" and "set to empty" compare equal.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Null,
        Value::Array(items) => {
            let items: Vec<Value> = items.iter().map(normalize).collect();
            if items.is_empty() {
                Value::Null
            } else {
                Value::Array(items)
            }
        }
        Value::Object(map) => {
            let map: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &[AttributeSpec] = &[
        AttributeSpec::required("name").forces_replacement(),
        AttributeSpec::optional("description"),
        AttributeSpec::optional("variables"),
        AttributeSpec::optional_computed("size"),
        AttributeSpec::computed("arn"),
    ];

    fn attrs(value: Value) -> Attributes {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_no_changes_when_empty_equivalent() {
        let observed = attrs(json!({"name": "a", "description": "", "variables": {}, "arn": "x"}));
        let desired = attrs(json!({"name": "a"}));
        assert!(diff(SCHEMA, &observed, &desired).is_empty());
    }

    #[test]
    fn test_optional_computed_only_when_declared() {
        let observed = attrs(json!({"name": "a", "size": "0.5"}));
        assert!(diff(SCHEMA, &observed, &attrs(json!({"name": "a"}))).is_empty());

        let changed = diff(SCHEMA, &observed, &attrs(json!({"name": "a", "size": "1.6"})));
        assert_eq!(changed.names(), vec!["size"]);
        assert!(!changed.requires_replacement());
    }

    #[test]
    fn test_replacement_attribute() {
        let observed = attrs(json!({"name": "a"}));
        let desired = attrs(json!({"name": "b", "description": "hello"}));
        let d = diff(SCHEMA, &observed, &desired);
        assert_eq!(d.names(), vec!["name", "description"]);
        assert!(d.requires_replacement());
    }

    #[test]
    fn test_decimal_strings_compare_exactly() {
        let observed = attrs(json!({"name": "a", "size": "0.5"}));
        let desired = attrs(json!({"name": "a", "size": "0.50"}));
        // declared representation wins; no float coercion
        assert!(diff(SCHEMA, &observed, &desired).contains("size"));
    }

    #[test]
    fn test_map_delta() {
        let observed = attrs(json!({"name": "a", "variables": {"one": "1", "two": "2"}}));
        let desired = attrs(json!({"name": "a", "variables": {"one": "1", "three": "3"}}));
        let d = diff(SCHEMA, &observed, &desired);
        let (upserts, removals) = d.get("variables").unwrap().map_delta();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts["three"], json!("3"));
        assert_eq!(removals, vec!["two".to_string()]);
    }
}
