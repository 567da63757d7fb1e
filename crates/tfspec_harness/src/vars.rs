//! Variable mappings, overrides and per-role variable documentation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An effective variable mapping, as handed to Terraform.
///
/// Read-only once built: the only way to get different variables is to
/// build a new configuration with different overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars(BTreeMap<String, Value>);

impl Vars {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add a variable, replacing any previous value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Get a variable that holds a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as a Terraform JSON variable file body.
    pub fn to_tfvars_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }
}

impl FromIterator<(String, Value)> for Vars {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single override entry.
#[derive(Debug, Clone, PartialEq)]
pub enum VarOverride {
    /// Replace (or add) the variable.
    Set(Value),
    /// Drop the variable so the module's own default applies.
    Unset,
}

/// Test-specific overrides, applied on top of a role's defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Overrides(BTreeMap<String, VarOverride>);

impl Overrides {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), VarOverride::Set(value.into()));
        self
    }

    pub fn unset(mut self, name: impl Into<String>) -> Self {
        self.0.insert(name.into(), VarOverride::Unset);
        self
    }

    pub fn get(&self, name: &str) -> Option<&VarOverride> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarOverride)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow merge: each override replaces the default at its key
    /// wholesale, nested objects included.
    pub fn apply_to(&self, defaults: &Vars) -> Vars {
        let mut merged = defaults.0.clone();
        for (name, entry) in &self.0 {
            match entry {
                VarOverride::Set(value) => {
                    merged.insert(name.clone(), value.clone());
                }
                VarOverride::Unset => {
                    merged.remove(name);
                }
            }
        }
        Vars(merged)
    }

    /// Parse a `name=value` assignment. The value is read as JSON when it
    /// parses as JSON, and as a plain string otherwise.
    pub fn parse_assignment(assignment: &str) -> Option<(String, Value)> {
        let (name, raw) = assignment.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Some((name.to_string(), value))
    }
}

impl FromIterator<(String, VarOverride)> for Overrides {
    fn from_iter<I: IntoIterator<Item = (String, VarOverride)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Value shape a module variable expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarShape {
    /// Free-form string.
    String,
    /// `"yes"` or `"no"`.
    Flag,
    /// `"true"` or `"false"`, as a string or a JSON boolean.
    Bool,
    /// Object with string values.
    Map,
    /// Arbitrary object.
    Object,
}

impl VarShape {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Flag => matches!(value.as_str(), Some("yes") | Some("no")),
            Self::Bool => value.is_boolean() || matches!(value.as_str(), Some("true") | Some("false")),
            Self::Map => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
            Self::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for VarShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Flag => "flag",
            Self::Bool => "bool",
            Self::Map => "map",
            Self::Object => "object",
        };
        write!(f, "{}", name)
    }
}

/// Documentation for one variable a role's module accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarSpec {
    pub name: String,
    pub shape: VarShape,
    #[serde(default)]
    pub description: String,
}

impl VarSpec {
    pub fn new(name: impl Into<String>, shape: VarShape, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape,
            description: description.into(),
        }
    }
}
