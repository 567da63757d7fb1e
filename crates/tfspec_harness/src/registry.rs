//! Configuration registry: per-role defaults and override merging.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::configuration::{Configuration, Role, RoleDefinition};
use crate::error::{HarnessError, HarnessResult};
use crate::vars::{Overrides, VarOverride};

/// A registry of the roles a test suite knows about.
///
/// The registry maps role names to their definitions and builds
/// configurations from each role's defaults plus caller overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationRegistry {
    roles: BTreeMap<Role, RoleDefinition>,
}

impl ConfigurationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            roles: BTreeMap::new(),
        }
    }

    /// Register a role. An existing definition under the same name is replaced.
    pub fn register(&mut self, role: impl Into<Role>, definition: RoleDefinition) {
        let role = role.into();
        debug!("Registering role: {}", role);
        self.roles.insert(role, definition);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_role(mut self, role: impl Into<Role>, definition: RoleDefinition) -> Self {
        self.register(role, definition);
        self
    }

    pub fn get(&self, role: &Role) -> Option<&RoleDefinition> {
        self.roles.get(role)
    }

    /// Get a role definition, returning an error if the role is not registered.
    pub fn get_required(&self, role: &Role) -> HarnessResult<&RoleDefinition> {
        self.get(role)
            .ok_or_else(|| HarnessError::UnknownRole(role.clone()))
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.roles.contains_key(role)
    }

    /// Registered roles, in name order.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Role, &RoleDefinition)> {
        self.roles.iter()
    }

    /// Build the configuration for `role`: its defaults with `overrides`
    /// applied key by key.
    ///
    /// Keys the role does not document are passed through untouched.
    pub fn for_role(
        &self,
        role: &Role,
        overrides: Option<&Overrides>,
    ) -> HarnessResult<Configuration> {
        let definition = self.get_required(role)?;

        let vars = match overrides {
            Some(overrides) => {
                Self::check_overrides(role, definition, overrides);
                overrides.apply_to(&definition.vars)
            }
            None => definition.vars.clone(),
        };

        Ok(Configuration::new(role.clone(), vars))
    }

    fn check_overrides(role: &Role, definition: &RoleDefinition, overrides: &Overrides) {
        if definition.accepts.is_empty() {
            return;
        }
        for (name, entry) in overrides.iter() {
            match (definition.var_spec(name), entry) {
                (None, _) => {
                    debug!("Passing through unrecognized variable {} for role {}", name, role);
                }
                (Some(spec), VarOverride::Set(value)) if !spec.shape.accepts(value) => {
                    warn!(
                        "Variable {} for role {} expects a {} value, got {}",
                        name, role, spec.shape, value
                    );
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::{VarShape, VarSpec, Vars};
    use serde_json::json;

    fn registry() -> ConfigurationRegistry {
        ConfigurationRegistry::new()
            .with_role(
                Role::harness(),
                RoleDefinition::new("spec/infra/harness")
                    .with_vars(
                        Vars::new()
                            .with("region", "eu-west-2")
                            .with("bucket_name", "bucket-a"),
                    )
                    .accepting(VarSpec::new("mfa_delete", VarShape::Bool, "")),
            )
            .with_role(
                Role::prerequisites(),
                RoleDefinition::new("spec/infra/prerequisites")
                    .with_vars(Vars::new().with("region", "eu-west-2")),
            )
    }

    #[test]
    fn test_unknown_role_fails() {
        let err = registry().for_role(&Role::new("nope"), None).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownRole(role) if role.as_str() == "nope"));
    }

    #[test]
    fn test_defaults_without_overrides() {
        let registry = registry();
        let config = registry.for_role(&Role::harness(), None).unwrap();

        assert_eq!(config.role(), &Role::harness());
        assert_eq!(config.vars(), &registry.get(&Role::harness()).unwrap().vars);
    }

    #[test]
    fn test_overrides_do_not_leak_between_calls() {
        let registry = registry();
        let overrides = Overrides::new().set("bucket_name", "bucket-b").set("mfa_delete", "true");

        let overridden = registry.for_role(&Role::harness(), Some(&overrides)).unwrap();
        let fresh = registry.for_role(&Role::harness(), None).unwrap();

        assert_eq!(overridden.vars().get_str("bucket_name"), Some("bucket-b"));
        assert_eq!(overridden.vars().get("mfa_delete"), Some(&json!("true")));
        assert_eq!(fresh.vars().get_str("bucket_name"), Some("bucket-a"));
        assert!(!fresh.vars().contains("mfa_delete"));
    }

    #[test]
    fn test_roles_are_independent() {
        let registry = registry();
        let config = registry.for_role(&Role::prerequisites(), None).unwrap();

        assert!(!config.vars().contains("bucket_name"));
        assert_eq!(
            registry.roles().map(Role::as_str).collect::<Vec<_>>(),
            vec!["harness", "prerequisites"]
        );
    }
}
