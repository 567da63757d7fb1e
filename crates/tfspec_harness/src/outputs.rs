//! Instance lifecycle tracking and output resolution.

use std::collections::HashMap;
use std::future::Future;

use tracing::debug;

use crate::configuration::Role;
use crate::error::{HarnessError, HarnessResult};

/// Lifecycle state of one role's instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Absent,
    /// Provisioned; `generation` changes on every successful provision.
    Live { generation: u64 },
}

impl InstanceState {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

/// Tracks which roles are live and resolves their outputs.
///
/// Resolved values are cached per provision generation: once a role is
/// destroyed or provisioned again, earlier values are never served.
#[derive(Debug, Default)]
pub struct OutputResolver {
    states: HashMap<Role, InstanceState>,
    last_generation: u64,
    cache: HashMap<(Role, String), (u64, String)>,
}

impl OutputResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, role: &Role) -> InstanceState {
        self.states
            .get(role)
            .copied()
            .unwrap_or(InstanceState::Absent)
    }

    /// Record a successful provision. Returns the new generation.
    pub fn mark_live(&mut self, role: &Role) -> u64 {
        self.last_generation += 1;
        let generation = self.last_generation;
        self.states
            .insert(role.clone(), InstanceState::Live { generation });
        self.cache.retain(|(cached_role, _), _| cached_role != role);
        debug!("Role {} is live (generation {})", role, generation);
        generation
    }

    /// Record a destroy, dropping every value resolved for the role.
    pub fn mark_absent(&mut self, role: &Role) {
        self.states.insert(role.clone(), InstanceState::Absent);
        self.cache.retain(|(cached_role, _), _| cached_role != role);
        debug!("Role {} is absent", role);
    }

    /// Resolve an output, calling `fetch` unless the current generation
    /// already has the value.
    pub async fn resolve<F, Fut>(
        &mut self,
        role: &Role,
        name: &str,
        fetch: F,
    ) -> HarnessResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HarnessResult<String>>,
    {
        let generation = match self.state(role) {
            InstanceState::Live { generation } => generation,
            InstanceState::Absent => {
                return Err(HarnessError::OutputUnavailable {
                    role: role.clone(),
                    name: name.to_string(),
                    reason: "role has no live instance".to_string(),
                })
            }
        };

        let key = (role.clone(), name.to_string());
        if let Some((cached_generation, value)) = self.cache.get(&key) {
            if *cached_generation == generation {
                return Ok(value.clone());
            }
        }

        let value = fetch().await?;
        self.cache.insert(key, (generation, value.clone()));
        Ok(value)
    }
}
