//! The harness facade tests drive.

use std::io::Write;
use std::sync::Arc;

use tracing::{info, warn};

use tfspec_runner::CommandRunner;

use crate::configuration::{Configuration, Role};
use crate::error::{HarnessError, HarnessResult};
use crate::executor::{DestroyOutcome, LifecycleExecutor, PlanResult};
use crate::outputs::{InstanceState, OutputResolver};
use crate::registry::ConfigurationRegistry;
use crate::settings::HarnessConfig;
use crate::vars::{Overrides, Vars};

/// Drives the roles of a module under test through their lifecycle.
///
/// Each role moves `Absent → provision → Live → destroy → Absent`.
/// Provisioning a live role is rejected; use [`Harness::reprovision`] to go
/// from `Live` back to `Live`. Lifecycle methods take `&mut self`, so calls
/// are serialized.
pub struct Harness {
    registry: ConfigurationRegistry,
    executor: LifecycleExecutor,
    resolver: OutputResolver,
    active_role: Role,
}

impl Harness {
    /// Create a harness with `harness` as the active role. Every role starts `Absent`.
    pub fn new(registry: ConfigurationRegistry, executor: LifecycleExecutor) -> Self {
        Self {
            registry,
            executor,
            resolver: OutputResolver::new(),
            active_role: Role::harness(),
        }
    }

    /// Create a harness from a configuration document, adopting instances
    /// that already exist: a role whose state file records resources starts `Live`.
    pub fn open(config: HarnessConfig, runner: Arc<dyn CommandRunner>) -> HarnessResult<Self> {
        let registry = config.registry();
        let executor = LifecycleExecutor::new(runner, config.settings);
        let mut harness = Self::new(registry, executor);

        let existing: Vec<Role> = harness
            .registry
            .iter()
            .filter_map(|(role, definition)| {
                match harness.executor.has_resources(role, definition) {
                    Ok(true) => Some(Ok(role.clone())),
                    Ok(false) => None,
                    Err(e) => Some(Err(e)),
                }
            })
            .collect::<HarnessResult<_>>()?;

        for role in existing {
            info!("Adopting existing instance of role {}", role);
            harness.resolver.mark_live(&role);
        }
        Ok(harness)
    }

    /// Switch the role the convenience methods act on.
    pub fn with_active_role(mut self, role: impl Into<Role>) -> HarnessResult<Self> {
        let role = role.into();
        self.registry.get_required(&role)?;
        self.active_role = role;
        Ok(self)
    }

    pub fn active_role(&self) -> &Role {
        &self.active_role
    }

    pub fn registry(&self) -> &ConfigurationRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &LifecycleExecutor {
        &self.executor
    }

    pub fn state(&self, role: &Role) -> InstanceState {
        self.resolver.state(role)
    }

    /// Default variables of the active role.
    pub fn vars(&self) -> HarnessResult<Vars> {
        Ok(self.registry.for_role(&self.active_role, None)?.into_vars())
    }

    /// Configuration of the active role with `overrides` applied.
    pub fn configuration(&self, overrides: &Overrides) -> HarnessResult<Configuration> {
        self.registry.for_role(&self.active_role, Some(overrides))
    }

    pub async fn plan(&mut self, overrides: Overrides) -> HarnessResult<PlanResult> {
        let role = self.active_role.clone();
        self.plan_for(&role, overrides, None).await
    }

    /// Plan the active role, also writing the plan text to `sink`.
    pub async fn plan_to(
        &mut self,
        overrides: Overrides,
        sink: &mut dyn Write,
    ) -> HarnessResult<PlanResult> {
        let role = self.active_role.clone();
        self.plan_for(&role, overrides, Some(sink)).await
    }

    pub async fn provision(&mut self, overrides: Overrides) -> HarnessResult<()> {
        let role = self.active_role.clone();
        self.provision_for(&role, overrides).await
    }

    /// Forced destroy of the active role.
    pub async fn destroy(&mut self, overrides: Overrides) -> HarnessResult<DestroyOutcome> {
        let role = self.active_role.clone();
        self.destroy_for(&role, overrides, true).await
    }

    pub async fn reprovision(&mut self, overrides: Overrides) -> HarnessResult<()> {
        let role = self.active_role.clone();
        self.reprovision_for(&role, overrides).await
    }

    pub async fn plan_for(
        &mut self,
        role: &Role,
        overrides: Overrides,
        sink: Option<&mut dyn Write>,
    ) -> HarnessResult<PlanResult> {
        let cfg = self.registry.for_role(role, Some(&overrides))?;
        let definition = self.registry.get_required(role)?;
        self.executor.plan(definition, &cfg, sink).await
    }

    pub async fn provision_for(&mut self, role: &Role, overrides: Overrides) -> HarnessResult<()> {
        if self.resolver.state(role).is_live() {
            return Err(HarnessError::AlreadyLive(role.clone()));
        }
        let cfg = self.registry.for_role(role, Some(&overrides))?;
        let definition = self.registry.get_required(role)?;
        self.executor.provision(definition, &cfg).await?;
        self.resolver.mark_live(role);
        Ok(())
    }

    /// Destroy a role's instance. Any `Ok` outcome leaves the role `Absent`;
    /// an unforced failure leaves its state unchanged.
    pub async fn destroy_for(
        &mut self,
        role: &Role,
        overrides: Overrides,
        force: bool,
    ) -> HarnessResult<DestroyOutcome> {
        let cfg = self.registry.for_role(role, Some(&overrides))?;
        let definition = self.registry.get_required(role)?;
        let outcome = self.executor.destroy(definition, &cfg, force).await?;
        self.resolver.mark_absent(role);
        Ok(outcome)
    }

    /// Forced destroy, then provision. The provision runs whatever the
    /// destroy did, so the role ends `Live` unless the provision fails.
    pub async fn reprovision_for(&mut self, role: &Role, overrides: Overrides) -> HarnessResult<()> {
        if let Err(e) = self.destroy_for(role, overrides.clone(), true).await {
            warn!("Destroy before reprovision of role {} failed: {}", role, e);
            self.resolver.mark_absent(role);
        }
        self.provision_for(role, overrides).await
    }

    /// Resolve a published output of any live role.
    pub async fn output_for(&mut self, role: impl Into<Role>, name: &str) -> HarnessResult<String> {
        let role = role.into();
        let definition = self.registry.get_required(&role)?;
        if !definition.publishes(name) {
            warn!(
                "Role {} does not list {:?} among its outputs {:?}",
                role, name, definition.outputs
            );
        }
        let executor = &self.executor;
        self.resolver
            .resolve(&role, name, || executor.output(&role, definition, name))
            .await
    }
}
