//! # tfspec_harness
//!
//! Drives Terraform modules under test through plan, provision, destroy and
//! reprovision, one named role at a time, and resolves the outputs each role
//! publishes.
//!
//! ## Features
//!
//! - Per-role default variables merged with test overrides
//! - Lifecycle executor with explicit best-effort (forced) destroy
//! - Plan capture into a caller-supplied sink
//! - Cross-role output lookup, invalidated on destroy
//! - YAML harness configuration with environment overrides
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use tfspec_harness::{bucket, Harness, HarnessSettings, Overrides, Role};
//! use tfspec_runner::{ProcessRunner, ProcessRunnerOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = bucket::bucket_module_config(
//!     Path::new("spec/infra"),
//!     "a1b2",
//!     HarnessSettings::default().with_env_overrides()?,
//! );
//! let runner = Arc::new(ProcessRunner::new(ProcessRunnerOptions::default()));
//! let mut harness = Harness::open(config, runner)?;
//!
//! harness.provision_for(&Role::prerequisites(), Overrides::new()).await?;
//! let kms_key_arn = harness.output_for(Role::PREREQUISITES, "kms_key_arn").await?;
//! harness.reprovision(Overrides::new().set("kms_key_arn", kms_key_arn)).await?;
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod configuration;
pub mod error;
pub mod executor;
pub mod harness;
pub mod outputs;
pub mod registry;
pub mod settings;
pub mod vars;

pub use configuration::{Configuration, Role, RoleDefinition};
pub use error::{HarnessError, HarnessResult};
pub use executor::{DestroyOutcome, LifecycleExecutor, Operation, PlanResult};
pub use harness::Harness;
pub use outputs::{InstanceState, OutputResolver};
pub use registry::ConfigurationRegistry;
pub use settings::{HarnessConfig, HarnessSettings};
pub use vars::{Overrides, VarOverride, VarShape, VarSpec, Vars};
