//! Roles for the encrypted S3 bucket module.
//!
//! `prerequisites` provisions a KMS key whose ARN the `harness` role can take
//! as `kms_key_arn`; `harness` is the bucket module itself.

use std::path::Path;

use serde_json::json;

use crate::configuration::{Role, RoleDefinition};
use crate::registry::ConfigurationRegistry;
use crate::settings::{HarnessConfig, HarnessSettings};
use crate::vars::{VarShape, VarSpec, Vars};

pub const DEFAULT_REGION: &str = "eu-west-2";

/// ARN of a bucket.
pub fn bucket_arn(bucket_name: &str) -> String {
    format!("arn:aws:s3:::{}", bucket_name)
}

/// Name of the access log bucket the module creates next to `bucket_name`.
pub fn access_log_bucket_name(bucket_name: &str) -> String {
    format!("{}-access-log", bucket_name)
}

/// The `harness` role: the bucket module under test.
pub fn harness_role(infra_dir: &Path, deployment_identifier: &str) -> RoleDefinition {
    let bucket_name = format!("tfspec-bucket-{}", deployment_identifier);
    RoleDefinition::new(infra_dir.join(Role::HARNESS))
        .with_vars(
            Vars::new()
                .with("region", DEFAULT_REGION)
                .with("deployment_identifier", deployment_identifier)
                .with("bucket_name", bucket_name)
                .with("tags", json!({ "Thing": "value" })),
        )
        .accepting(VarSpec::new("region", VarShape::String, "AWS region"))
        .accepting(VarSpec::new(
            "deployment_identifier",
            VarShape::String,
            "Identifier distinguishing this test run",
        ))
        .accepting(VarSpec::new("bucket_name", VarShape::String, "Bucket to create"))
        .accepting(VarSpec::new("tags", VarShape::Map, "Extra bucket tags"))
        .accepting(VarSpec::new(
            "kms_key_arn",
            VarShape::String,
            "KMS key for SSE; AES256 when absent",
        ))
        .accepting(VarSpec::new("acl", VarShape::String, "Canned ACL"))
        .accepting(VarSpec::new("mfa_delete", VarShape::Bool, "Require MFA delete"))
        .accepting(VarSpec::new(
            "include_source_policy_json",
            VarShape::Bool,
            "Merge a caller supplied policy document",
        ))
        .accepting(VarSpec::new(
            "allow_destroy_when_objects_present",
            VarShape::Flag,
            "Force-destroy a non-empty bucket",
        ))
        .accepting(VarSpec::new(
            "public_access_block",
            VarShape::Object,
            "block_public_acls, block_public_policy, ignore_public_acls, restrict_public_buckets",
        ))
        .accepting(VarSpec::new(
            "enable_access_logging",
            VarShape::Flag,
            "Log to <bucket_name>-access-log under logs/",
        ))
        .publishing("bucket_name")
        .publishing("bucket_arn")
}

/// The `prerequisites` role: supporting resources such as the KMS key.
pub fn prerequisites_role(infra_dir: &Path, deployment_identifier: &str) -> RoleDefinition {
    RoleDefinition::new(infra_dir.join(Role::PREREQUISITES))
        .with_vars(
            Vars::new()
                .with("region", DEFAULT_REGION)
                .with("deployment_identifier", deployment_identifier),
        )
        .accepting(VarSpec::new("region", VarShape::String, "AWS region"))
        .accepting(VarSpec::new(
            "deployment_identifier",
            VarShape::String,
            "Identifier distinguishing this test run",
        ))
        .publishing("kms_key_arn")
}

/// Registry with both bucket module roles, sourced from `<infra_dir>/<role>`.
pub fn bucket_module_registry(infra_dir: &Path, deployment_identifier: &str) -> ConfigurationRegistry {
    ConfigurationRegistry::new()
        .with_role(Role::harness(), harness_role(infra_dir, deployment_identifier))
        .with_role(
            Role::prerequisites(),
            prerequisites_role(infra_dir, deployment_identifier),
        )
}

/// Complete configuration for the bucket module.
pub fn bucket_module_config(
    infra_dir: &Path,
    deployment_identifier: &str,
    settings: HarnessSettings,
) -> HarnessConfig {
    HarnessConfig::new(settings, &bucket_module_registry(infra_dir, deployment_identifier))
}
