//! Lifecycle scenarios for the bucket module.
//!
//! Terraform is replaced by `FakeTerraform`, which keeps a small in-memory
//! model of S3 buckets and KMS keys, writes real state files, and refuses
//! to delete a non-empty bucket unless the module was told to force-delete.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;

use tfspec_harness::{
    bucket, DestroyOutcome, Harness, HarnessError, HarnessSettings, InstanceState, Overrides, Role,
};
use tfspec_runner::{CommandRunner, ExecutionResult, Invocation, RunConfig, RunnerResult};

#[derive(Debug, Clone, Default)]
struct BucketRecord {
    objects: Vec<String>,
    mfa_delete: bool,
    force_destroy: bool,
    sse_algorithm: String,
}

#[derive(Debug, Default)]
struct FakeCloud {
    buckets: BTreeMap<String, BucketRecord>,
    kms_keys: Vec<String>,
    invocations: Vec<String>,
}

#[derive(Clone, Default)]
struct FakeTerraform {
    cloud: Arc<Mutex<FakeCloud>>,
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("{}=", name);
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

fn is_true(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true))) || value.and_then(Value::as_str) == Some("true")
}

fn finished(exit_code: i64, stdout: impl Into<String>, stderr: impl Into<String>) -> ExecutionResult {
    let now = Utc::now();
    ExecutionResult {
        exit_code,
        stdout: stdout.into(),
        stderr: stderr.into(),
        started_at: now,
        finished_at: now,
        duration_ms: 1,
    }
}

impl FakeTerraform {
    fn put_object(&self, bucket: &str, key: &str) {
        self.cloud
            .lock()
            .buckets
            .get_mut(bucket)
            .expect("bucket exists")
            .objects
            .push(key.to_string());
    }

    fn list_buckets(&self) -> Vec<String> {
        self.cloud.lock().buckets.keys().cloned().collect()
    }

    fn bucket(&self, name: &str) -> Option<BucketRecord> {
        self.cloud.lock().buckets.get(name).cloned()
    }

    fn delete_bucket(&self, name: &str) {
        self.cloud.lock().buckets.remove(name);
    }

    fn invocations(&self) -> Vec<String> {
        self.cloud.lock().invocations.clone()
    }

    fn read_vars(args: &[String]) -> Value {
        let path = flag(args, "-var-file").expect("var file passed");
        serde_json::from_str(&fs::read_to_string(path).expect("var file written")).unwrap()
    }

    fn write_state(path: &Path, resources: Value, outputs: Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let state = json!({"version": 4, "resources": resources, "outputs": outputs});
        fs::write(path, state.to_string()).unwrap();
    }

    fn plan(&self, role: &str, vars: &Value) -> ExecutionResult {
        if role != Role::HARNESS {
            return finished(0, "No changes. Your infrastructure matches the configuration.\n", "");
        }
        let name = vars["bucket_name"].as_str().unwrap_or_default();
        let desired_mfa = is_true(vars.get("mfa_delete"));
        match self.bucket(name) {
            None => finished(
                0,
                format!(
                    "  # aws_s3_bucket.bucket will be created\n  + resource \"aws_s3_bucket\" \"bucket\" {{\n      + bucket = \"{}\"\n    }}\n\nPlan: 1 to add, 0 to change, 0 to destroy.\n",
                    name
                ),
                "",
            ),
            Some(existing) if existing.mfa_delete != desired_mfa => finished(
                0,
                format!(
                    "  # aws_s3_bucket.bucket will be updated in-place\n  ~ resource \"aws_s3_bucket\" \"bucket\" {{\n        id     = \"{}\"\n      ~ versioning {{\n            enabled    = true\n          ~ mfa_delete = {} -> {}\n        }}\n    }}\n\nPlan: 0 to add, 1 to change, 0 to destroy.\n",
                    name, existing.mfa_delete, desired_mfa
                ),
                "",
            ),
            Some(_) => finished(0, "No changes. Your infrastructure matches the configuration.\n", ""),
        }
    }

    fn apply(&self, role: &str, vars: &Value, state: &Path) -> ExecutionResult {
        let mut cloud = self.cloud.lock();
        if role == Role::PREREQUISITES {
            let arn = format!(
                "arn:aws:kms:eu-west-2:123456789012:key/{}",
                vars["deployment_identifier"].as_str().unwrap_or("key")
            );
            cloud.kms_keys.push(arn.clone());
            Self::write_state(
                state,
                json!([{"type": "aws_kms_key", "name": "key"}]),
                json!({"kms_key_arn": {"value": arn, "type": "string"}}),
            );
            return finished(0, "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.\n", "");
        }

        let name = vars["bucket_name"].as_str().unwrap_or_default().to_string();
        let sse_algorithm = if vars.get("kms_key_arn").and_then(Value::as_str).is_some() {
            "aws:kms"
        } else {
            "AES256"
        };
        let record = cloud.buckets.entry(name.clone()).or_default();
        record.mfa_delete = is_true(vars.get("mfa_delete"));
        record.force_destroy = vars.get("allow_destroy_when_objects_present").and_then(Value::as_str) == Some("yes");
        record.sse_algorithm = sse_algorithm.to_string();

        Self::write_state(
            state,
            json!([{"type": "aws_s3_bucket", "name": "bucket"}]),
            json!({
                "bucket_name": {"value": name, "type": "string"},
                "bucket_arn": {"value": bucket::bucket_arn(&name), "type": "string"}
            }),
        );
        finished(0, "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.\n", "")
    }

    fn destroy(&self, role: &str, vars: &Value, state: &Path) -> ExecutionResult {
        let mut cloud = self.cloud.lock();
        if role == Role::HARNESS {
            let name = vars["bucket_name"].as_str().unwrap_or_default();
            if let Some(record) = cloud.buckets.get(name) {
                if !record.objects.is_empty() && !record.force_destroy {
                    return finished(
                        1,
                        "",
                        "Error: deleting S3 Bucket: BucketNotEmpty: The bucket you tried to delete is not empty\n",
                    );
                }
            }
            cloud.buckets.remove(name);
        } else {
            cloud.kms_keys.clear();
        }
        Self::write_state(state, json!([]), json!({}));
        finished(0, "Destroy complete!\n", "")
    }

    fn output(state: &Path, name: &str) -> ExecutionResult {
        let state: Value = fs::read_to_string(state)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(Value::Null);
        match state.get("outputs").and_then(|o| o.get(name)) {
            Some(output) => finished(0, format!("{}\n", output["value"]), ""),
            None => finished(1, "", format!("Error: Output \"{}\" not found\n", name)),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeTerraform {
    async fn is_available(&self, _program: &str) -> RunnerResult<bool> {
        Ok(true)
    }

    async fn run(&self, invocation: &Invocation, _run_config: &RunConfig) -> RunnerResult<ExecutionResult> {
        let args = &invocation.args;
        let role = flag(args, "-chdir")
            .and_then(|dir| Path::new(dir).file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let subcommand = args
            .iter()
            .find(|a| !a.starts_with('-'))
            .cloned()
            .unwrap_or_default();
        self.cloud
            .lock()
            .invocations
            .push(format!("{} {}", role, subcommand));

        let state = flag(args, "-state").map(PathBuf::from);
        let result = match (subcommand.as_str(), state) {
            ("init", _) => finished(0, "Terraform has been successfully initialized!\n", ""),
            ("plan", Some(_)) => self.plan(&role, &Self::read_vars(args)),
            ("apply", Some(state)) => self.apply(&role, &Self::read_vars(args), &state),
            ("destroy", Some(state)) => self.destroy(&role, &Self::read_vars(args), &state),
            ("output", Some(state)) => {
                let name = args.last().cloned().unwrap_or_default();
                Self::output(&state, &name)
            }
            (other, _) => finished(1, "", format!("unexpected invocation {}\n", other)),
        };
        Ok(result)
    }
}

struct Suite {
    _dir: TempDir,
    cloud: FakeTerraform,
    harness: Harness,
}

fn suite() -> Suite {
    let dir = tempfile::tempdir().unwrap();
    let cloud = FakeTerraform::default();
    let config = bucket::bucket_module_config(
        &dir.path().join("infra"),
        "t3st",
        HarnessSettings::default().with_state_dir(dir.path().join("state")),
    );
    let harness = Harness::open(config, Arc::new(cloud.clone())).unwrap();
    Suite {
        _dir: dir,
        cloud,
        harness,
    }
}

fn bucket_name(suite: &Suite) -> String {
    suite
        .harness
        .vars()
        .unwrap()
        .get_str("bucket_name")
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_default_provision_publishes_bucket_outputs() {
    let mut s = suite();
    let name = bucket_name(&s);

    s.harness.provision(Overrides::new()).await.unwrap();

    assert_eq!(
        s.harness.output_for(Role::HARNESS, "bucket_arn").await.unwrap(),
        format!("arn:aws:s3:::{}", name)
    );
    assert_eq!(
        s.harness.output_for(Role::HARNESS, "bucket_name").await.unwrap(),
        name
    );
    assert_eq!(s.cloud.bucket(&name).unwrap().sse_algorithm, "AES256");
}

#[tokio::test]
async fn test_forced_destroy_removes_non_empty_bucket_when_allowed() {
    let mut s = suite();
    let name = bucket_name(&s);
    let overrides = Overrides::new().set("allow_destroy_when_objects_present", "yes");

    s.harness.provision(overrides.clone()).await.unwrap();
    s.cloud.put_object(&name, "some-object");
    let outcome = s.harness.destroy(overrides).await.unwrap();

    assert_eq!(outcome, DestroyOutcome::Destroyed);
    assert!(!s.cloud.list_buckets().contains(&name));
}

#[tokio::test]
async fn test_forced_destroy_keeps_non_empty_bucket_when_not_allowed() {
    let mut s = suite();
    let name = bucket_name(&s);
    let overrides = Overrides::new().set("allow_destroy_when_objects_present", "no");

    s.harness.provision(overrides.clone()).await.unwrap();
    s.cloud.put_object(&name, "some-object");
    let outcome = s.harness.destroy(overrides).await.unwrap();

    assert_eq!(outcome, DestroyOutcome::FailureIgnored { exit_code: Some(1) });
    assert!(s.cloud.list_buckets().contains(&name));
    assert_eq!(s.harness.state(&Role::harness()), InstanceState::Absent);

    s.cloud.delete_bucket(&name);
}

#[tokio::test]
async fn test_unforced_destroy_of_non_empty_bucket_surfaces() {
    let mut s = suite();
    let name = bucket_name(&s);

    s.harness.provision(Overrides::new()).await.unwrap();
    s.cloud.put_object(&name, "some-object");
    let err = s
        .harness
        .destroy_for(&Role::harness(), Overrides::new(), false)
        .await
        .unwrap_err();

    let (exit_code, output) = err.tool_failure().unwrap();
    assert_eq!(exit_code, 1);
    assert!(output.contains("BucketNotEmpty"));
    assert!(s.harness.state(&Role::harness()).is_live());
}

#[tokio::test]
async fn test_plan_shows_mfa_delete_transition() {
    let mut s = suite();
    s.harness.provision(Overrides::new()).await.unwrap();

    let mut captured: Vec<u8> = Vec::new();
    let plan = s
        .harness
        .plan_to(Overrides::new().set("mfa_delete", "true"), &mut captured)
        .await
        .unwrap();

    assert!(plan.has_transition("mfa_delete", "false", "true"));
    let captured = String::from_utf8(captured).unwrap();
    assert!(captured.contains("mfa_delete = false -> true"));
    assert_eq!(captured, plan.output);
}

#[tokio::test]
async fn test_destroy_twice_is_not_an_error() {
    let mut s = suite();
    s.harness.provision(Overrides::new()).await.unwrap();

    let first = s
        .harness
        .destroy_for(&Role::harness(), Overrides::new(), false)
        .await
        .unwrap();
    let second = s
        .harness
        .destroy_for(&Role::harness(), Overrides::new(), false)
        .await
        .unwrap();

    assert_eq!(first, DestroyOutcome::Destroyed);
    assert_eq!(second, DestroyOutcome::AlreadyAbsent);
    assert_eq!(
        s.cloud
            .invocations()
            .iter()
            .filter(|i| i.ends_with("destroy"))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_reprovision_reaches_live_from_any_state() {
    let mut s = suite();

    s.harness.reprovision(Overrides::new()).await.unwrap();
    assert!(s.harness.state(&Role::harness()).is_live());

    s.harness
        .reprovision(Overrides::new().set("acl", "public-read"))
        .await
        .unwrap();
    assert!(s.harness.state(&Role::harness()).is_live());
}

#[tokio::test]
async fn test_outputs_only_while_live() {
    let mut s = suite();

    let before = s.harness.output_for(Role::HARNESS, "bucket_arn").await;
    assert!(matches!(before, Err(HarnessError::OutputUnavailable { .. })));

    s.harness.provision(Overrides::new()).await.unwrap();
    s.harness.output_for(Role::HARNESS, "bucket_arn").await.unwrap();

    s.harness.destroy(Overrides::new()).await.unwrap();
    let after = s.harness.output_for(Role::HARNESS, "bucket_arn").await;
    assert!(matches!(after, Err(HarnessError::OutputUnavailable { .. })));
}

#[tokio::test]
async fn test_outputs_are_requeried_after_reprovision() {
    let mut s = suite();

    s.harness
        .provision(Overrides::new().set("bucket_name", "first-bucket"))
        .await
        .unwrap();
    assert_eq!(
        s.harness.output_for(Role::HARNESS, "bucket_name").await.unwrap(),
        "first-bucket"
    );

    s.harness
        .reprovision(Overrides::new().set("bucket_name", "second-bucket"))
        .await
        .unwrap();
    assert_eq!(
        s.harness.output_for(Role::HARNESS, "bucket_name").await.unwrap(),
        "second-bucket"
    );
}

#[tokio::test]
async fn test_prerequisites_output_feeds_harness() {
    let mut s = suite();
    let name = bucket_name(&s);

    s.harness
        .provision_for(&Role::prerequisites(), Overrides::new())
        .await
        .unwrap();
    let kms_key_arn = s
        .harness
        .output_for(Role::PREREQUISITES, "kms_key_arn")
        .await
        .unwrap();
    s.harness
        .provision(Overrides::new().set("kms_key_arn", kms_key_arn.as_str()))
        .await
        .unwrap();

    assert_eq!(
        kms_key_arn,
        "arn:aws:kms:eu-west-2:123456789012:key/t3st"
    );
    assert_eq!(s.cloud.bucket(&name).unwrap().sse_algorithm, "aws:kms");
    assert!(s.harness.state(&Role::prerequisites()).is_live());
}

#[tokio::test]
async fn test_unknown_output_is_unavailable() {
    let mut s = suite();
    s.harness.provision(Overrides::new()).await.unwrap();

    let err = s
        .harness
        .output_for(Role::HARNESS, "no_such_output")
        .await
        .unwrap_err();

    assert!(
        matches!(err, HarnessError::OutputUnavailable { reason, .. } if reason.contains("not found"))
    );
}

#[tokio::test]
async fn test_reopened_harness_adopts_live_instance() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = FakeTerraform::default();
    let config = || {
        bucket::bucket_module_config(
            &dir.path().join("infra"),
            "t3st",
            HarnessSettings::default().with_state_dir(dir.path().join("state")),
        )
    };

    let mut first = Harness::open(config(), Arc::new(cloud.clone())).unwrap();
    first.provision(Overrides::new()).await.unwrap();

    let mut second = Harness::open(config(), Arc::new(cloud.clone())).unwrap();
    assert!(second.state(&Role::harness()).is_live());
    assert!(matches!(
        second.provision(Overrides::new()).await,
        Err(HarnessError::AlreadyLive(_))
    ));
    assert_eq!(
        second.destroy(Overrides::new()).await.unwrap(),
        DestroyOutcome::Destroyed
    );
}
