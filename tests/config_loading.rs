// tests/config_loading.rs

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use flow::config::loader::env_var_name;
use flow::config::{load_layered, parse_override, FlowConfig};
use flow::errors::FlowError;
use flow::task::ResourceSpec;
use flow::types::{FailurePolicy, JobRunner};

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_apply_without_any_source() {
    let cfg = load_layered(None, None, no_env, &[]).unwrap();

    assert_eq!(cfg.config.flowdir, PathBuf::from(".flow"));
    assert_eq!(cfg.config.job_runner, JobRunner::Local);
    assert_eq!(cfg.config.failure_policy, FailurePolicy::FailFast);
    assert!(cfg.budget.is_unlimited());
    assert!(cfg.resources.is_empty());
    assert_eq!(cfg.log_dir(), PathBuf::from(".flow").join("logs"));
}

#[test]
fn local_file_overrides_user_file_field_by_field() {
    let user = toml_file(
        r#"
[config]
job_runner = "singularity"
flowdir = "/scratch/flow"

[budget]
cpus = 8

[resources.bwa]
cpus = 4
memory = 8000
time = 60
container = "docker://biocontainers/bwa"
"#,
    );
    let local = toml_file(
        r#"
[config]
job_runner = "docker"
failure_policy = "continue"

[budget]
memory = 32000

[resources.bwa]
memory = 16000
"#,
    );

    let cfg = load_layered(Some(user.path()), Some(local.path()), no_env, &[]).unwrap();

    assert_eq!(cfg.config.job_runner, JobRunner::Docker);
    assert_eq!(cfg.config.flowdir, PathBuf::from("/scratch/flow"));
    assert_eq!(cfg.config.failure_policy, FailurePolicy::Continue);
    assert_eq!(cfg.budget.cpus, Some(8));
    assert_eq!(cfg.budget.memory, Some(32000));

    let bwa = cfg.resources_for("bwa");
    assert_eq!(bwa.cpus, Some(4));
    assert_eq!(bwa.memory, Some(16000));
    assert_eq!(bwa.time, Some(60));
    assert_eq!(bwa.container.as_deref(), Some("docker://biocontainers/bwa"));

    assert_eq!(cfg.resources_for("unknown"), ResourceSpec::default());
}

#[test]
fn missing_user_file_is_ignored_but_missing_local_file_is_an_error() {
    let absent = PathBuf::from("/definitely/not/here/flow.toml");

    assert!(load_layered(Some(&absent), None, no_env, &[]).is_ok());

    match load_layered(None, Some(&absent), no_env, &[]) {
        Err(FlowError::ConfigError(msg)) => assert!(msg.contains("not found")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn environment_overrides_files_and_overrides_win_over_environment() {
    let local = toml_file(
        r#"
[budget]
cpus = 4

[resources.sort]
cpus = 1
"#,
    );

    let env: HashMap<&str, &str> = [
        ("FLOW_BUDGET_CPUS", "16"),
        ("FLOW_FAILURE_POLICY", "hard_cancel"),
        ("FLOW_RESOURCES_SORT_CPUS", "2"),
    ]
    .into_iter()
    .collect();
    let lookup = |name: &str| env.get(name).map(|v| v.to_string());

    let cfg = load_layered(None, Some(local.path()), lookup, &[]).unwrap();
    assert_eq!(cfg.budget.cpus, Some(16));
    assert_eq!(cfg.config.failure_policy, FailurePolicy::HardCancel);
    assert_eq!(cfg.resources_for("sort").cpus, Some(2));

    let overrides = vec![
        parse_override("budget.cpus=32").unwrap(),
        parse_override("resources.sort.container=docker://samtools").unwrap(),
    ];
    let cfg = load_layered(None, Some(local.path()), lookup, &overrides).unwrap();
    assert_eq!(cfg.budget.cpus, Some(32));
    assert_eq!(
        cfg.resources_for("sort").container.as_deref(),
        Some("docker://samtools")
    );
}

#[test]
fn env_var_names_are_derived_from_dotted_keys() {
    assert_eq!(env_var_name("budget.cpus"), "FLOW_BUDGET_CPUS");
    assert_eq!(env_var_name("job_runner"), "FLOW_JOB_RUNNER");
    assert_eq!(env_var_name("resources.bwa-mem.time"), "FLOW_RESOURCES_BWA_MEM_TIME");
}

#[test]
fn set_rejects_unknown_keys_and_bad_values() {
    let mut cfg = FlowConfig::default();

    assert!(matches!(cfg.set("nope", "1"), Err(FlowError::ConfigError(_))));
    assert!(matches!(cfg.set("budget.gpus", "1"), Err(FlowError::ConfigError(_))));
    assert!(matches!(cfg.set("budget.cpus", "many"), Err(FlowError::ConfigError(_))));
    assert!(matches!(cfg.set("job_runner", "slurm"), Err(FlowError::ConfigError(_))));
    assert!(matches!(
        cfg.set("resources.bwa.gpus", "1"),
        Err(FlowError::ConfigError(_))
    ));

    cfg.set("config.job_runner", "singularity").unwrap();
    assert_eq!(cfg.config.job_runner, JobRunner::Singularity);
}

#[test]
fn malformed_override_is_rejected() {
    assert!(parse_override("budget.cpus").is_err());
    assert!(parse_override("=3").is_err());
    assert_eq!(
        parse_override("flowdir=/tmp/x=y").unwrap(),
        ("flowdir".to_string(), "/tmp/x=y".to_string())
    );
}

#[test]
fn zero_budget_fails_validation() {
    let local = toml_file("[budget]\ncpus = 0\n");

    match load_layered(None, Some(local.path()), no_env, &[]) {
        Err(FlowError::ConfigError(msg)) => assert!(msg.contains("cpus")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn invalid_toml_is_reported() {
    let local = toml_file("[config\njob_runner = ");
    let result = load_layered(None, Some(local.path()), no_env, &[]);
    assert!(matches!(result, Err(FlowError::TomlError(_))));
}

#[test]
fn start_from_scratch_is_a_known_key() {
    let cfg = load_layered(None, None, no_env, &[]).unwrap();
    assert!(!cfg.config.start_from_scratch);
    assert!(cfg.known_keys().contains(&"start_from_scratch".to_string()));

    let local = toml_file("[config]\nstart_from_scratch = true\n");
    let cfg = load_layered(None, Some(local.path()), no_env, &[]).unwrap();
    assert!(cfg.config.start_from_scratch);

    let env: HashMap<&str, &str> = HashMap::from([("FLOW_START_FROM_SCRATCH", "false")]);
    let cfg = load_layered(
        None,
        Some(local.path()),
        |name| env.get(name).map(|v| v.to_string()),
        &[],
    )
    .unwrap();
    assert!(!cfg.config.start_from_scratch);

    let mut cfg = FlowConfig::default();
    assert!(matches!(
        cfg.set("start_from_scratch", "yes"),
        Err(FlowError::ConfigError(_))
    ));
}

#[test]
fn written_config_loads_back_to_the_same_values() {
    let mut cfg = FlowConfig::default();
    cfg.set("job_runner", "docker").unwrap();
    cfg.set("failure_policy", "hard-cancel").unwrap();
    cfg.set("flowdir", "/scratch/flow").unwrap();
    cfg.set("budget.cpus", "12").unwrap();
    cfg.set("resources.bwa.cpus", "4").unwrap();
    cfg.set("resources.bwa.memory", "8000").unwrap();
    cfg.set("resources.bwa.container", "docker://biocontainers/bwa").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flow.toml");
    cfg.write_config_as(&path).unwrap();

    let loaded = load_layered(None, Some(&path), no_env, &[]).unwrap();
    assert_eq!(loaded.config.job_runner, JobRunner::Docker);
    assert_eq!(loaded.config.failure_policy, FailurePolicy::HardCancel);
    assert_eq!(loaded.config.flowdir, PathBuf::from("/scratch/flow"));
    assert_eq!(loaded.budget.cpus, Some(12));
    assert_eq!(loaded.budget.memory, None);
    assert_eq!(
        loaded.resources_for("bwa"),
        ResourceSpec {
            cpus: Some(4),
            memory: Some(8000),
            time: None,
            container: Some("docker://biocontainers/bwa".to_string()),
            extra_args: None,
        }
    );
}

#[test]
fn write_config_refuses_to_overwrite_an_existing_file() {
    let existing = toml_file("# keep me\n");

    match FlowConfig::default().write_config_as(existing.path()) {
        Err(FlowError::ConfigError(msg)) => assert!(msg.contains("refusing to overwrite")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
    assert_eq!(
        std::fs::read_to_string(existing.path()).unwrap(),
        "# keep me\n"
    );
}

#[tokio::test]
async fn write_config_flag_writes_the_resolved_config_without_a_workflow() {
    use clap::Parser;
    use flow::cli::CliArgs;

    let local = toml_file("[budget]\ncpus = 6\n");
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("resolved.toml");

    let args = CliArgs::try_parse_from([
        OsString::from("flow"),
        OsString::from("--config"),
        local.path().into(),
        OsString::from("--set"),
        OsString::from("job_runner=singularity"),
        OsString::from("--write-config"),
        out.clone().into(),
    ])
    .unwrap();
    assert!(args.workflow.is_none());

    flow::run(args.clone()).await.unwrap();

    let written = load_layered(None, Some(&out), no_env, &[]).unwrap();
    assert_eq!(written.budget.cpus, Some(6));
    assert_eq!(written.config.job_runner, JobRunner::Singularity);

    // Second attempt must not clobber the first file.
    assert!(flow::run(args).await.is_err());
}

#[test]
fn workflow_is_required_unless_writing_config() {
    use clap::Parser;
    use flow::cli::CliArgs;

    assert!(CliArgs::try_parse_from(["flow"]).is_err());
    assert!(CliArgs::try_parse_from(["flow", "--write-config", "/tmp/x.toml"]).is_ok());
}
