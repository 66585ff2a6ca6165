use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use golambda_stack_core::app::MANIFEST_FILE;
use golambda_stack_core::template::function_logical_id;
use golambda_stack_core::{
    App, AssetCode, DeploymentEnvironment, FunctionDeploymentSpec, Runtime, StackProps, SynthError,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn write_build_dir(root: &Path) {
    let build = root.join("build");
    fs::create_dir_all(&build).expect("create build dir");
    fs::write(build.join("bootstrap"), b"\x7fELF fake binary").expect("write bootstrap");
}

fn spec(descriptor_dir: &Path, timeout_seconds: u32) -> FunctionDeploymentSpec {
    FunctionDeploymentSpec {
        runtime: Runtime::ProvidedAl2023,
        entry_point: "handler".to_string(),
        code: AssetCode::from_asset(descriptor_dir, "../build"),
        timeout_seconds,
        memory_mb: 128,
        reserved_concurrency: 1,
        environment: Some(BTreeMap::from([(
            "SENTRY_DSN".to_string(),
            "https://example.test/123".to_string(),
        )])),
    }
}

fn app_with(descriptor_dir: &Path, timeout_seconds: u32, props: StackProps) -> App {
    let mut app = App::new();
    let id = app.add_stack("golambda-test", props).expect("stack");
    app.stack_mut(id)
        .add_function("handler", spec(descriptor_dir, timeout_seconds))
        .expect("function");
    app
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read file")).expect("parse json")
}

#[test]
fn writes_template_assets_and_manifest() {
    let workspace = tempfile::tempdir().expect("tempdir");
    write_build_dir(workspace.path());
    let descriptor_dir = workspace.path().join("cdk");
    fs::create_dir_all(&descriptor_dir).expect("create descriptor dir");
    let out = workspace.path().join("cdk.out");

    let props = StackProps {
        env: Some(DeploymentEnvironment {
            account: Some("123456789012".to_string()),
            region: Some("ap-northeast-1".to_string()),
        }),
        ..StackProps::default()
    };
    let assembly = app_with(&descriptor_dir, 10, props)
        .synth(&out)
        .expect("synth should pass");

    let artifact = assembly.stack("golambda-test").expect("stack artifact");
    assert_eq!(artifact.template_file, "golambda-test.template.json");
    assert_eq!(artifact.assets.len(), 1);
    let asset = &artifact.assets[0];
    assert!(out.join(&asset.staged_file).is_file());

    let template = read_json(&out.join(&artifact.template_file));
    let function = &template["Resources"][function_logical_id("handler")];
    assert_eq!(function["Properties"]["Code"]["S3Key"], format!("{}.zip", asset.hash));
    assert_eq!(
        function["Properties"]["Environment"]["Variables"]["SENTRY_DSN"],
        "https://example.test/123"
    );

    let assets = read_json(&out.join(&artifact.assets_file));
    assert_eq!(
        assets["files"][&asset.hash]["source"]["path"],
        Value::String(asset.staged_file.clone())
    );

    let manifest = read_json(&out.join(MANIFEST_FILE));
    assert_eq!(
        manifest["artifacts"]["golambda-test"]["environment"],
        "aws://123456789012/ap-northeast-1"
    );
    assert_eq!(
        manifest["artifacts"]["golambda-test"]["properties"]["templateFile"],
        "golambda-test.template.json"
    );
}

#[test]
fn synthesis_is_byte_identical_across_runs() {
    let workspace = tempfile::tempdir().expect("tempdir");
    write_build_dir(workspace.path());
    let descriptor_dir = workspace.path().join("cdk");

    let first = workspace.path().join("first.out");
    let second = workspace.path().join("second.out");
    app_with(&descriptor_dir, 10, StackProps::default())
        .synth(&first)
        .expect("first synth");
    app_with(&descriptor_dir, 10, StackProps::default())
        .synth(&second)
        .expect("second synth");

    for file in ["golambda-test.template.json", "golambda-test.assets.json", MANIFEST_FILE] {
        assert_eq!(
            fs::read_to_string(first.join(file)).expect("first"),
            fs::read_to_string(second.join(file)).expect("second"),
            "{file} differs between runs"
        );
    }
}

#[test]
fn rejects_out_of_range_timeout_before_writing() {
    let workspace = tempfile::tempdir().expect("tempdir");
    write_build_dir(workspace.path());
    let out = workspace.path().join("cdk.out");

    let error = app_with(&workspace.path().join("cdk"), 0, StackProps::default())
        .synth(&out)
        .expect_err("timeout should fail");

    match error {
        SynthError::Validation(validation) => {
            assert_eq!(validation.resource(), "golambda-test/handler");
            assert_eq!(validation.field(), "timeout_seconds");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!out.exists());
}

#[test]
fn reports_missing_asset_directory() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let out = workspace.path().join("cdk.out");

    let error = app_with(&workspace.path().join("cdk"), 10, StackProps::default())
        .synth(&out)
        .expect_err("missing build dir should fail");

    match error {
        SynthError::MissingAsset { resource, path } => {
            assert_eq!(resource, "golambda-test/handler");
            assert_eq!(path, workspace.path().join("build"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn resynthesis_replaces_truncated_asset_archive() {
    let workspace = tempfile::tempdir().expect("tempdir");
    write_build_dir(workspace.path());
    let descriptor_dir = workspace.path().join("cdk");
    let out = workspace.path().join("cdk.out");

    let assembly = app_with(&descriptor_dir, 10, StackProps::default())
        .synth(&out)
        .expect("first synth");
    let staged = out.join(&assembly.stacks[0].assets[0].staged_file);
    let complete = fs::read(&staged).expect("staged archive");
    fs::write(&staged, &complete[..complete.len() / 2]).expect("truncate archive");

    app_with(&descriptor_dir, 10, StackProps::default())
        .synth(&out)
        .expect("second synth");

    assert_eq!(fs::read(&staged).expect("restaged archive"), complete);
}

#[cfg(unix)]
#[test]
fn symlinked_bootstrap_is_staged() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let binary = workspace.path().join("decap_event");
    fs::write(&binary, b"\x7fELF linked binary").expect("write binary");
    let build = workspace.path().join("build");
    fs::create_dir_all(&build).expect("create build dir");
    std::os::unix::fs::symlink(&binary, build.join("bootstrap")).expect("symlink");
    let out = workspace.path().join("cdk.out");

    let assembly = app_with(&workspace.path().join("cdk"), 10, StackProps::default())
        .synth(&out)
        .expect("synth");

    let staged = out.join(&assembly.stacks[0].assets[0].staged_file);
    let mut archive =
        zip::ZipArchive::new(fs::File::open(staged).expect("open archive")).expect("archive");
    assert_eq!(archive.len(), 1);
    assert_eq!(
        archive.by_name("bootstrap").expect("bootstrap entry").size(),
        b"\x7fELF linked binary".len() as u64
    );
}
