use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::asset::{fingerprint_directory, stage_zip};
use crate::error::{ConstructError, SynthError};
use crate::stack::{validate_stack_name, Stack, StackProps};
use crate::template::{render_template, ASSET_BUCKET};

pub const CLOUD_ASSEMBLY_VERSION: &str = "36.0.0";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const DEFAULT_OUTDIR: &str = "cdk.out";

/// Index of a stack inside the [`App`] that registered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackId(usize);

/// Top-level registry of stacks; owns synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct App {
    stacks: Vec<Stack>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub function_id: String,
    pub hash: String,
    pub source_dir: PathBuf,
    pub staged_file: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackArtifact {
    pub stack_name: String,
    pub template_file: String,
    pub assets_file: String,
    pub template: Value,
    pub assets: Vec<AssetRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudAssembly {
    pub directory: PathBuf,
    pub stacks: Vec<StackArtifact>,
}

impl CloudAssembly {
    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|artifact| artifact.stack_name == name)
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(
        &mut self,
        name: impl Into<String>,
        props: StackProps,
    ) -> Result<StackId, ConstructError> {
        let name = name.into();
        validate_stack_name(&name)?;
        if self.stacks.iter().any(|stack| stack.name() == name) {
            return Err(ConstructError::DuplicateStack(name));
        }

        self.stacks.push(Stack::new(name, props));
        Ok(StackId(self.stacks.len() - 1))
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by a different `App`.
    pub fn stack(&self, id: StackId) -> &Stack {
        &self.stacks[id.0]
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by a different `App`.
    pub fn stack_mut(&mut self, id: StackId) -> &mut Stack {
        &mut self.stacks[id.0]
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Validates every stack, stages assets and writes the cloud assembly
    /// into `outdir`.
    pub fn synth(&self, outdir: &Path) -> Result<CloudAssembly, SynthError> {
        for stack in &self.stacks {
            for (id, spec) in stack.functions() {
                spec.validate(&format!("{}/{id}", stack.name()))?;
            }
        }

        fs::create_dir_all(outdir).map_err(|error| SynthError::io(outdir, error))?;

        let mut artifacts = Vec::with_capacity(self.stacks.len());
        for stack in &self.stacks {
            artifacts.push(synth_stack(stack, outdir)?);
        }

        let manifest = render_manifest(&self.stacks, &artifacts);
        write_json(&outdir.join(MANIFEST_FILE), &manifest)?;

        info!(
            outdir = %outdir.display(),
            stacks = artifacts.len(),
            "cloud assembly synthesized"
        );

        Ok(CloudAssembly {
            directory: outdir.to_path_buf(),
            stacks: artifacts,
        })
    }
}

fn synth_stack(stack: &Stack, outdir: &Path) -> Result<StackArtifact, SynthError> {
    let mut assets = Vec::new();
    let mut hashes = BTreeMap::new();

    for (id, spec) in stack.functions() {
        let source_dir = spec.code.resolve();
        if !source_dir.is_dir() {
            return Err(SynthError::MissingAsset {
                resource: format!("{}/{id}", stack.name()),
                path: source_dir,
            });
        }

        let hash = fingerprint_directory(&source_dir)?;
        let staged_file = format!("asset.{hash}.zip");
        let entries = stage_zip(&source_dir, &outdir.join(&staged_file))?;
        debug!(
            function = id,
            hash = %hash,
            entries,
            "staged function asset"
        );

        hashes.insert(id.to_string(), hash.clone());
        assets.push(AssetRecord {
            function_id: id.to_string(),
            hash,
            source_dir,
            staged_file,
        });
    }

    let template = serde_json::to_value(render_template(stack, &hashes))?;
    let template_file = format!("{}.template.json", stack.name());
    let assets_file = format!("{}.assets.json", stack.name());

    write_json(&outdir.join(&template_file), &template)?;
    write_json(&outdir.join(&assets_file), &render_asset_manifest(&assets))?;

    Ok(StackArtifact {
        stack_name: stack.name().to_string(),
        template_file,
        assets_file,
        template,
        assets,
    })
}

fn render_asset_manifest(assets: &[AssetRecord]) -> Value {
    let mut files = serde_json::Map::new();
    for asset in assets {
        files.insert(
            asset.hash.clone(),
            json!({
                "source": {
                    "path": asset.staged_file,
                    "packaging": "file"
                },
                "destinations": {
                    "current_account-current_region": {
                        "bucketName": ASSET_BUCKET,
                        "objectKey": format!("{}.zip", asset.hash),
                        "assumeRoleArn": "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/cdk-hnb659fds-file-publishing-role-${AWS::AccountId}-${AWS::Region}"
                    }
                }
            }),
        );
    }

    json!({
        "version": CLOUD_ASSEMBLY_VERSION,
        "files": files,
        "dockerImages": {}
    })
}

fn render_manifest(stacks: &[Stack], artifacts: &[StackArtifact]) -> Value {
    let mut entries = serde_json::Map::new();
    for (stack, artifact) in stacks.iter().zip(artifacts) {
        let assets_id = format!("{}.assets", artifact.stack_name);
        let environment = stack
            .props()
            .env
            .clone()
            .unwrap_or_default()
            .assembly_uri();

        entries.insert(
            assets_id.clone(),
            json!({
                "type": "cdk:asset-manifest",
                "properties": { "file": artifact.assets_file }
            }),
        );
        entries.insert(
            artifact.stack_name.clone(),
            json!({
                "type": "aws:cloudformation:stack",
                "environment": environment,
                "properties": {
                    "templateFile": artifact.template_file,
                    "stackName": artifact.stack_name
                },
                "dependencies": [assets_id]
            }),
        );
    }

    json!({
        "version": CLOUD_ASSEMBLY_VERSION,
        "artifacts": entries
    })
}

fn write_json(path: &Path, value: &Value) -> Result<(), SynthError> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body).map_err(|error| SynthError::io(path, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_stack_names() {
        let mut app = App::new();
        app.add_stack("golambda-test", StackProps::default())
            .expect("first stack");

        let error = app
            .add_stack("golambda-test", StackProps::default())
            .expect_err("duplicate should fail");
        assert_eq!(error, ConstructError::DuplicateStack("golambda-test".to_string()));
    }

    #[test]
    fn stack_ids_address_registered_stacks() {
        let mut app = App::new();
        let first = app.add_stack("first", StackProps::default()).expect("stack");
        let second = app.add_stack("second", StackProps::default()).expect("stack");

        assert_eq!(app.stack(first).name(), "first");
        assert_eq!(app.stack(second).name(), "second");
        assert_eq!(app.stacks().len(), 2);
    }

    #[test]
    #[should_panic]
    fn foreign_stack_id_panics() {
        let mut other = App::new();
        other.add_stack("first", StackProps::default()).expect("stack");
        let foreign = other.add_stack("second", StackProps::default()).expect("stack");

        let mut app = App::new();
        app.add_stack("only", StackProps::default()).expect("stack");
        app.stack(foreign);
    }

    #[test]
    fn empty_app_writes_bare_manifest() {
        let out = tempfile::tempdir().expect("tempdir");
        let assembly = App::new().synth(out.path()).expect("synth");

        assert!(assembly.stacks.is_empty());
        let manifest: Value = serde_json::from_str(
            &fs::read_to_string(out.path().join(MANIFEST_FILE)).expect("manifest"),
        )
        .expect("manifest json");
        assert_eq!(manifest["version"], CLOUD_ASSEMBLY_VERSION);
        assert_eq!(manifest["artifacts"], json!({}));
    }
}
