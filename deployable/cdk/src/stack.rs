use std::path::Path;

use golambda_stack_core::{
    App, AssetCode, ConstructError, FunctionDeploymentSpec, Runtime, Stack, StackId, StackProps,
};

use crate::config::DescriptorConfig;

pub const STACK_NAME: &str = "golambda-test";
pub const HANDLER_ID: &str = "handler";
pub const ENTRY_POINT: &str = "handler";
pub const RUNTIME: Runtime = Runtime::ProvidedAl2023;
pub const TIMEOUT_SECONDS: u32 = 10;
pub const MEMORY_MB: u32 = 128;
pub const RESERVED_CONCURRENCY: u32 = 1;
pub const ASSET_PATH: &str = "../build";

/// Directory this descriptor is declared in; the asset path is relative to it.
pub fn descriptor_dir() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

pub fn handler_spec(config: &DescriptorConfig) -> FunctionDeploymentSpec {
    FunctionDeploymentSpec {
        runtime: RUNTIME,
        entry_point: ENTRY_POINT.to_string(),
        code: AssetCode::from_asset(descriptor_dir(), ASSET_PATH),
        timeout_seconds: TIMEOUT_SECONDS,
        memory_mb: MEMORY_MB,
        reserved_concurrency: RESERVED_CONCURRENCY,
        environment: config.environment_variables(),
    }
}

/// The golambda integration stack: a single function registered as `handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GolambdaTestStack {
    id: StackId,
}

impl GolambdaTestStack {
    pub fn new(
        app: &mut App,
        name: &str,
        props: StackProps,
        config: &DescriptorConfig,
    ) -> Result<Self, ConstructError> {
        let id = app.add_stack(name, props)?;
        app.stack_mut(id)
            .add_function(HANDLER_ID, handler_spec(config))?;
        Ok(Self { id })
    }

    pub fn id(&self) -> StackId {
        self.id
    }

    pub fn stack<'a>(&self, app: &'a App) -> &'a Stack {
        app.stack(self.id)
    }

    pub fn handler<'a>(&self, app: &'a App) -> Option<&'a FunctionDeploymentSpec> {
        self.stack(app).function(HANDLER_ID)
    }
}
