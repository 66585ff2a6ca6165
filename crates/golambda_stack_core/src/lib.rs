//! Typed stack model for declaring serverless functions and synthesizing
//! them into a cloud assembly (CloudFormation template, asset manifest and
//! staged code archives).
//!
//! This crate only describes resources. Publishing assets and calling
//! CloudFormation is left to the deploy tool that consumes the assembly.

pub mod app;
pub mod asset;
pub mod error;
pub mod function;
pub mod stack;
pub mod template;

pub use app::{App, CloudAssembly, StackArtifact, StackId};
pub use asset::AssetCode;
pub use error::{ConstructError, SynthError, ValidationError};
pub use function::{EnvironmentVariables, FunctionDeploymentSpec, Runtime};
pub use stack::{DeploymentEnvironment, Stack, StackProps};
