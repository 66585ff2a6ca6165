//! Deployment descriptor for the golambda integration function.
//!
//! Declares one function named `handler` inside the `golambda-test` stack.
//! Ambient configuration is resolved once into [`config::DescriptorConfig`];
//! building the stack itself reads nothing from the process.

pub mod config;
pub mod stack;

pub use config::{DescriptorConfig, EnvironmentOption, SECRET_ENDPOINT_VAR};
pub use stack::{handler_spec, GolambdaTestStack, STACK_NAME};
