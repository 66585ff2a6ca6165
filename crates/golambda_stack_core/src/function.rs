use std::collections::BTreeMap;

use crate::asset::AssetCode;
use crate::error::ValidationError;

pub const MIN_TIMEOUT_SECONDS: u32 = 1;
pub const MAX_TIMEOUT_SECONDS: u32 = 900;
pub const MIN_MEMORY_MB: u32 = 128;
pub const MAX_MEMORY_MB: u32 = 10_240;

pub type EnvironmentVariables = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Go1x,
    ProvidedAl2,
    ProvidedAl2023,
}

impl Runtime {
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Go1x => "go1.x",
            Self::ProvidedAl2 => "provided.al2",
            Self::ProvidedAl2023 => "provided.al2023",
        }
    }
}

/// Declarative description of one serverless function.
///
/// `environment` distinguishes "no environment block at all" (`None`) from an
/// explicit, possibly empty, variable map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDeploymentSpec {
    pub runtime: Runtime,
    pub entry_point: String,
    pub code: AssetCode,
    pub timeout_seconds: u32,
    pub memory_mb: u32,
    pub reserved_concurrency: u32,
    pub environment: Option<EnvironmentVariables>,
}

impl FunctionDeploymentSpec {
    pub fn validate(&self, resource: &str) -> Result<(), ValidationError> {
        if self.entry_point.trim().is_empty() {
            return Err(ValidationError::new(
                resource,
                "entry_point",
                "cannot be empty",
            ));
        }

        if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&self.timeout_seconds) {
            return Err(ValidationError::new(
                resource,
                "timeout_seconds",
                format!(
                    "must be between {MIN_TIMEOUT_SECONDS} and {MAX_TIMEOUT_SECONDS} seconds, got {}",
                    self.timeout_seconds
                ),
            ));
        }

        if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&self.memory_mb) {
            return Err(ValidationError::new(
                resource,
                "memory_mb",
                format!(
                    "must be between {MIN_MEMORY_MB} and {MAX_MEMORY_MB} MB, got {}",
                    self.memory_mb
                ),
            ));
        }

        if let Some(environment) = &self.environment {
            for name in environment.keys() {
                if !is_valid_variable_name(name) {
                    return Err(ValidationError::new(
                        resource,
                        "environment",
                        format!("variable name '{name}' must match [a-zA-Z][a-zA-Z0-9_]+"),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest = chars.as_str();
    first.is_ascii_alphabetic()
        && !rest.is_empty()
        && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
