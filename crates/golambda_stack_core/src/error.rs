use std::path::PathBuf;

use thiserror::Error;

/// Raised while registering stacks and constructs in an [`crate::app::App`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructError {
    #[error("invalid stack name '{name}': {reason}")]
    InvalidStackName { name: String, reason: String },
    #[error("stack '{0}' is already registered in this app")]
    DuplicateStack(String),
    #[error("invalid construct id '{id}': {reason}")]
    InvalidConstructId { id: String, reason: String },
    #[error("construct '{id}' already exists in stack '{stack}'")]
    DuplicateConstruct { stack: String, id: String },
}

/// A function property outside what the target platform accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource}: {field} {message}")]
pub struct ValidationError {
    resource: String,
    field: &'static str,
    message: String,
}

impl ValidationError {
    pub fn new(
        resource: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            field,
            message: message.into(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("asset directory for '{resource}' does not exist: {}", path.display())]
    MissingAsset { resource: String, path: PathBuf },
    #[error("asset directory link at {} points back at one of its parents", path.display())]
    SymlinkCycle { path: PathBuf },
    #[error("i/o failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize cloud assembly document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to stage asset archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl SynthError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
