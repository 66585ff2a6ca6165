use std::collections::BTreeMap;

use crate::error::ConstructError;
use crate::function::FunctionDeploymentSpec;

pub const MAX_STACK_NAME_LEN: usize = 128;

/// Account and region a stack is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeploymentEnvironment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl DeploymentEnvironment {
    /// Cloud assembly notation, falling back to the deploy-time placeholders.
    pub fn assembly_uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region"),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackProps {
    pub description: Option<String>,
    pub env: Option<DeploymentEnvironment>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    name: String,
    props: StackProps,
    functions: Vec<(String, FunctionDeploymentSpec)>,
}

impl Stack {
    pub(crate) fn new(name: String, props: StackProps) -> Self {
        Self {
            name,
            props,
            functions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn props(&self) -> &StackProps {
        &self.props
    }

    pub fn add_function(
        &mut self,
        id: impl Into<String>,
        spec: FunctionDeploymentSpec,
    ) -> Result<(), ConstructError> {
        let id = id.into();
        validate_construct_id(&id)?;
        if self.function(&id).is_some() {
            return Err(ConstructError::DuplicateConstruct {
                stack: self.name.clone(),
                id,
            });
        }

        self.functions.push((id, spec));
        Ok(())
    }

    pub fn function(&self, id: &str) -> Option<&FunctionDeploymentSpec> {
        self.functions
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, spec)| spec)
    }

    /// Functions in registration order.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &FunctionDeploymentSpec)> {
        self.functions
            .iter()
            .map(|(id, spec)| (id.as_str(), spec))
    }
}

pub(crate) fn validate_stack_name(name: &str) -> Result<(), ConstructError> {
    let invalid = |reason: &str| ConstructError::InvalidStackName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = name.chars().next() else {
        return Err(invalid("cannot be empty"));
    };
    if !first.is_ascii_alphabetic() {
        return Err(invalid("must start with a letter"));
    }
    if name.len() > MAX_STACK_NAME_LEN {
        return Err(invalid("must be at most 128 characters"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid("may only contain letters, digits and '-'"));
    }
    Ok(())
}

fn validate_construct_id(id: &str) -> Result<(), ConstructError> {
    if id.trim().is_empty() {
        return Err(ConstructError::InvalidConstructId {
            id: id.to_string(),
            reason: "cannot be empty".to_string(),
        });
    }
    if id.contains('/') {
        return Err(ConstructError::InvalidConstructId {
            id: id.to_string(),
            reason: "cannot contain '/'".to_string(),
        });
    }
    Ok(())
}
