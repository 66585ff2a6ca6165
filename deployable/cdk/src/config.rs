use golambda_stack_core::EnvironmentVariables;

/// Variable carrying the error-reporting endpoint into the deployed function.
pub const SECRET_ENDPOINT_VAR: &str = "SENTRY_DSN";

/// Content of the function's environment block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EnvironmentOption {
    /// No environment block is declared.
    #[default]
    Omitted,
    /// `SENTRY_DSN` is declared with the given value, which may be empty.
    SecretEndpoint(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorConfig {
    pub environment: EnvironmentOption,
}

impl DescriptorConfig {
    pub fn without_environment() -> Self {
        Self {
            environment: EnvironmentOption::Omitted,
        }
    }

    pub fn with_secret_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            environment: EnvironmentOption::SecretEndpoint(endpoint.into()),
        }
    }

    /// Resolves the configuration from an environment lookup. An unset
    /// endpoint variable becomes an empty value, not an omitted block.
    pub fn resolve(
        inject_secret_endpoint: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        if !inject_secret_endpoint {
            return Self::without_environment();
        }
        Self::with_secret_endpoint(lookup(SECRET_ENDPOINT_VAR).unwrap_or_default())
    }

    pub fn from_process_env(inject_secret_endpoint: bool) -> Self {
        Self::resolve(inject_secret_endpoint, |name| std::env::var(name).ok())
    }

    pub fn environment_variables(&self) -> Option<EnvironmentVariables> {
        match &self.environment {
            EnvironmentOption::Omitted => None,
            EnvironmentOption::SecretEndpoint(endpoint) => Some(EnvironmentVariables::from([(
                SECRET_ENDPOINT_VAR.to_string(),
                endpoint.clone(),
            )])),
        }
    }
}
