use aws_sdk_secretsmanager::config::Region;
use serde::de::DeserializeOwned;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::Error;

const ARN_PARTS: usize = 7;

pub trait SecretsManagerClient {
    fn get_secret_string(&self, secret_id: &str) -> Result<String, String>;
}

/// Builds a client for the region named in the secret ARN.
pub type SecretsManagerFactory<'a> =
    &'a dyn Fn(&str) -> Result<Box<dyn SecretsManagerClient>, Error>;

pub struct AwsSecretsManager {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretsManager {
    pub fn connect(region: &str) -> Result<Self, Error> {
        let handle = blocking_handle().map_err(Error::new)?;
        let region = Region::new(region.to_string());
        let config = tokio::task::block_in_place(|| {
            handle.block_on(
                aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(region)
                    .load(),
            )
        });
        Ok(Self {
            client: aws_sdk_secretsmanager::Client::new(&config),
        })
    }
}

impl SecretsManagerClient for AwsSecretsManager {
    fn get_secret_string(&self, secret_id: &str) -> Result<String, String> {
        let handle = blocking_handle()?;
        let client = self.client.clone();
        let secret_id = secret_id.to_string();

        tokio::task::block_in_place(|| {
            handle.block_on(async move {
                let output = client
                    .get_secret_value()
                    .secret_id(secret_id)
                    .send()
                    .await
                    .map_err(|error| format!("failed to get secret value: {error}"))?;
                output
                    .secret_string()
                    .map(str::to_string)
                    .ok_or_else(|| "secret has no string value".to_string())
            })
        })
    }
}

/// `block_in_place` only works on a multi-thread runtime worker.
fn blocking_handle() -> Result<Handle, String> {
    let handle = Handle::try_current()
        .map_err(|error| format!("secrets lookup needs a tokio runtime: {error}"))?;
    if handle.runtime_flavor() != RuntimeFlavor::MultiThread {
        return Err("secrets lookup needs a multi-thread tokio runtime".to_string());
    }
    Ok(handle)
}

/// Region component of a Secrets Manager ARN, e.g.
/// `arn:aws:secretsmanager:ap-northeast-1:1234567890:secret:mytest`.
pub fn secret_region(secret_arn: &str) -> Result<&str, Error> {
    let parts: Vec<&str> = secret_arn.split(':').collect();
    if parts.len() != ARN_PARTS || parts[3].is_empty() {
        return Err(Error::new("invalid SecretsManager ARN format").with("arn", secret_arn));
    }
    Ok(parts[3])
}

/// Fetches the secret and decodes its JSON string into `T`.
///
/// Must be called from inside a multi-thread tokio runtime, which is what
/// [`crate::start`] runs handlers on; anywhere else it returns an error.
pub fn get_secret_values<T: DeserializeOwned>(secret_arn: &str) -> Result<T, Error> {
    get_secret_values_with_factory(secret_arn, &|region| {
        Ok(Box::new(AwsSecretsManager::connect(region)?) as Box<dyn SecretsManagerClient>)
    })
}

pub fn get_secret_values_with_factory<T: DeserializeOwned>(
    secret_arn: &str,
    factory: SecretsManagerFactory<'_>,
) -> Result<T, Error> {
    let region = secret_region(secret_arn)?;
    let client = factory(region).map_err(|error| error.with("region", region))?;

    let secret = client.get_secret_string(secret_arn).map_err(|message| {
        Error::new(format!("failed to retrieve secret values: {message}")).with("arn", secret_arn)
    })?;

    serde_json::from_str(&secret).map_err(|error| {
        Error::wrap(error, "failed to parse secret values as JSON").with("arn", secret_arn)
    })
}
