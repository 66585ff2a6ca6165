//! Helpers for writing Lambda functions: event envelope decoding, structured
//! error values, logging setup, Sentry reporting and Secrets Manager access,
//! tied together by [`start`].

pub mod error;
pub mod event;
pub mod lambda;
pub mod logging;
pub mod reporting;
pub mod secrets;

pub use error::Error;
pub use event::{Event, EventRecord};
pub use lambda::{handle_error, invoke, start};
pub use secrets::{get_secret_values, get_secret_values_with_factory, SecretsManagerClient};
