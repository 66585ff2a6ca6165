//! Error reporting to Sentry, switched on by `SENTRY_DSN`.

use std::time::Duration;

use sentry::types::{Dsn, Uuid};
use sentry::{ClientInitGuard, ClientOptions, Hub};

use crate::error::Error;

pub const SENTRY_DSN_VAR: &str = "SENTRY_DSN";
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Client options for `dsn`. An empty value leaves reporting off.
pub fn client_options(dsn: &str) -> Result<Option<ClientOptions>, Error> {
    let dsn = dsn.trim();
    if dsn.is_empty() {
        return Ok(None);
    }

    let dsn: Dsn = dsn
        .parse()
        .map_err(|error| Error::wrap(error, "invalid Sentry DSN").with("env", SENTRY_DSN_VAR))?;
    Ok(Some(ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        ..ClientOptions::default()
    }))
}

/// Binds a client to the process hub when `SENTRY_DSN` names a project.
/// Dropping the guard flushes pending events.
pub fn init() -> Result<Option<ClientInitGuard>, Error> {
    let Ok(dsn) = std::env::var(SENTRY_DSN_VAR) else {
        return Ok(None);
    };
    Ok(client_options(&dsn)?.map(sentry::init))
}

/// Sends `error` to the bound client, returning the event id when one was sent.
pub fn capture(error: &Error) -> Option<Uuid> {
    let enabled = Hub::current()
        .client()
        .is_some_and(|client| client.is_enabled());
    if !enabled {
        return None;
    }

    let event_id = sentry::capture_error(error);
    (!event_id.is_nil()).then_some(event_id)
}

/// Waits up to [`FLUSH_TIMEOUT`] for queued events to be delivered.
pub fn flush() {
    if let Some(client) = Hub::current().client() {
        client.flush(Some(FLUSH_TIMEOUT));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dsn_disables_reporting() {
        assert!(client_options("").expect("empty dsn").is_none());
        assert!(client_options("  ").expect("blank dsn").is_none());
    }

    #[test]
    fn parses_project_dsn() {
        let options = client_options("https://public@sentry.example.com/42")
            .expect("valid dsn")
            .expect("reporting enabled");
        let dsn = options.dsn.expect("dsn set");
        assert_eq!(dsn.project_id().to_string(), "42");
    }

    #[test]
    fn malformed_dsn_is_an_error() {
        let error = client_options("not a dsn").expect_err("malformed dsn");
        assert!(error.message().starts_with("invalid Sentry DSN"));
        assert_eq!(error.values()["env"], SENTRY_DSN_VAR);
    }

    #[test]
    fn capture_without_client_sends_nothing() {
        assert_eq!(capture(&Error::new("unreported")), None);
    }
}
