use std::sync::Arc;

use lambda_runtime::{service_fn, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, field, info, info_span};

use crate::error::Error;
use crate::event::Event;
use crate::logging;
use crate::reporting;

/// Runs `callback` for every invocation until the runtime shuts down.
///
/// Each invocation is logged with its request id. A failed callback is sent to
/// Sentry when `SENTRY_DSN` is set, and its message, values and stack trace
/// are logged before the error is handed back to the runtime.
pub async fn start<F, R>(callback: F) -> Result<(), lambda_runtime::Error>
where
    F: Fn(Event) -> Result<R, Error> + Send + Sync + 'static,
    R: Serialize,
{
    logging::init();
    let _reporting = reporting::init()?;

    let callback = Arc::new(callback);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let callback = Arc::clone(&callback);
        async move {
            let event = Event::with_context(event.payload, event.context);
            invoke(callback.as_ref(), event).map_err(lambda_runtime::Error::from)
        }
    }))
    .await
}

/// One invocation outside the runtime loop.
pub fn invoke<F, R>(callback: &F, event: Event) -> Result<Value, Error>
where
    F: Fn(Event) -> Result<R, Error>,
    R: Serialize,
{
    let span = info_span!("lambda", request_id = event.request_id().unwrap_or_default());
    let _entered = span.enter();

    info!(event = %event.origin, "Lambda start");

    let response = callback(event).map_err(|error| {
        handle_error(&error);
        error
    })?;

    serde_json::to_value(response).map_err(|source| {
        let error = Error::wrap(source, "failed to encode handler response");
        handle_error(&error);
        error
    })
}

/// Reports and logs a failed invocation, then flushes the reporting client.
pub fn handle_error(error: &Error) {
    let event_id = reporting::capture(error);
    let values = serde_json::to_string(error.values()).unwrap_or_default();
    error!(
        error.sentry_event_id = event_id.map(field::display),
        error.values = %values,
        error.stacktrace = %error.stacktrace(),
        "{error}"
    );
    reporting::flush();
}
