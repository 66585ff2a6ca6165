use golambda::{Error, Event};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct MyEvent {
    message: String,
}

fn handler(event: Event) -> Result<String, Error> {
    let records = event.decap_sqs_body()?;

    let mut messages = Vec::with_capacity(records.len());
    for record in records {
        let parsed: MyEvent = record.bind()?;
        info!(message = %parsed.message, "received message");
        messages.push(parsed.message);
    }

    Ok(messages.join(":"))
}

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    golambda::start(handler).await
}
