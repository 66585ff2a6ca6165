//! Trigger event access: binding the raw payload and unwrapping queue/topic
//! envelopes into their message bodies.

use std::fmt;
use std::time::{Duration, SystemTime};

use lambda_runtime::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SqsMessage {
    #[serde(rename = "messageId", default)]
    message_id: String,
    #[serde(default)]
    body: String,
    #[serde(rename = "eventSource", default, skip_serializing_if = "String::is_empty")]
    event_source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SqsEvent {
    #[serde(rename = "Records", default)]
    records: Vec<SqsMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnsEntity {
    #[serde(rename = "MessageId", default)]
    message_id: String,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnsEventRecord {
    #[serde(rename = "EventSource", default, skip_serializing_if = "String::is_empty")]
    event_source: String,
    #[serde(rename = "Sns")]
    sns: SnsEntity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnsEvent {
    #[serde(rename = "Records", default)]
    records: Vec<SnsEventRecord>,
}

/// The payload a function was invoked with, plus the invocation context when
/// it came through the runtime loop.
#[derive(Debug, Clone)]
pub struct Event {
    pub origin: Value,
    pub context: Option<Context>,
}

/// One unwrapped message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord(Vec<u8>);

impl EventRecord {
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.0).map_err(|error| {
            Error::wrap(error, "failed to decode event record").with("raw", self.to_string())
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl From<String> for EventRecord {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl Event {
    pub fn new(origin: Value) -> Self {
        Self {
            origin,
            context: None,
        }
    }

    pub fn with_context(origin: Value, context: Context) -> Self {
        Self {
            origin,
            context: Some(context),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.context
            .as_ref()
            .map(|context| context.request_id.as_str())
    }

    /// Time left before the invocation deadline, if the context carries one.
    pub fn remaining_time(&self) -> Option<Duration> {
        let deadline = self.context.as_ref()?.deadline();
        Some(
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }

    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, Error> {
        T::deserialize(&self.origin).map_err(|error| {
            Error::wrap(error, "failed to bind lambda event").with("origin", &self.origin)
        })
    }

    /// Bodies of the SQS messages in the event. Records without a message id
    /// are skipped; an event with nothing left is an error.
    pub fn decap_sqs_body(&self) -> Result<Vec<EventRecord>, Error> {
        let event: SqsEvent = self.bind()?;
        let records: Vec<EventRecord> = event
            .records
            .into_iter()
            .filter(|record| !record.message_id.is_empty())
            .map(|record| EventRecord::from(record.body))
            .collect();

        if records.is_empty() {
            return Err(Error::new("no SQS event records"));
        }
        Ok(records)
    }

    pub fn decap_sns_message(&self) -> Result<Vec<EventRecord>, Error> {
        let event: SnsEvent = self.bind()?;
        if event.records.is_empty() {
            return Err(Error::new("no SNS event records"));
        }

        Ok(event
            .records
            .into_iter()
            .map(|record| EventRecord::from(record.sns.message))
            .collect())
    }

    /// Messages of SNS notifications delivered through an SQS subscription.
    pub fn decap_sns_over_sqs(&self) -> Result<Vec<EventRecord>, Error> {
        let event: SqsEvent = self.bind()?;
        if event.records.is_empty() {
            return Err(Error::new("no SQS event records"));
        }

        let mut records = Vec::with_capacity(event.records.len());
        for record in event.records {
            let entity: SnsEntity = serde_json::from_str(&record.body).map_err(|error| {
                Error::wrap(error, "failed to decode SNS entity in SQS message")
                    .with("body", &record.body)
            })?;
            records.push(EventRecord::from(entity.message));
        }
        Ok(records)
    }

    /// SQS event with one message per value, each body JSON-encoded.
    pub fn sqs<T: Serialize>(values: &[T]) -> Result<Self, Error> {
        let records = values
            .iter()
            .map(|value| encode(value).map(sqs_message))
            .collect::<Result<Vec<_>, _>>()?;
        to_event(&SqsEvent { records })
    }

    pub fn sns<T: Serialize>(values: &[T]) -> Result<Self, Error> {
        let records = values
            .iter()
            .map(|value| {
                encode(value).map(|message| SnsEventRecord {
                    event_source: "aws:sns".to_string(),
                    sns: sns_entity(message),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        to_event(&SnsEvent { records })
    }

    pub fn sns_over_sqs<T: Serialize>(values: &[T]) -> Result<Self, Error> {
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            let entity = sns_entity(encode(value)?);
            let body = serde_json::to_string(&entity)
                .map_err(|error| Error::wrap(error, "failed to encode SNS entity"))?;
            records.push(sqs_message(body));
        }
        to_event(&SqsEvent { records })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|error| Error::wrap(error, "failed to encode event value"))
}

fn sqs_message(body: String) -> SqsMessage {
    SqsMessage {
        message_id: Uuid::new_v4().to_string(),
        body,
        event_source: "aws:sqs".to_string(),
    }
}

fn sns_entity(message: String) -> SnsEntity {
    SnsEntity {
        message_id: Uuid::new_v4().to_string(),
        kind: "Notification".to_string(),
        message,
    }
}

fn to_event(value: &impl Serialize) -> Result<Event, Error> {
    serde_json::to_value(value)
        .map(Event::new)
        .map_err(|error| Error::wrap(error, "failed to encode event"))
}
