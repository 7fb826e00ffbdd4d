//! Event Grid webhook envelopes.
//!
//! A webhook body is a JSON array. It is either a one-element subscription
//! validation batch, whose code must be echoed back, or a batch of ordinary
//! events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Event type of a subscription validation request.
pub const SUBSCRIPTION_VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

/// Event type of a blob creation notification.
pub const BLOB_CREATED_EVENT: &str = "Microsoft.Storage.BlobCreated";

/// Validation request envelope. Missing fields decode as empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationEnvelope {
    /// Event identifier.
    pub id: String,
    /// Event type tag.
    pub event_type: String,
    /// Validation payload.
    pub data: ValidationData,
}

/// Payload of a validation request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationData {
    /// Opaque code to echo back.
    pub validation_code: String,
}

/// Response body completing the validation handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    /// The echoed validation code.
    pub validation_response: String,
}

/// Generic event envelope.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Event identifier.
    #[serde(default)]
    pub id: String,
    /// Event type tag. Absent tags decode as empty and never match.
    #[serde(default)]
    pub event_type: String,
    /// Publisher-defined subject.
    #[serde(default)]
    pub subject: String,
    /// Event payload; blob events carry `url`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

impl EventEnvelope {
    /// Returns true for blob creation events.
    #[must_use]
    pub fn is_blob_created(&self) -> bool {
        self.event_type == BLOB_CREATED_EVENT
    }

    /// The blob URL carried in `data.url`, if any.
    #[must_use]
    pub fn blob_url(&self) -> Option<&str> {
        self.data.get("url").and_then(Value::as_str)
    }
}

/// A decoded webhook body.
#[derive(Debug, Clone)]
pub enum WebhookBatch {
    /// Subscription validation carrying the code to echo.
    Validation(String),
    /// Ordinary events, in delivery order.
    Events(Vec<EventEnvelope>),
}

/// Decodes a webhook body.
///
/// Only the first element decides whether the batch is a validation request;
/// anything after it is ignored in that case.
///
/// # Errors
///
/// Returns the JSON error if the body is not an array of events.
pub fn parse_batch(body: &[u8]) -> Result<WebhookBatch, serde_json::Error> {
    if let Ok(envelopes) = serde_json::from_slice::<Vec<ValidationEnvelope>>(body) {
        if let Some(first) = envelopes.into_iter().next() {
            if first.event_type == SUBSCRIPTION_VALIDATION_EVENT {
                return Ok(WebhookBatch::Validation(first.data.validation_code));
            }
        }
    }
    serde_json::from_slice(body).map(WebhookBatch::Events)
}
