//! The event delivered to a polling debugger.
//!
//! [`TriggerDebugEvent`] is stored in inboxes as its JSON encoding. The
//! three identifying fields are always present; `payload` carries whatever
//! the producer attached and is omitted from the encoding when absent.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::error::RendezvousError;

/// An external event captured for a trigger under debug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TriggerDebugEvent {
    /// Subscription that received the event.
    pub subscription_id: String,
    /// Identifier of the inbound request that produced the event.
    pub request_id: String,
    /// Arrival time in seconds since the Unix epoch.
    pub timestamp: i64,
    /// Opaque producer-supplied data.
    #[serde(
        default,
        deserialize_with = "present_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<serde_json::Value>,
}

/// A `payload` key that is present decodes as `Some`, even when it is
/// `null`. Only an absent key yields `None`.
fn present_payload<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl TriggerDebugEvent {
    /// Creates an event without a payload.
    #[must_use]
    pub fn new(
        subscription_id: impl Into<String>,
        request_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            request_id: request_id.into(),
            timestamp,
            payload: None,
        }
    }

    /// Attaches an opaque payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Encodes the event into its stored form.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::Serialization`] if the payload cannot be
    /// encoded.
    pub fn encode(&self) -> Result<String, RendezvousError> {
        serde_json::to_string(self).map_err(|e| RendezvousError::Serialization(e.to_string()))
    }

    /// Decodes an event read back from an inbox.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::MalformedEvent`] if `raw` is not a valid
    /// encoded event.
    pub fn decode(raw: &str) -> Result<Self, RendezvousError> {
        serde_json::from_str(raw).map_err(|e| RendezvousError::MalformedEvent(e.to_string()))
    }
}
