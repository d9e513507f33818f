//! Poll and dispatch DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{RequesterIdentity, TriggerDebugEvent, keys};
use crate::error::RendezvousError;

/// Request body for `POST .../triggers/{trigger_name}/poll`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PollRequest {
    /// User running the debug session.
    pub user_id: String,
    /// App containing the trigger node.
    pub app_id: String,
    /// Trigger node being debugged.
    pub node_id: String,
}

impl PollRequest {
    /// Validates the body into a [`RequesterIdentity`].
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::InvalidRequest`] if any field is empty.
    pub fn into_identity(self) -> Result<RequesterIdentity, RendezvousError> {
        RequesterIdentity::new(self.user_id, self.app_id, self.node_id)
    }
}

/// Response body for a poll that collected an event.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PollResponse {
    /// The consumed event.
    pub event: TriggerDebugEvent,
    /// When the event was handed to this poller.
    pub received_at: DateTime<Utc>,
}

/// Request body for `POST .../dispatch`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DispatchRequest {
    /// Trigger names whose waiting pools receive the event.
    pub triggers: Vec<String>,
    /// Inbound request identifier. Generated when absent.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Arrival time in epoch seconds. Defaults to now.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Opaque data handed to pollers unchanged.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl DispatchRequest {
    /// Validates the trigger list.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::InvalidRequest`] if the list is empty or
    /// contains an invalid name.
    pub fn validate(&self) -> Result<(), RendezvousError> {
        if self.triggers.is_empty() {
            return Err(RendezvousError::InvalidRequest(
                "triggers must not be empty".to_string(),
            ));
        }
        for trigger in &self.triggers {
            keys::validate_segment("trigger", trigger)?;
        }
        Ok(())
    }

    /// Builds the event to dispatch for `subscription_id`.
    #[must_use]
    pub fn to_event(&self, subscription_id: &str) -> TriggerDebugEvent {
        let request_id = self
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let timestamp = self.timestamp.unwrap_or_else(|| Utc::now().timestamp());
        let event = TriggerDebugEvent::new(subscription_id, request_id, timestamp);
        match &self.payload {
            Some(payload) => event.with_payload(payload.clone()),
            None => event,
        }
    }
}

/// Response body for `POST .../dispatch`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchResponse {
    /// Number of inboxes written across all triggers.
    pub dispatched: usize,
    /// The event as dispatched, including generated defaults.
    pub event: TriggerDebugEvent,
    /// Dispatch timestamp.
    pub dispatched_at: DateTime<Utc>,
}
