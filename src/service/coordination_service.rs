//! Coordination service: poll-or-register and drain-and-fan-out.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{DEFAULT_EVENT_TTL_SECS, DEFAULT_FANOUT_WARN_THRESHOLD};
use crate::domain::{AddressId, RequesterIdentity, TriggerDebugEvent, keys};
use crate::error::RendezvousError;
use crate::store::{Script, TriggerStore};

/// Rendezvous between debug pollers and webhook dispatchers.
///
/// Stateless coordinator: owns only the injected [`TriggerStore`] and two
/// constants. Every call is one atomic script per pool; all cross-caller
/// coordination happens inside the store.
#[derive(Debug, Clone)]
pub struct CoordinationService {
    store: Arc<dyn TriggerStore>,
    event_ttl: Duration,
    fanout_warn_threshold: usize,
}

impl CoordinationService {
    /// Creates a service with the default TTL and fan-out threshold.
    #[must_use]
    pub fn new(store: Arc<dyn TriggerStore>) -> Self {
        Self {
            store,
            event_ttl: Duration::from_secs(DEFAULT_EVENT_TTL_SECS),
            fanout_warn_threshold: DEFAULT_FANOUT_WARN_THRESHOLD,
        }
    }

    /// Overrides the inbox / waiting-pool TTL.
    #[must_use]
    pub fn with_event_ttl(mut self, ttl: Duration) -> Self {
        self.event_ttl = ttl;
        self
    }

    /// Overrides the trigger count above which `dispatch` logs a warning.
    #[must_use]
    pub fn with_fanout_warn_threshold(mut self, threshold: usize) -> Self {
        self.fanout_warn_threshold = threshold;
        self
    }

    /// Returns a reference to the injected store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TriggerStore> {
        &self.store
    }

    /// Returns the configured event TTL.
    #[must_use]
    pub const fn event_ttl(&self) -> Duration {
        self.event_ttl
    }

    /// Returns the configured fan-out warning threshold.
    #[must_use]
    pub const fn fanout_warn_threshold(&self) -> usize {
        self.fanout_warn_threshold
    }

    /// Collects a pending event for `requester`, or registers it to receive
    /// the next one dispatched to `trigger_name`.
    ///
    /// Returns `Ok(None)` when nothing was pending. A store failure is
    /// logged and also reported as `Ok(None)`; the caller's poll loop is
    /// expected to try again.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::InvalidRequest`] if an identifier is not a
    /// valid key segment, or [`RendezvousError::MalformedEvent`] if the inbox
    /// held a value that does not decode as a [`TriggerDebugEvent`]. The
    /// value has been consumed by then.
    pub async fn poll(
        &self,
        tenant_id: &str,
        requester: &RequesterIdentity,
        subscription_id: &str,
        trigger_name: &str,
    ) -> Result<Option<TriggerDebugEvent>, RendezvousError> {
        keys::validate_segment("tenant_id", tenant_id)?;
        keys::validate_segment("subscription_id", subscription_id)?;
        keys::validate_segment("trigger_name", trigger_name)?;

        let address = AddressId::derive(requester);
        let script = Script::Select {
            inbox_key: keys::inbox_for(tenant_id, &address),
            waiting_pool_key: keys::waiting_pool(tenant_id, subscription_id, trigger_name),
            address_id: address.as_str().to_string(),
            ttl: self.event_ttl,
        };

        let raw = match self.store.eval(&script).await.and_then(|r| r.into_value()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    tenant_id,
                    subscription_id,
                    trigger_name,
                    "failed to poll debug event"
                );
                return Ok(None);
            }
        };

        let Some(raw) = raw else {
            tracing::debug!(tenant_id, %address, trigger_name, "registered in waiting pool");
            return Ok(None);
        };

        let event = TriggerDebugEvent::decode(&raw)?;
        tracing::debug!(
            tenant_id,
            %address,
            request_id = %event.request_id,
            "debug event delivered"
        );
        Ok(Some(event))
    }

    /// Delivers `event` to every address waiting on any of `trigger_names`.
    ///
    /// Each trigger's pool is drained by its own atomic script. A store
    /// failure on one trigger is logged and skipped; the remaining triggers
    /// are still dispatched. Returns the number of inboxes written across
    /// all triggers that succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::InvalidRequest`] if the tenant, the
    /// subscription or any trigger name is not a valid key segment, or
    /// [`RendezvousError::Serialization`] if the event cannot be encoded.
    /// Nothing is dispatched in either case.
    pub async fn dispatch(
        &self,
        tenant_id: &str,
        subscription_id: &str,
        trigger_names: &[String],
        event: &TriggerDebugEvent,
    ) -> Result<usize, RendezvousError> {
        keys::validate_segment("tenant_id", tenant_id)?;
        keys::validate_segment("subscription_id", subscription_id)?;
        for trigger_name in trigger_names {
            keys::validate_segment("trigger_name", trigger_name)?;
        }
        let payload = event.encode()?;

        if trigger_names.len() > self.fanout_warn_threshold {
            tracing::warn!(
                triggers = trigger_names.len(),
                threshold = self.fanout_warn_threshold,
                tenant_id,
                subscription_id,
                "too many triggers to dispatch at once"
            );
        }

        let mut dispatched = 0usize;
        for trigger_name in trigger_names {
            let script = Script::Dispatch {
                waiting_pool_key: keys::waiting_pool(tenant_id, subscription_id, trigger_name),
                tenant_id: tenant_id.to_string(),
                payload: payload.clone(),
                ttl: self.event_ttl,
            };
            match self.store.eval(&script).await.and_then(|r| r.into_count()) {
                Ok(count) => {
                    dispatched = dispatched.saturating_add(count);
                    if count > 0 {
                        tracing::debug!(
                            tenant_id,
                            trigger_name = %trigger_name,
                            count,
                            "debug event fanned out"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        tenant_id,
                        subscription_id,
                        trigger_name = %trigger_name,
                        "failed to dispatch for trigger"
                    );
                }
            }
        }

        Ok(dispatched)
    }

    /// Physically removes expired inboxes and waiting pools.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::Store`] if the sweep fails.
    pub async fn purge_expired(&self) -> Result<u64, RendezvousError> {
        Ok(self.store.purge_expired().await?)
    }
}
