//! Domain layer: requester addresses, debug events, and key naming.
//!
//! These are pure values. Everything that touches the store lives in
//! [`crate::store`] and [`crate::service`].

pub mod address;
pub mod debug_event;
pub mod keys;

pub use address::{AddressId, RequesterIdentity};
pub use debug_event::TriggerDebugEvent;
