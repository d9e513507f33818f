//! Service layer: rendezvous orchestration.
//!
//! [`CoordinationService`] derives addresses and keys and runs the atomic
//! select / dispatch scripts against the injected [`crate::store::TriggerStore`].

pub mod coordination_service;

pub use coordination_service::CoordinationService;
