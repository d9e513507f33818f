//! # trigger-rendezvous
//!
//! Poll-or-register rendezvous between developers debugging a workflow
//! trigger node and the webhook arrivals that fire it.
//!
//! A poller either collects an event already waiting in its inbox or
//! registers in the trigger's waiting pool; a dispatcher drains the pool and
//! writes the event into every registered inbox. Both sides are single
//! atomic scripts against a TTL-bounded key-value store, so a poll and a
//! dispatch can never miss each other and no broker process is needed.
//!
//! ## Architecture
//!
//! ```text
//! Clients (debug pollers, webhook receivers)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── CoordinationService (service/)
//!     ├── AddressId / keys / TriggerDebugEvent (domain/)
//!     │
//!     ├── TriggerStore + Script (store/)
//!     │
//!     └── MemoryStore | PostgresStore
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
