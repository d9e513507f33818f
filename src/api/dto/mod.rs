//! Data Transfer Objects for REST request/response serialization.

pub mod debug_dto;

pub use debug_dto::*;
