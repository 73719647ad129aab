//! Domain layer for the Cadence task engine
//!
//! This module contains core business logic, domain models and the port
//! traits implemented by adapters.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
