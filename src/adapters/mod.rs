//! Adapters for storage, execution backends and the HTTP surface.

pub mod execution;
pub mod http;
pub mod memory;
pub mod sqlite;
