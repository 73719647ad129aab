//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters implement:
//! - TaskRepository: task persistence
//! - ExecutionBackend: remote (or mock) task execution

pub mod execution_backend;
pub mod task_repository;

pub use execution_backend::{ExecutionBackend, ExecutionError};
pub use task_repository::{TaskFilter, TaskRepository};
