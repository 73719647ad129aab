//! In-process adapters backed by plain collections.

pub mod task_repository;

pub use task_repository::InMemoryTaskRepository;
