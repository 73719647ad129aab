//! Cadence - voice-driven coding agent controller
//!
//! Cadence turns short natural-language commands ("add dark mode to the
//! settings page") into coding tasks, runs them on a remote execution backend
//! (or a local mock), and streams their progress to realtime subscribers.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): task lifecycle, commands, stream events and the port traits
//! - **Service Layer** (`services`): parsing, task store, execution bridge, dispatch and fan-out
//! - **Adapters** (`adapters`): in-memory and SQLite repositories, HTTP/SSE and mock
//!   execution backends, the axum HTTP/WebSocket surface
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use cadence::services::CommandParser;
//!
//! let parsed = CommandParser::new().parse("fix the login bug");
//! assert_eq!(parsed.intent.as_str(), "create_task");
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, Intent, ParsedCommand, PrState, StreamEvent, StreamEventKind, Task, TaskStatus,
};
pub use domain::ports::{ExecutionBackend, ExecutionError, TaskRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CommandParser, ExecutionBridge, StreamManager, TaskDispatcher, TaskStore, VoiceCommandService,
};
