//! Domain models.

pub mod command;
pub mod config;
pub mod execution;
pub mod realtime;
pub mod stream_event;
pub mod task;

pub use command::{Intent, ParsedCommand};
pub use config::{
    Config, ExecutionConfig, LogFormat, LoggingConfig, RealtimeConfig, RetryConfig,
    RotationPolicy, ServerConfig, StorageBackend, StorageConfig,
};
pub use execution::{ExecutionRequest, ExecutionResult, PullRequestRef};
pub use realtime::{ClientMessage, ConnectionId, ServerMessage};
pub use stream_event::{StreamEvent, StreamEventKind};
pub use task::{PrState, Task, TaskStatus};
