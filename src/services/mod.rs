//! Application services: command parsing, task lifecycle, execution and realtime fan-out.

pub mod command_parser;
pub mod execution_bridge;
pub mod retry;
pub mod stream_manager;
pub mod task_dispatcher;
pub mod task_store;
pub mod voice_command;

pub use command_parser::CommandParser;
pub use execution_bridge::ExecutionBridge;
pub use retry::RetryPolicy;
pub use stream_manager::StreamManager;
pub use task_dispatcher::TaskDispatcher;
pub use task_store::TaskStore;
pub use voice_command::{VoiceCommandOutcome, VoiceCommandResponse, VoiceCommandService};
