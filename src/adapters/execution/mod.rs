//! Execution backend adapters.

pub mod http;
pub mod mock;
pub mod sse;

pub use http::HttpExecutionBackend;
pub use mock::{MockExecutionBackend, MockResponse};
pub use sse::{BackendFrame, SseFrameStream};
