//! Execution backend implementations.

pub mod batch;
pub mod local;
pub mod mock;
pub mod noop;
pub mod registry;
pub mod tools;

pub use batch::BatchBackend;
pub use local::{LocalBackend, LocalBackendConfig};
pub use mock::{MockBackend, MockRun};
pub use noop::NoopBackend;
pub use registry::BackendRegistry;
pub use tools::ToolRunner;
