pub mod controller;
pub mod ctx;
pub mod error;
pub mod flow;
pub mod host;
pub mod link;
pub mod log;
pub mod router;
pub mod scheduler;

pub use controller::{Controller, Device};
pub use ctx::Ctx;
pub use error::{CoreError, CoreResult};
pub use flow::Flow;
pub use host::Host;
pub use link::Link;
pub use log::LogSink;
pub use router::Router;
pub use scheduler::{Action, Direction, Scheduler};
