//! Consistency repair: stream events become queued tasks that rewrite
//! dangling product references.

pub mod consumer;
pub mod errors;
pub mod events;
pub mod handler;
pub mod observer;
pub mod queue;
pub mod server;
pub mod tasks;

pub use consumer::RepairEventConsumer;
pub use errors::{ConsumeError, TaskError};
pub use server::{TaskServer, TaskServerSettings};
