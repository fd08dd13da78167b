//! Dispatcher facade and its worker pool

mod config;
mod dispatcher;
mod worker;

pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use worker::WorkerStats;

pub(crate) use worker::Worker;
