//! Background service lifecycle for arbor.
//!
//! A [`Service`] is one unit of repeatable background work (a rescan,
//! a sweep). [`ServiceRunner::start`] schedules it once or
//! periodically on the current runtime and returns a
//! [`ServiceHandle`] for stopping it. Tick failures are contained:
//! they are logged and never escape to an unrelated task.

mod runner;

pub use runner::{BoxFuture, Schedule, Service, ServiceError, ServiceHandle, ServiceRunner};
