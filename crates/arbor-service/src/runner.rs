//! Service trait, schedule and runner.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Type alias for boxed futures returned by service ticks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced by a service tick.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The tick failed; the runner logs and keeps the schedule.
    #[error("{message}")]
    Tick { message: String },
}

impl ServiceError {
    /// Create a tick error.
    pub fn tick(message: impl Into<String>) -> Self {
        Self::Tick {
            message: message.into(),
        }
    }
}

/// One unit of repeatable background work.
pub trait Service: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Perform one unit of work.
    fn tick(&self) -> BoxFuture<'_, Result<(), ServiceError>>;
}

/// When the service's tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run the tick once and finish.
    Once,
    /// Run the tick immediately, then on every period.
    Every(Duration),
}

/// Starts services on the current Tokio runtime.
pub struct ServiceRunner;

impl ServiceRunner {
    /// Start a service with the given schedule.
    ///
    /// Tick errors are logged and do not cancel the schedule.
    pub fn start(service: Arc<dyn Service>, schedule: Schedule) -> ServiceHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let name = service.name();

        let task = tokio::spawn(async move {
            info!(service = name, ?schedule, "service started");
            match schedule {
                Schedule::Once => {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        result = service.tick() => {
                            if let Err(err) = result {
                                warn!(service = name, error = %err, "service tick failed");
                            }
                        }
                    }
                }
                Schedule::Every(period) => {
                    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = interval.tick() => {
                                if let Err(err) = service.tick().await {
                                    warn!(service = name, error = %err, "service tick failed");
                                }
                            }
                        }
                    }
                }
            }
            debug!(service = name, "service stopped");
        });

        ServiceHandle {
            name,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Handle for a started service.
pub struct ServiceHandle {
    name: &'static str,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceHandle {
    /// Name of the underlying service.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the service task is still running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Cancel the service and wait for its task to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
