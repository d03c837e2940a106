use futures::future::BoxFuture;

/// Runs fire-and-forget background work such as cache writes.
///
/// No ordering guarantee between submitted tasks.
pub trait TaskExecutor: Send + Sync + std::fmt::Debug {
    fn submit(&self, task: BoxFuture<'static, ()>);
}

/// Spawns tasks on the current Tokio runtime.
///
/// Falls back to dropping the task with a warning when called outside a runtime.
#[derive(Debug, Default, Clone)]
pub struct TokioExecutor {
    handle: Option<tokio::runtime::Handle>,
}

impl TokioExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self { handle: tokio::runtime::Handle::try_current().ok() }
    }

    #[must_use]
    pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
        Self { handle: Some(handle) }
    }
}

impl TaskExecutor for TokioExecutor {
    fn submit(&self, task: BoxFuture<'static, ()>) {
        let handle = self.handle.clone().or_else(|| tokio::runtime::Handle::try_current().ok());
        match handle {
            Some(handle) => {
                handle.spawn(task);
            }
            None => tracing::warn!("no tokio runtime available, dropping background task"),
        }
    }
}
