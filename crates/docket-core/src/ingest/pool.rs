//! Worker pool for blocking extraction work.

use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::IngestError;

/// A dedicated runtime whose blocking pool is capped at a fixed worker count.
///
/// Blocking extraction runs here so the caller's event loop never blocks on a
/// parse.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, IngestError> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("docket-worker")
            .build()?;

        debug!("Started worker pool with {} blocking threads", workers);
        Ok(Self {
            runtime: Some(runtime),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn handle(&self) -> Result<&Handle, IngestError> {
        self.runtime
            .as_ref()
            .map(Runtime::handle)
            .ok_or_else(|| IngestError::Worker("pool is shut down".to_string()))
    }

    /// Run `f` on a pool thread.
    pub fn spawn<F, T>(&self, f: F) -> Result<JoinHandle<T>, IngestError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        Ok(self.handle()?.spawn_blocking(f))
    }

    /// Run `f` on a pool thread and wait for its result.
    pub async fn run<F, T>(&self, f: F) -> Result<T, IngestError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn(f)?
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))
    }

    /// Block the current (non-async) thread on a future driven by the pool.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, IngestError> {
        Ok(self.handle()?.block_on(future))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping a runtime inside an async context panics; detach instead.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
