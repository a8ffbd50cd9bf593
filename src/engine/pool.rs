//! Bounded worker pool: tokio tasks gated by a semaphore.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Runs futures on the tokio runtime, at most `size` at a time.
///
/// Cloning is cheap; clones share the same permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(name: &'static str, size: usize) -> Self {
        let size = size.max(1);
        Self {
            name,
            size,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawn `job`; it starts running once a permit is free. Aborting the
    /// handle releases the permit.
    pub fn spawn<F>(&self, job: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let name = self.name;
        tokio::spawn(async move {
            // The semaphore is never closed, so acquisition only fails if that
            // changes; run the job regardless rather than losing it.
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    tracing::warn!(pool = name, error = %e, "Worker pool closed");
                    None
                }
            };
            job.await
        })
    }
}
