//! Fixed-size worker pool for concurrent task execution.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use meridian_common::{MeridianError, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Runs at most `size` tasks at a time.
///
/// Owned by the orchestrator and reused across runs. After
/// [`shutdown`](Self::shutdown) no new work is accepted.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
    closed: AtomicBool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
            closed: AtomicBool::new(false),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Queue `fut`; it starts once a worker is free.
    pub fn spawn<F, T>(&self, fut: F) -> Result<JoinHandle<Result<T>>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(MeridianError::Collaborator(
                "worker pool is shut down".into(),
            ));
        }

        let semaphore = self.semaphore.clone();
        Ok(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| MeridianError::Collaborator("worker pool is shut down".into()))?;
            fut.await
        }))
    }

    /// Stop accepting work and wait for tasks already holding or waiting on
    /// a worker to finish.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(workers = self.size, "Shutting down worker pool");

        // Permits are handed out in FIFO order, so this waits behind every
        // task queued before the pool closed.
        if let Ok(permits) = self.semaphore.acquire_many(self.size as u32).await {
            permits.forget();
        }
        self.semaphore.close();
        debug!("Worker pool drained");
    }
}
