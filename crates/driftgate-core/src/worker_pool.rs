use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::error::GatewayError;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub buffer_size: usize,
    /// When true, a full queue rejects immediately with `QueueFull`. When
    /// false, the caller blocks until space frees up or the deadline fires
    /// (spec §4.3).
    pub drop_excess_requests: bool,
}

/// A unit of work submitted to a provider's worker pool: the job closure
/// produces `T` (a complete response or an error) and is run on a worker
/// task, not the submitting task.
pub struct WorkItem<T> {
    pub job: Box<dyn FnOnce() -> futures_util::future::BoxFuture<'static, T> + Send>,
    pub reply: oneshot::Sender<T>,
}

/// Per-provider bounded queue drained by a fixed set of worker tasks.
pub struct WorkerPool<T: Send + 'static> {
    sender: mpsc::Sender<WorkItem<T>>,
    drop_excess_requests: bool,
    _workers: Vec<tokio::task::JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<WorkItem<T>>(config.buffer_size.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut workers = Vec::with_capacity(config.concurrency);
        for _ in 0..config.concurrency.max(1) {
            let rx = rx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match item {
                        Some(WorkItem { job, reply }) => {
                            let result = job().await;
                            let _ = reply.send(result);
                        }
                        None => break,
                    }
                }
            }));
        }

        Self {
            sender: tx,
            drop_excess_requests: config.drop_excess_requests,
            _workers: workers,
        }
    }

    /// Submit a job and await its result, honoring `deadline` for both the
    /// enqueue wait (non-drop mode) and the execution wait.
    pub async fn submit<F, Fut>(
        &self,
        deadline: Option<Duration>,
        job: F,
    ) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let item = WorkItem {
            job: Box::new(move || Box::pin(job())),
            reply: reply_tx,
        };

        if self.drop_excess_requests {
            self.sender
                .try_send(item)
                .map_err(|_| GatewayError::QueueFull)?;
        } else {
            match deadline {
                Some(d) => timeout(d, self.sender.send(item))
                    .await
                    .map_err(|_| GatewayError::Timeout)?
                    .map_err(|_| GatewayError::Internal("worker pool closed".into()))?,
                None => self
                    .sender
                    .send(item)
                    .await
                    .map_err(|_| GatewayError::Internal("worker pool closed".into()))?,
            }
        }

        match deadline {
            Some(d) => timeout(d, reply_rx)
                .await
                .map_err(|_| GatewayError::Timeout)?
                .map_err(|_| GatewayError::Internal("worker dropped reply".into())),
            None => reply_rx
                .await
                .map_err(|_| GatewayError::Internal("worker dropped reply".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn submits_and_returns_result() {
        let pool: WorkerPool<i32> = WorkerPool::new(WorkerPoolConfig {
            concurrency: 2,
            buffer_size: 4,
            drop_excess_requests: false,
        });
        let result = pool.submit(None, || async { 42 }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn drop_excess_rejects_when_queue_and_workers_are_saturated() {
        let pool: WorkerPool<i32> = WorkerPool::new(WorkerPoolConfig {
            concurrency: 1,
            buffer_size: 1,
            drop_excess_requests: true,
        });
        let gate = Arc::new(tokio::sync::Notify::new());
        let gate_clone = gate.clone();
        // Occupy the single worker indefinitely until we release the gate.
        let _occupant = tokio::spawn({
            let pool_sender = pool.sender.clone();
            async move {
                let (reply_tx, _reply_rx) = oneshot::channel();
                let _ = pool_sender
                    .send(WorkItem {
                        job: Box::new(move || {
                            Box::pin(async move {
                                gate_clone.notified().await;
                                0
                            })
                        }),
                        reply: reply_tx,
                    })
                    .await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Fill the one-slot buffer.
        let filler = pool.submit(None, || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            1
        });
        let filler_task = tokio::spawn(filler);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let rejected = pool.submit(None, || async { 2 }).await;
        assert!(matches!(rejected, Err(GatewayError::QueueFull)));

        gate.notify_one();
        filler_task.abort();
    }

    #[tokio::test]
    async fn non_drop_mode_times_out_on_deadline() {
        let pool: WorkerPool<i32> = WorkerPool::new(WorkerPoolConfig {
            concurrency: 1,
            buffer_size: 1,
            drop_excess_requests: false,
        });
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let result = pool
            .submit(Some(Duration::from_millis(5)), move || async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                counter_clone.fetch_add(1, Ordering::SeqCst);
                0
            })
            .await;
        assert!(matches!(result, Err(GatewayError::Timeout)));
    }
}
