//! Bounded worker pool for verifying many domains.
//!
//! Domains go through a task queue of capacity `P` to `P` workers; verdicts
//! come back through a result queue of capacity `P`. The bounded queues are
//! the only backpressure: a full task queue blocks the producer, a full
//! result queue blocks the workers. A completion watcher holds the last
//! result sender and drops it once every worker has exited, which is what
//! ends the consumer's receive loop.

use crate::checker::DomainVerifier;
use crate::types::DomainVerdict;
use futures::future::join_all;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Fixed-size pool of verification workers.
#[derive(Debug, Clone)]
pub struct Pipeline {
    verifier: Arc<DomainVerifier>,
    parallelism: usize,
}

impl Pipeline {
    /// Create a pipeline with `parallelism` workers (at least one).
    pub fn new(verifier: Arc<DomainVerifier>, parallelism: usize) -> Self {
        Self {
            verifier,
            parallelism: parallelism.max(1),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Task queue sized for this pipeline. Drop the sender to signal end of input.
    pub fn task_channel(&self) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(self.parallelism)
    }

    /// Start the workers and the completion watcher on `tasks`.
    ///
    /// The returned receiver yields one verdict per task, in completion
    /// order, and closes after the last worker has exited.
    pub fn spawn(&self, tasks: mpsc::Receiver<String>) -> mpsc::Receiver<DomainVerdict> {
        let (results_tx, results_rx) = mpsc::channel(self.parallelism);
        let tasks = Arc::new(Mutex::new(tasks));

        let workers: Vec<JoinHandle<usize>> = (0..self.parallelism)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&tasks),
                    results_tx.clone(),
                    Arc::clone(&self.verifier),
                ))
            })
            .collect();

        info!("started {} workers", self.parallelism);
        tokio::spawn(watch_workers(workers, results_tx));

        results_rx
    }

    /// Feed `domains` from a background task and start the workers.
    pub fn submit<I>(&self, domains: I) -> mpsc::Receiver<DomainVerdict>
    where
        I: IntoIterator<Item = String> + Send + 'static,
        I::IntoIter: Send,
    {
        let (tasks_tx, tasks_rx) = self.task_channel();

        tokio::spawn(async move {
            for domain in domains {
                if tasks_tx.send(domain).await.is_err() {
                    break;
                }
            }
        });

        self.spawn(tasks_rx)
    }

    /// Verify `domains` and yield verdicts as they complete.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use futures::StreamExt;
    /// use std::sync::Arc;
    /// use tls_reach_lib::{CheckConfig, DomainVerifier, Pipeline};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let verifier = Arc::new(DomainVerifier::from_config(&CheckConfig::default())?);
    /// let pipeline = Pipeline::new(verifier, 10);
    /// let mut verdicts = Box::pin(pipeline.stream(vec!["example.com".to_string()]));
    /// while let Some(verdict) = verdicts.next().await {
    ///     println!("{}", verdict);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn stream<I>(&self, domains: I) -> impl Stream<Item = DomainVerdict> + Send + 'static
    where
        I: IntoIterator<Item = String> + Send + 'static,
        I::IntoIter: Send,
    {
        let results = self.submit(domains);
        stream::unfold(results, |mut results| async move {
            results.recv().await.map(|verdict| (verdict, results))
        })
    }

    /// Verify `domains` and collect every verdict, in completion order.
    pub async fn run(&self, domains: Vec<String>) -> Vec<DomainVerdict> {
        self.stream(domains).collect().await
    }
}

/// One worker: idle on the task queue, verify, hand off, repeat until the
/// queue is closed and drained. Returns how many domains it verified.
async fn worker(
    id: usize,
    tasks: Arc<Mutex<mpsc::Receiver<String>>>,
    results: mpsc::Sender<DomainVerdict>,
    verifier: Arc<DomainVerifier>,
) -> usize {
    let mut handled = 0;

    loop {
        // The lock is released before verifying so other workers can take tasks.
        let next = tasks.lock().await.recv().await;
        let Some(domain) = next else {
            break;
        };

        let verdict = verifier.verify(&domain).await;
        if results.send(verdict).await.is_err() {
            debug!("worker {}: result queue closed, stopping", id);
            break;
        }
        handled += 1;
    }

    debug!("worker {} exited after {} domains", id, handled);
    handled
}

/// Wait for every worker, then close the result queue.
async fn watch_workers(workers: Vec<JoinHandle<usize>>, results: mpsc::Sender<DomainVerdict>) {
    let mut total = 0;
    for (id, joined) in join_all(workers).await.into_iter().enumerate() {
        match joined {
            Ok(handled) => total += handled,
            Err(e) => error!("worker {} terminated abnormally: {}", id, e),
        }
    }

    info!("all workers finished, {} domains verified", total);
    drop(results);
}
