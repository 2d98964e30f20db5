// src/notify/executor.rs
//! Synchronous entry point over the async delivery path.
//!
//! One named worker thread owns a current-thread tokio runtime for the lifetime of the executor.
//! Callers hand it a future and block until the result comes back. This works the same from
//! plain threads and from inside a running tokio runtime, since the future never runs on the
//! caller's scheduler.

use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::runtime::{Builder, Handle, RuntimeFlavor};

use super::{DeliveryReport, DeliveryRequest, Publisher};
use crate::error::PipelineError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct DeliveryExecutor {
    jobs: Mutex<Option<Sender<Job>>>,
    worker: Option<JoinHandle<()>>,
}

impl DeliveryExecutor {
    pub fn new() -> Result<Self, PipelineError> {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = std::thread::Builder::new()
            .name("delivery-executor".into())
            .spawn(move || {
                let rt = match Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!(target: "executor", error = %e, "runtime build failed");
                        return;
                    }
                };
                while let Ok(job) = rx.recv() {
                    // spawned tasks catch their own panics
                    if let Err(e) = rt.block_on(rt.spawn(job)) {
                        tracing::error!(target: "executor", error = %e, "delivery job failed");
                    }
                }
                tracing::debug!(target: "executor", "worker stopped");
            })
            .map_err(|e| PipelineError::Executor(format!("spawn worker: {e}")))?;

        Ok(Self {
            jobs: Mutex::new(Some(tx)),
            worker: Some(worker),
        })
    }

    /// Run `fut` on the worker runtime and block the calling thread until it completes.
    pub fn run<F, T>(&self, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::sync_channel::<T>(1);
        let job: Job = Box::pin(async move {
            let out = fut.await;
            let _ = done_tx.send(out);
        });

        {
            let guard = self
                .jobs
                .lock()
                .map_err(|_| PipelineError::Executor("job queue poisoned".into()))?;
            let tx = guard
                .as_ref()
                .ok_or_else(|| PipelineError::Executor("executor shut down".into()))?;
            tx.send(job)
                .map_err(|_| PipelineError::Executor("worker is gone".into()))?;
        }

        let wait = move || done_rx.recv();
        let received = match Handle::try_current() {
            Ok(h) if h.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(wait)
            }
            _ => wait(),
        };
        received.map_err(|_| PipelineError::Executor("job ended without a result".into()))
    }
}

impl Drop for DeliveryExecutor {
    fn drop(&mut self) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.take();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A publisher callable from synchronous code.
pub struct BlockingPublisher {
    publisher: Arc<Publisher>,
    executor: DeliveryExecutor,
}

impl BlockingPublisher {
    pub fn new(publisher: Arc<Publisher>) -> Result<Self, PipelineError> {
        Ok(Self {
            publisher,
            executor: DeliveryExecutor::new()?,
        })
    }

    pub fn publish_blocking(&self, req: DeliveryRequest) -> Result<DeliveryReport, PipelineError> {
        let publisher = Arc::clone(&self.publisher);
        self.executor
            .run(async move { publisher.publish(&req).await })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_future_from_plain_thread() {
        let ex = DeliveryExecutor::new().unwrap();
        let v = ex.run(async { 40 + 2 }).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn panicking_job_reports_error_and_executor_survives() {
        let ex = DeliveryExecutor::new().unwrap();
        let err = ex.run(async { panic!("boom") }).map(|_: ()| ()).unwrap_err();
        assert_eq!(err.kind(), "executor");
        assert_eq!(ex.run(async { 1 }).unwrap(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn runs_inside_current_thread_runtime() {
        let ex = DeliveryExecutor::new().unwrap();
        let v = ex
            .run(async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                "done"
            })
            .unwrap();
        assert_eq!(v, "done");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_inside_multi_thread_runtime() {
        let ex = DeliveryExecutor::new().unwrap();
        assert_eq!(ex.run(async { 7 }).unwrap(), 7);
    }
}
