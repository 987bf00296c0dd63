//! Background job execution
//!
//! A single worker thread drains a job queue, so backup work runs off the
//! caller's thread and jobs never overlap. Jobs run in submission order. A
//! job that panics fails only its own handle; the worker keeps serving the
//! queue.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::error::{VaultError, VaultResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A queue served by one dedicated thread
pub struct SerialExecutor {
    sender: Option<Sender<Job>>,
    handler: Option<thread::JoinHandle<()>>,
}

/// Pending result of a submitted job
pub struct JobHandle<T> {
    receiver: Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Block until the job finishes
    ///
    /// `WorkerStopped` if the job panicked or never ran.
    pub fn wait(self) -> VaultResult<T> {
        self.receiver.recv().map_err(|_| VaultError::WorkerStopped)
    }

    /// The result if the job has already finished
    pub fn try_wait(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

impl SerialExecutor {
    /// Start the worker thread
    pub fn new(name: &str) -> VaultResult<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let handler = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in receiver.iter() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        warn!("background job panicked");
                    }
                }
                debug!("background worker exiting");
            })
            .map_err(|e| VaultError::Io(format!("Failed to start background worker: {}", e)))?;

        Ok(Self {
            sender: Some(sender),
            handler: Some(handler),
        })
    }

    /// Queue `job`; its return value is delivered through the handle
    pub fn submit<T, F>(&self, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (result_tx, result_rx) = bounded(1);
        let wrapped: Job = Box::new(move || {
            // The caller may have dropped its handle.
            let _ = result_tx.send(job());
        });

        match &self.sender {
            Some(sender) => {
                if sender.send(wrapped).is_err() {
                    warn!("background worker is gone; job dropped");
                }
            }
            None => warn!("executor is shut down; job dropped"),
        }

        JobHandle {
            receiver: result_rx,
        }
    }
}

impl Drop for SerialExecutor {
    /// Finish queued jobs, then join the worker
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handler) = self.handler.take() {
            if handler.join().is_err() {
                warn!("background worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_submit_returns_result() {
        let executor = SerialExecutor::new("test-worker").unwrap();
        let handle = executor.submit(|| 6 * 7);
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn test_jobs_run_in_submission_order() {
        let executor = SerialExecutor::new("test-worker").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let order = order.clone();
                executor.submit(move || {
                    if i % 3 == 0 {
                        thread::sleep(Duration::from_millis(2));
                    }
                    order.lock().unwrap().push(i);
                })
            })
            .collect();
        for handle in handles {
            handle.wait().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_job_reports_worker_stopped() {
        let executor = SerialExecutor::new("test-worker").unwrap();
        let handle = executor.submit(|| -> u32 { panic!("job failed") });
        assert!(matches!(handle.wait(), Err(VaultError::WorkerStopped)));
    }

    #[test]
    fn test_worker_survives_panicking_job() {
        let executor = SerialExecutor::new("test-worker").unwrap();
        let failed = executor.submit(|| -> u32 { panic!("job failed") });
        let next = executor.submit(|| 1u32);

        assert!(failed.wait().is_err());
        assert_eq!(next.wait().unwrap(), 1);
        assert_eq!(executor.submit(|| "still running").wait().unwrap(), "still running");
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(Mutex::new(0));
        {
            let executor = SerialExecutor::new("test-worker").unwrap();
            for _ in 0..5 {
                let counter = counter.clone();
                executor.submit(move || *counter.lock().unwrap() += 1);
            }
        }
        assert_eq!(*counter.lock().unwrap(), 5);
    }
}
