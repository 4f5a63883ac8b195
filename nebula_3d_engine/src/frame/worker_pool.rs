/// Worker pool - persistent recording threads fed through a job channel.
///
/// Jobs are boxed closures sent over a `crossbeam-channel`; `spawn` returns a
/// `JobHandle` whose `join` blocks until the job's result is available. A
/// panicking job is caught on the worker, reported through its handle, and the
/// worker keeps serving jobs.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use crossbeam_channel::{Receiver, Sender};
use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the result of a spawned job
pub struct JobHandle<T> {
    receiver: Receiver<std::result::Result<T, String>>,
}

impl<T> JobHandle<T> {
    /// Block until the job finished
    ///
    /// # Errors
    ///
    /// `BackendError` if the job panicked (with the panic message) or the
    /// worker went away before running it.
    pub fn join(self) -> Result<T> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(panic_message)) => Err(Error::BackendError(format!(
                "job panicked: {}", panic_message
            ))),
            Err(_) => Err(Error::BackendError("worker dropped the job".to_string())),
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Fixed set of named worker threads
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `count` workers named `nebula3d-recorder-{i}`
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::InitializationFailed("worker pool needs at least one thread".to_string()));
        }
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(count);

        for index in 0..count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("nebula3d-recorder-{}", index))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                })
                .map_err(|e| {
                    Error::InitializationFailed(format!("failed to spawn worker {}: {}", index, e))
                })?;
            workers.push(handle);
        }

        crate::engine_info!("nebula3d::frame", "Worker pool started with {} threads", count);

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job; any idle worker picks it up
    pub fn spawn<T, F>(&self, job: F) -> Result<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let wrapped: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| panic_message(payload.as_ref()));
            // The handle may have been dropped without joining
            let _ = result_tx.send(result);
        });

        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::BackendError("worker pool is shut down".to_string()))?;
        sender
            .send(wrapped)
            .map_err(|_| Error::BackendError("worker pool channel closed".to_string()))?;

        Ok(JobHandle { receiver: result_rx })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                crate::engine_warn!("nebula3d::frame", "A recorder worker exited by panic");
            }
        }
        crate::engine_info!("nebula3d::frame", "Worker pool stopped");
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
