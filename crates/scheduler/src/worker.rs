//! Background render worker.
//!
//! A single thread executes submitted jobs in FIFO order and hands results
//! back over a channel. The owner drains completions on its own thread, so
//! all state mutation stays with the owner; the worker only computes.
//! Jobs whose token was cancelled before they started are skipped.

use crate::CancellationToken;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("render worker has shut down")]
    Disconnected,
}

/// What happened to a submitted job.
#[derive(Debug)]
pub enum Completion<J, R> {
    Finished { job: J, result: R },
    /// The job's token was cancelled before or while it ran.
    Cancelled { job: J },
}

struct Envelope<J> {
    job: J,
    token: CancellationToken,
}

pub struct RenderWorker<J, R> {
    jobs: Option<Sender<Envelope<J>>>,
    completions: Receiver<Completion<J, R>>,
    thread: Option<JoinHandle<()>>,
}

impl<J, R> RenderWorker<J, R>
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Spawns the worker thread. `execute` runs once per live job.
    pub fn spawn<F>(name: &str, mut execute: F) -> Result<Self, WorkerError>
    where
        F: FnMut(&J, &CancellationToken) -> R + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<Envelope<J>>();
        let (done_tx, done_rx) = mpsc::channel();

        let thread = thread::Builder::new().name(name.to_owned()).spawn(move || {
            for Envelope { job, token } in job_rx {
                let completion = if token.is_cancelled() {
                    Completion::Cancelled { job }
                } else {
                    let result = execute(&job, &token);
                    if token.is_cancelled() {
                        Completion::Cancelled { job }
                    } else {
                        Completion::Finished { job, result }
                    }
                };

                if done_tx.send(completion).is_err() {
                    break;
                }
            }
        })?;

        Ok(Self { jobs: Some(job_tx), completions: done_rx, thread: Some(thread) })
    }

    pub fn submit(&self, job: J, token: CancellationToken) -> Result<(), WorkerError> {
        let jobs = self.jobs.as_ref().ok_or(WorkerError::Disconnected)?;
        jobs.send(Envelope { job, token }).map_err(|_| WorkerError::Disconnected)
    }

    /// Returns a completion if one is ready, without blocking.
    pub fn try_recv(&self) -> Option<Completion<J, R>> {
        self.completions.try_recv().ok()
    }

    /// Waits up to `timeout` for the next completion.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Completion<J, R>, RecvTimeoutError> {
        self.completions.recv_timeout(timeout)
    }

    /// Stops accepting jobs, lets queued ones drain, and joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }
}

impl<J, R> RenderWorker<J, R> {
    fn stop(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("render worker thread panicked");
            }
        }
    }
}

impl<J, R> Drop for RenderWorker<J, R> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn executes_jobs_in_submission_order() {
        let worker = RenderWorker::spawn("test-worker", |job: &u32, _token| job * 10)
            .expect("worker should spawn");

        for job in 1..=3 {
            worker.submit(job, CancellationToken::new()).expect("submit should succeed");
        }

        let results: Vec<(u32, u32)> = (0..3)
            .map(|_| match worker.recv_timeout(WAIT).expect("completion expected") {
                Completion::Finished { job, result } => (job, result),
                Completion::Cancelled { job } => panic!("job {job} unexpectedly cancelled"),
            })
            .collect();

        assert_eq!(results, vec![(1, 10), (2, 20), (3, 30)]);
        worker.shutdown();
    }

    #[test]
    fn cancelled_jobs_are_skipped() {
        let gate = Arc::new(Barrier::new(2));
        let worker_gate = gate.clone();
        let worker = RenderWorker::spawn("test-worker", move |job: &u32, _token| {
            if *job == 1 {
                worker_gate.wait();
            }
            *job
        })
        .expect("worker should spawn");

        let stale = CancellationToken::new();
        worker.submit(1, CancellationToken::new()).expect("submit");
        worker.submit(2, stale.clone()).expect("submit");
        stale.cancel();
        gate.wait();

        assert!(matches!(
            worker.recv_timeout(WAIT).expect("first completion"),
            Completion::Finished { job: 1, result: 1 }
        ));
        assert!(matches!(
            worker.recv_timeout(WAIT).expect("second completion"),
            Completion::Cancelled { job: 2 }
        ));
    }

    #[test]
    fn try_recv_is_empty_when_idle() {
        let worker: RenderWorker<u32, u32> =
            RenderWorker::spawn("test-worker", |job: &u32, _token| *job).expect("spawn");
        assert!(worker.try_recv().is_none());
    }
}
