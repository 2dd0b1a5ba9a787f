// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Background batch operations over the whole image collection.
//!
//! Jobs are plain functions taking the image list and a [`JobControl`].
//! They hold no reference to the session; the [`BatchWorker`] runs one of
//! them at a time on a dedicated thread and hands the result back through
//! a channel, polled the same way the editor polls its loaders.

pub mod copy;
pub mod housekeeping;
pub mod review;
pub mod sort;
pub mod stats;

use crate::error::{AnnotationError, Result};
use crate::models::project::SortOrder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Cooperative cancellation flag shared with a running job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// How a job ended. Cancellation is a normal ending, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome<T> {
    Completed(T),
    /// Stopped on request; files finished before the stop remain valid.
    Cancelled { processed: usize },
    Failed(String),
}

impl<T> BatchOutcome<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> BatchOutcome<U> {
        match self {
            BatchOutcome::Completed(v) => BatchOutcome::Completed(f(v)),
            BatchOutcome::Cancelled { processed } => BatchOutcome::Cancelled { processed },
            BatchOutcome::Failed(e) => BatchOutcome::Failed(e),
        }
    }

    pub fn completed(self) -> Option<T> {
        match self {
            BatchOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }
}

/// Handed to every job: the cancel flag and the progress channel.
#[derive(Debug, Clone, Default)]
pub struct JobControl {
    cancel: CancelToken,
    progress: Option<Sender<Progress>>,
}

impl JobControl {
    pub fn new(cancel: CancelToken, progress: Option<Sender<Progress>>) -> Self {
        Self { cancel, progress }
    }

    /// Control for running a job inline, without progress reporting.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn report(&self, done: usize, total: usize) {
        if let Some(tx) = &self.progress {
            // the receiver may already be gone if nobody is watching
            let _ = tx.send(Progress { done, total });
        }
    }
}

/// Which housekeeping task produced a report; decides how the image list
/// is updated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HousekeepingKind {
    ImportText,
    Resave,
    MoveEmpty,
    DeleteDerived,
    Transform,
}

/// Result of any job the worker can run.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    SortKeys(SortOrder, sort::SortKeys),
    Stats(stats::StatsReport),
    Review(review::ReviewReport),
    Housekeeping(HousekeepingKind, housekeeping::HousekeepingReport),
}

struct RunningJob {
    name: String,
    cancel: CancelToken,
    progress_rx: Receiver<Progress>,
    result_rx: Receiver<BatchOutcome<JobOutput>>,
    last_progress: Progress,
    handle: Option<JoinHandle<()>>,
}

impl RunningJob {
    fn drain_progress(&mut self) {
        while let Ok(p) = self.progress_rx.try_recv() {
            self.last_progress = p;
        }
    }

    fn finish(mut self, outcome: BatchOutcome<JobOutput>) -> BatchOutcome<JobOutput> {
        self.drain_progress();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("batch job \"{}\" thread panicked", self.name);
            }
        }
        match &outcome {
            BatchOutcome::Completed(_) => log::info!("batch job \"{}\" finished", self.name),
            BatchOutcome::Cancelled { processed } => {
                log::info!("batch job \"{}\" cancelled after {} files", self.name, processed)
            }
            BatchOutcome::Failed(e) => log::error!("batch job \"{}\" failed: {}", self.name, e),
        }
        outcome
    }
}

/// Runs at most one batch job at a time on a background thread.
#[derive(Default)]
pub struct BatchWorker {
    job: Option<RunningJob>,
}

impl BatchWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job.as_ref().map(|j| j.name.as_str())
    }

    /// Start `job`. Refused with `Busy` while another job runs.
    pub fn spawn<F>(&mut self, name: &str, job: F) -> Result<CancelToken>
    where
        F: FnOnce(&JobControl) -> BatchOutcome<JobOutput> + Send + 'static,
    {
        if self.is_busy() {
            return Err(AnnotationError::Busy);
        }

        let cancel = CancelToken::new();
        let (progress_tx, progress_rx) = channel();
        let (result_tx, result_rx) = channel();
        let control = JobControl::new(cancel.clone(), Some(progress_tx));

        log::info!("starting batch job \"{}\"", name);
        let handle = std::thread::spawn(move || {
            let outcome = job(&control);
            let _ = result_tx.send(outcome);
        });

        self.job = Some(RunningJob {
            name: name.to_string(),
            cancel: cancel.clone(),
            progress_rx,
            result_rx,
            last_progress: Progress::default(),
            handle: Some(handle),
        });
        Ok(cancel)
    }

    /// Latest progress reported by the running job.
    pub fn progress(&mut self) -> Option<Progress> {
        let job = self.job.as_mut()?;
        job.drain_progress();
        Some(job.last_progress)
    }

    pub fn cancel(&self) {
        if let Some(job) = &self.job {
            log::info!("cancelling batch job \"{}\"", job.name);
            job.cancel.cancel();
        }
    }

    /// Non-blocking check for a finished job.
    pub fn poll(&mut self) -> Option<BatchOutcome<JobOutput>> {
        let job = self.job.as_mut()?;
        job.drain_progress();
        let outcome = match job.result_rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                BatchOutcome::Failed("batch job ended without a result".to_string())
            }
        };
        self.job.take().map(|job| job.finish(outcome))
    }

    /// Block until the running job ends, calling `on_progress` as updates arrive.
    pub fn wait_with_progress<F>(&mut self, mut on_progress: F) -> Option<BatchOutcome<JobOutput>>
    where
        F: FnMut(Progress),
    {
        loop {
            let job = self.job.as_mut()?;
            let before = job.last_progress;
            job.drain_progress();
            if job.last_progress != before {
                on_progress(job.last_progress);
            }
            let outcome = match job.result_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    BatchOutcome::Failed("batch job ended without a result".to_string())
                }
            };
            return self.job.take().map(|job| job.finish(outcome));
        }
    }

    pub fn wait(&mut self) -> Option<BatchOutcome<JobOutput>> {
        self.wait_with_progress(|_| {})
    }
}

impl Drop for BatchWorker {
    fn drop(&mut self) {
        if self.is_busy() {
            self.cancel();
            let _ = self.wait();
        }
    }
}
