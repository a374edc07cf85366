//! Background upload worker.
//!
//! A bounded channel feeds one worker thread. When the worker falls behind, new snapshots
//! are rejected with `UploadError::QueueFull` instead of blocking frame processing.
//! The worker publishes stored/failed counts as it goes; `background_stats` reads them.
//! Dropping the queue closes the channel, lets the worker drain what is already queued,
//! and joins it.

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::Uploader;
use crate::error::UploadError;

struct UploadJob {
    image: Vec<u8>,
    destination: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub uploaded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct QueueCounters {
    uploaded: AtomicU64,
    failed: AtomicU64,
}

impl QueueCounters {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            uploaded: self.uploaded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

pub struct UploadQueue {
    name: &'static str,
    tx: Option<SyncSender<UploadJob>>,
    worker: Option<JoinHandle<()>>,
    counters: Arc<QueueCounters>,
}

impl UploadQueue {
    pub fn spawn<U: Uploader + 'static>(inner: U, depth: usize) -> Result<Self> {
        let name = inner.name();
        let (tx, rx) = mpsc::sync_channel(depth.max(1));
        let counters = Arc::new(QueueCounters::default());
        let worker_counters = Arc::clone(&counters);
        let worker = thread::Builder::new()
            .name("upload-worker".to_string())
            .spawn(move || worker_loop(inner, rx, &worker_counters))?;
        Ok(Self {
            name,
            tx: Some(tx),
            worker: Some(worker),
            counters,
        })
    }

    /// Drain pending uploads and stop the worker.
    pub fn shutdown(mut self) -> QueueStats {
        self.finish();
        self.counters.snapshot()
    }

    fn finish(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("upload worker panicked");
            }
        }
    }
}

impl Drop for UploadQueue {
    fn drop(&mut self) {
        self.finish();
    }
}

impl Uploader for UploadQueue {
    fn name(&self) -> &'static str {
        self.name
    }

    /// Hands the snapshot to the worker. `Ok` means queued, not stored.
    fn upload(&mut self, image: &[u8], destination: &str) -> Result<(), UploadError> {
        let tx = self.tx.as_ref().ok_or(UploadError::WorkerStopped)?;
        let job = UploadJob {
            image: image.to_vec(),
            destination: destination.to_string(),
        };
        tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => UploadError::QueueFull,
            TrySendError::Disconnected(_) => UploadError::WorkerStopped,
        })
    }

    fn background_stats(&self) -> Option<QueueStats> {
        Some(self.counters.snapshot())
    }

    /// Drains and stops the worker; later uploads fail with `WorkerStopped`.
    fn flush(&mut self) {
        self.finish();
    }
}

fn worker_loop<U: Uploader>(mut inner: U, rx: Receiver<UploadJob>, counters: &QueueCounters) {
    for job in rx {
        match inner.upload(&job.image, &job.destination) {
            Ok(()) => {
                counters.uploaded.fetch_add(1, Ordering::SeqCst);
                log::info!("[UPLOAD] {} stored via {}", job.destination, inner.name());
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                log::warn!("{} upload of {} failed: {}", inner.name(), job.destination, e);
            }
        }
    }
}
