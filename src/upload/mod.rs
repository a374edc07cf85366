//! Snapshot upload boundary.
//!
//! The pipeline only decides *when* to upload and *what* to pass: JPEG bytes plus a
//! destination of the form `{base}/{timestamp}.jpg`. Where the bytes end up is the
//! uploader's business:
//! - `LocalUploader`: a directory on this machine.
//! - `DropboxUploader`: Dropbox content API (feature: upload-dropbox).
//! - `RetryingUploader`: bounded retry around any uploader.
//! - `UploadQueue`: moves uploads off the detection thread.

#[cfg(feature = "upload-dropbox")]
pub mod dropbox;
pub mod local;
pub mod queue;

use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::time::Duration;

use crate::config::{UploadSettings, UploadTarget};
use crate::error::UploadError;

#[cfg(feature = "upload-dropbox")]
pub use dropbox::DropboxUploader;
pub use local::LocalUploader;
pub use queue::{QueueStats, UploadQueue};

pub const JPEG_QUALITY: u8 = 90;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Destination for uploaded snapshots.
pub trait Uploader: Send {
    fn name(&self) -> &'static str;

    /// Persist `image` (JPEG bytes) at `destination`.
    fn upload(&mut self, image: &[u8], destination: &str) -> Result<(), UploadError>;

    /// Outcomes of uploads finished off the caller's thread. `None` for uploaders whose
    /// `Ok` already means stored.
    fn background_stats(&self) -> Option<QueueStats> {
        None
    }

    /// Wait for uploads still in flight.
    fn flush(&mut self) {}
}

impl<U: Uploader + ?Sized> Uploader for Box<U> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn upload(&mut self, image: &[u8], destination: &str) -> Result<(), UploadError> {
        (**self).upload(image, destination)
    }

    fn background_stats(&self) -> Option<QueueStats> {
        (**self).background_stats()
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}

pub fn destination_path(base: &str, timestamp_text: &str) -> String {
    format!("{}/{}.jpg", base.trim_end_matches('/'), timestamp_text)
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, UploadError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| UploadError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Retries retryable failures up to `retries` extra times with linear backoff.
pub struct RetryingUploader<U> {
    inner: U,
    retries: u32,
    backoff: Duration,
}

impl<U: Uploader> RetryingUploader<U> {
    pub fn new(inner: U, retries: u32) -> Self {
        Self::with_backoff(inner, retries, RETRY_BACKOFF)
    }

    pub fn with_backoff(inner: U, retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }
}

impl<U: Uploader> Uploader for RetryingUploader<U> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn upload(&mut self, image: &[u8], destination: &str) -> Result<(), UploadError> {
        let mut attempt = 0;
        loop {
            match self.inner.upload(image, destination) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    log::warn!(
                        "{} upload of {} failed ({}), retry {}/{}",
                        self.inner.name(),
                        destination,
                        e,
                        attempt,
                        self.retries
                    );
                    std::thread::sleep(self.backoff * attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn background_stats(&self) -> Option<QueueStats> {
        self.inner.background_stats()
    }

    fn flush(&mut self) {
        self.inner.flush()
    }
}

/// Build the configured uploader stack, or `None` when uploads are disabled.
pub fn from_settings(settings: &UploadSettings) -> Result<Option<Box<dyn Uploader>>> {
    let base: Box<dyn Uploader> = match &settings.target {
        UploadTarget::Disabled => return Ok(None),
        UploadTarget::Local { base_path } => Box::new(LocalUploader::new(base_path)?),
        #[cfg(feature = "upload-dropbox")]
        UploadTarget::Dropbox(dropbox) => Box::new(DropboxUploader::new(dropbox)),
        #[cfg(not(feature = "upload-dropbox"))]
        UploadTarget::Dropbox(_) => {
            anyhow::bail!("use_dropbox requires the upload-dropbox feature")
        }
    };
    let uploader: Box<dyn Uploader> = if settings.retries > 0 {
        Box::new(RetryingUploader::new(base, settings.retries))
    } else {
        base
    };
    if settings.queue_depth > 0 {
        Ok(Some(Box::new(UploadQueue::spawn(
            uploader,
            settings.queue_depth,
        )?)))
    } else {
        Ok(Some(uploader))
    }
}
