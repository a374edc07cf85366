//! IP camera snapshot source.
//!
//! Polls an `http(s)://` endpoint that answers with a single JPEG per request, paced to
//! the configured fps. Fetch and decode failures surface as `PipelineError::Source`;
//! there is no reconnect loop, the daemon stops and the supervisor restarts it.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;
use url::Url;

use super::{fit_to, FrameSource, Pacer, SourceStats};
use crate::error::PipelineError;
use crate::frame::Frame;

const MAX_JPEG_BYTES: u64 = 5 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpSnapshotSource {
    url: Url,
    agent: ureq::Agent,
    pacer: Pacer,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl HttpSnapshotSource {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).context("parse snapshot url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported snapshot scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(Self {
            url,
            agent,
            pacer: Pacer::new(1),
            width: 0,
            height: 0,
            frame_count: 0,
        })
    }

    fn fetch_jpeg(&self) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .agent
            .get(self.url.as_str())
            .call()
            .map_err(|e| PipelineError::source(format!("fetch snapshot from {}: {}", self.url, e)))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_JPEG_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| PipelineError::source(format!("read snapshot: {}", e)))?;
        if bytes.is_empty() {
            return Err(PipelineError::source("empty snapshot"));
        }
        Ok(bytes)
    }
}

impl FrameSource for HttpSnapshotSource {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    fn configure(&mut self, width: u32, height: u32, fps: u32) -> Result<(), PipelineError> {
        if width == 0 || height == 0 || fps == 0 {
            return Err(PipelineError::source("resolution and fps must be non-zero"));
        }
        self.width = width;
        self.height = height;
        self.pacer = Pacer::new(fps);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, PipelineError> {
        self.pacer.wait();
        let bytes = self.fetch_jpeg()?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| PipelineError::source(format!("decode snapshot: {}", e)))?
            .into_rgb8();
        self.frame_count += 1;
        let image = if self.width > 0 && self.height > 0 {
            fit_to(image, self.width, self.height)
        } else {
            image
        };
        Ok(Frame::captured_now(image))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        assert!(HttpSnapshotSource::new("udp://10.0.0.2:5000").is_err());
        assert!(HttpSnapshotSource::new("not a url").is_err());
        assert!(HttpSnapshotSource::new("http://10.0.0.2/snapshot.jpg").is_ok());
    }

    #[test]
    fn unreachable_camera_is_a_source_error() {
        let mut source = HttpSnapshotSource::new("http://127.0.0.1:9/snapshot.jpg").unwrap();
        source.configure(64, 48, 10).unwrap();
        assert!(matches!(source.next_frame(), Err(PipelineError::Source(_))));
    }
}
