//! Headless stand-in for the on-screen feed.
//!
//! With `show_video` the latest annotated frame is rewritten as a JPEG after every
//! processed frame, replaced atomically so a viewer never reads a partial file.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::upload::encode_jpeg;
use crate::upload::local::write_atomic;

pub struct PreviewWriter {
    path: PathBuf,
}

impl PreviewWriter {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating preview directory {}", parent.display()))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, frame: &RgbImage) -> Result<()> {
        let bytes = encode_jpeg(frame)?;
        write_atomic(&self.path, &bytes)
            .with_context(|| format!("writing preview {}", self.path.display()))
    }
}
