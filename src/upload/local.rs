//! Snapshot storage in a local directory.
//!
//! An existing file is never replaced: a second snapshot for the same destination is
//! stored as `name (1).jpg`, `name (2).jpg`, ..., the same way Dropbox autorenames.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::Uploader;
use crate::error::UploadError;

pub struct LocalUploader {
    root: PathBuf,
}

impl LocalUploader {
    pub fn new(root: &Path) -> Result<Self, UploadError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Uploader for LocalUploader {
    fn name(&self) -> &'static str {
        "local"
    }

    fn upload(&mut self, image: &[u8], destination: &str) -> Result<(), UploadError> {
        let path = Path::new(destination);
        if !path.starts_with(&self.root) {
            return Err(UploadError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "destination {} is outside {}",
                    destination,
                    self.root.display()
                ),
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let target = free_path(path);
        if target != path {
            log::info!("{} exists, storing as {}", destination, target.display());
        }
        write_atomic(&target, image)?;
        Ok(())
    }
}

fn free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut n = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::destination_path;

    #[test]
    fn writes_snapshot_under_root() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path().join("snapshots");
        let mut uploader = LocalUploader::new(&root)?;
        assert!(root.is_dir());

        let dest = destination_path(
            &root.display().to_string(),
            "Monday 19 October 2026 03:04:05PM",
        );
        uploader.upload(b"jpeg bytes", &dest)?;
        assert_eq!(fs::read(&dest)?, b"jpeg bytes");
        assert!(!Path::new(&dest).with_extension("tmp").exists());
        Ok(())
    }

    #[test]
    fn same_second_snapshots_are_both_kept() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut uploader = LocalUploader::new(temp_dir.path())?;
        let dest = destination_path(
            &temp_dir.path().display().to_string(),
            "Monday 19 October 2026 03:04:05PM",
        );
        uploader.upload(b"first", &dest)?;
        uploader.upload(b"second", &dest)?;
        uploader.upload(b"third", &dest)?;

        assert_eq!(fs::read(&dest)?, b"first");
        let renamed = temp_dir
            .path()
            .join("Monday 19 October 2026 03:04:05PM (1).jpg");
        assert_eq!(fs::read(renamed)?, b"second");
        let renamed = temp_dir
            .path()
            .join("Monday 19 October 2026 03:04:05PM (2).jpg");
        assert_eq!(fs::read(renamed)?, b"third");
        Ok(())
    }

    #[test]
    fn rejects_destination_outside_root() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut uploader = LocalUploader::new(&temp_dir.path().join("a"))?;
        let outside = temp_dir.path().join("b").join("x.jpg");
        let err = uploader
            .upload(b"jpeg", &outside.display().to_string())
            .unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
        assert!(!outside.exists());
        Ok(())
    }
}
