use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::DEFAULT_ALPHA;
use crate::frame::DEFAULT_RESIZE_WIDTH;
use crate::occupancy::OccupancySettings;

const DEFAULT_SOURCE: &str = "stub://front_room";
const DEFAULT_RESOLUTION: [u32; 2] = [640, 480];
const DEFAULT_FPS: u32 = 16;
const DEFAULT_WARMUP_SECS: f64 = 2.5;
const DEFAULT_DELTA_THRESH: f64 = 5.0;
const DEFAULT_MIN_AREA: f64 = 5000.0;
const DEFAULT_MIN_UPLOAD_SECS: f64 = 3.0;
const DEFAULT_MIN_MOTION_FRAMES: u32 = 8;
const DEFAULT_PREVIEW_PATH: &str = "preview.jpg";

#[derive(Debug, Deserialize, Default)]
struct SentryConfigFile {
    resolution: Option<[u32; 2]>,
    fps: Option<u32>,
    camera_warmup_time: Option<f64>,
    delta_thresh: Option<f64>,
    min_area: Option<f64>,
    min_upload_seconds: Option<f64>,
    min_motion_frames: Option<u32>,
    show_video: Option<bool>,
    use_dropbox: Option<bool>,
    dropbox_key: Option<String>,
    dropbox_secret: Option<String>,
    dropbox_base_path: Option<String>,
    dropbox_access_token: Option<String>,
    source: Option<String>,
    resize_width: Option<u32>,
    alpha: Option<f32>,
    local_base_path: Option<PathBuf>,
    font_path: Option<PathBuf>,
    preview_path: Option<PathBuf>,
    upload_queue_depth: Option<usize>,
    upload_retries: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub source: SourceSettings,
    pub detection: DetectionSettings,
    pub occupancy: OccupancySettings,
    pub upload: UploadSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// `stub://name`, a local directory of frames, or an `http(s)://` snapshot URL.
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub warmup: Duration,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub resize_width: u32,
    pub alpha: f32,
    /// Delta at or above this value is foreground.
    pub delta_thresh: u8,
    pub min_area: u64,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub target: UploadTarget,
    /// Zero uploads inline on the detection thread.
    pub queue_depth: usize,
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    Disabled,
    Local { base_path: PathBuf },
    Dropbox(DropboxSettings),
}

impl UploadTarget {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, UploadTarget::Disabled)
    }

    /// Base of `{base}/{timestamp}.jpg` destinations.
    pub fn base_path(&self) -> Option<String> {
        match self {
            UploadTarget::Disabled => None,
            UploadTarget::Local { base_path } => Some(base_path.display().to_string()),
            UploadTarget::Dropbox(dropbox) => Some(dropbox.base_path.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropboxSettings {
    pub base_path: String,
    pub access_token: String,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub show_video: bool,
    pub preview_path: PathBuf,
    pub font_path: Option<PathBuf>,
}

impl SentryConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file_cfg = read_config_file(path)?;
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// All defaults, as if loaded from an empty config file.
    pub fn defaults() -> Result<Self> {
        Self::from_file(SentryConfigFile::default())
    }

    fn from_file(file: SentryConfigFile) -> Result<Self> {
        let [width, height] = file.resolution.unwrap_or(DEFAULT_RESOLUTION);
        let source = SourceSettings {
            url: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            width,
            height,
            fps: file.fps.unwrap_or(DEFAULT_FPS),
            warmup: seconds(
                "camera_warmup_time",
                file.camera_warmup_time.unwrap_or(DEFAULT_WARMUP_SECS),
            )?,
        };

        let delta_thresh = file.delta_thresh.unwrap_or(DEFAULT_DELTA_THRESH);
        if !(0.0..=255.0).contains(&delta_thresh) {
            return Err(anyhow!("delta_thresh must be within 0..=255"));
        }
        let min_area = file.min_area.unwrap_or(DEFAULT_MIN_AREA);
        if !min_area.is_finite() || min_area < 0.0 {
            return Err(anyhow!("min_area must be a non-negative number"));
        }
        let detection = DetectionSettings {
            resize_width: file.resize_width.unwrap_or(DEFAULT_RESIZE_WIDTH),
            alpha: file.alpha.unwrap_or(DEFAULT_ALPHA),
            delta_thresh: delta_thresh.ceil() as u8,
            min_area: min_area.ceil() as u64,
        };

        let occupancy = OccupancySettings {
            min_upload_interval: seconds(
                "min_upload_seconds",
                file.min_upload_seconds.unwrap_or(DEFAULT_MIN_UPLOAD_SECS),
            )?,
            min_motion_frames: file.min_motion_frames.unwrap_or(DEFAULT_MIN_MOTION_FRAMES),
        };

        let target = if file.use_dropbox.unwrap_or(false) {
            UploadTarget::Dropbox(DropboxSettings {
                base_path: file.dropbox_base_path.unwrap_or_default(),
                access_token: file.dropbox_access_token.unwrap_or_default(),
                app_key: file.dropbox_key,
                app_secret: file.dropbox_secret,
            })
        } else if let Some(base_path) = file.local_base_path {
            UploadTarget::Local { base_path }
        } else {
            UploadTarget::Disabled
        };
        let upload = UploadSettings {
            target,
            queue_depth: file.upload_queue_depth.unwrap_or(0),
            retries: file.upload_retries.unwrap_or(0),
        };

        let display = DisplaySettings {
            show_video: file.show_video.unwrap_or(false),
            preview_path: file
                .preview_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PREVIEW_PATH)),
            font_path: file.font_path,
        };

        Ok(Self {
            source,
            detection,
            occupancy,
            upload,
            display,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SENTRY_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(token) = std::env::var("SENTRY_DROPBOX_ACCESS_TOKEN") {
            if let UploadTarget::Dropbox(dropbox) = &mut self.upload.target {
                if !token.trim().is_empty() {
                    dropbox.access_token = token.trim().to_string();
                }
            }
        }
        if let Ok(secs) = std::env::var("SENTRY_MIN_UPLOAD_SECONDS") {
            let secs: f64 = secs
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTRY_MIN_UPLOAD_SECONDS must be a number of seconds"))?;
            self.occupancy.min_upload_interval = seconds("SENTRY_MIN_UPLOAD_SECONDS", secs)?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("resolution must be non-zero"));
        }
        if self.source.fps == 0 {
            return Err(anyhow!("fps must be >= 1"));
        }
        if self.detection.resize_width == 0 {
            return Err(anyhow!("resize_width must be >= 1"));
        }
        let alpha = self.detection.alpha;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(anyhow!("alpha must be in (0, 1), got {}", alpha));
        }
        match &mut self.upload.target {
            UploadTarget::Dropbox(dropbox) => {
                if dropbox.base_path.trim().is_empty() {
                    return Err(anyhow!("use_dropbox requires dropbox_base_path"));
                }
                if dropbox.access_token.trim().is_empty() {
                    return Err(anyhow!(
                        "use_dropbox requires dropbox_access_token (authorize app key {} out of band)",
                        dropbox.app_key.as_deref().unwrap_or("<unset>")
                    ));
                }
                dropbox.base_path = dropbox.base_path.trim_end_matches('/').to_string();
            }
            UploadTarget::Local { base_path } => {
                if base_path.as_os_str().is_empty() {
                    return Err(anyhow!("local_base_path must not be empty"));
                }
            }
            UploadTarget::Disabled => {}
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SentryConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow!("{} must be a non-negative number of seconds", key))
}
