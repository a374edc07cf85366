//! Motion Sentry
//!
//! Watches a fixed camera, keeps a running-average model of the empty scene and uploads
//! an annotated snapshot when motion has persisted long enough.
//!
//! # Pipeline
//!
//! Each frame passes through, in order:
//!
//! 1. `frame`: resize to the working width, grayscale, Gaussian blur.
//! 2. `detect`: background model update, threshold, dilate, external contours,
//!    bounding boxes above the minimum area.
//! 3. `annotate`: boxes, room status and timestamp drawn on the color frame.
//! 4. `occupancy`: debounce; at most one upload decision per cooldown, and only after
//!    enough consecutive occupied frames.
//! 5. `upload`: JPEG to `{base}/{timestamp}.jpg` on a local directory or Dropbox.
//!
//! # Module Structure
//!
//! - `config`: config file (JSON or TOML) plus environment overrides
//! - `ingest`: frame sources (synthetic, recorded directory, HTTP snapshots)
//! - `pipeline`: per-frame driver and the run loop
//! - `preview`: headless replacement for the live video window

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod occupancy;
pub mod pipeline;
pub mod preview;
pub mod upload;

pub use annotate::Annotator;
pub use config::SentryConfig;
pub use detect::{BackgroundModel, DetectionResult, MotionExtractor, Region, RoomStatus};
pub use error::{PipelineError, UploadError};
pub use frame::{format_timestamp, Frame};
pub use ingest::{open_source, FrameSource};
pub use occupancy::{OccupancySettings, OccupancyStateMachine, UploadDecision};
pub use pipeline::{
    run, FrameOutcome, Pipeline, PipelineSettings, PipelineStats, RunOptions, RunSummary,
    StopReason, UploadOutcome, UploadSink,
};
pub use preview::PreviewWriter;
pub use upload::{destination_path, LocalUploader, Uploader};
