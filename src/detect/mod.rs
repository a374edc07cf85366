mod background;
mod extract;
mod result;

pub use background::{BackgroundModel, DEFAULT_ALPHA};
pub use extract::{MotionExtractor, DEFAULT_DILATE_ITERATIONS};
pub use result::{DetectionResult, Region, RoomStatus};
