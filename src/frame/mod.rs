pub mod canvas;
pub mod capture;
pub mod diff;
pub mod types;

pub use canvas::{PHONE_HEIGHT, PHONE_WIDTH, ScreenCanvas};
pub use capture::{AdbScreenshots, generate_filename, generate_timestamp, sanitize_label};
pub use diff::{changed_region, frames_differ, images_differ, load_rgb};
pub use types::{FrameError, FramePair, FrameRef, FrameResult, VisualDiff};
