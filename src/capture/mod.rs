//! Periodic page capture.
//!
//! A [`CaptureSource`] turns an off-screen page into a bitmap on demand, and
//! the [`SnapshotCapturer`] drives it on a fixed interval while mounted. The
//! page itself is opened on mount and keeps running until unmount.
//! Successful captures become [`Snapshot`]s which are handed to a
//! [`crate::bridge::TextureBridge`] and published into a
//! [`crate::bridge::SurfaceTextureSlot`].

use std::time::Duration;

use image::RgbaImage;

pub mod browser;
pub mod capturer;
pub mod source;

pub use capturer::{CaptureCounts, CaptureHandle, CaptureSettings, CaptureStats, OverlapPolicy, SnapshotCapturer};
pub use browser::{ChromiumLauncher, LivePage, PageLauncher};
pub use source::{CaptureSource, FixturePageSource, HeadlessBrowserSource, fit_to_viewport};

/// Errors of a single capture cycle. None of them stop the interval.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("the page has not been loaded yet")]
    NotLoaded,
    #[error("browser failed: {0}")]
    Browser(String),
    #[error("capture i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("captured bitmap could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
    #[error("capture did not finish within {0:?}")]
    TimedOut(Duration),
}

/// The logical page size and address a source renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height,
        }
    }
}

/// One captured frame of the page. `cycle` counts capture attempts from 1.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub cycle: u64,
    pub image: RgbaImage,
}
