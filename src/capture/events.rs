//! Lifecycle events delivered by the capture hardware driver

use crate::{
    error::Result,
    types::{ColorProfile, MatteImage, SegmentationClass},
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf, time::Duration};

/// Expected processing window reported before capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimeRange {
    pub start: Duration,
    pub duration: Duration,
}

impl ProcessingTimeRange {
    #[must_use]
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    /// Estimated processing deadline (start + duration)
    #[must_use]
    pub fn end(&self) -> Duration {
        self.start.saturating_add(self.duration)
    }
}

/// Capture parameters as resolved by the hardware for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCaptureParams {
    /// Hardware identifier of the capture
    pub unique_id: i64,

    /// Dimensions of the companion motion clip; (0, 0) when none will be produced
    #[serde(default)]
    pub live_photo_movie_dimensions: (u32, u32),

    /// Expected processing window, when the hardware reports one
    #[serde(default)]
    pub photo_processing_time_range: Option<ProcessingTimeRange>,
}

impl ResolvedCaptureParams {
    #[must_use]
    pub fn new(unique_id: i64) -> Self {
        Self {
            unique_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_live_photo_movie_dimensions(mut self, width: u32, height: u32) -> Self {
        self.live_photo_movie_dimensions = (width, height);
        self
    }

    #[must_use]
    pub fn with_processing_time_range(mut self, range: ProcessingTimeRange) -> Self {
        self.photo_processing_time_range = Some(range);
        self
    }

    /// Whether a companion motion clip will be produced
    #[must_use]
    pub fn expects_live_movie(&self) -> bool {
        let (width, height) = self.live_photo_movie_dimensions;
        width > 0 && height > 0
    }
}

/// Processed photo delivered with `photo_processed`
#[derive(Debug, Clone, Default)]
pub struct PhotoPayload {
    /// Encoded primary image
    pub file_data: Option<Vec<u8>>,

    /// Decoded pixel representation; decoded from `file_data` when absent
    pub pixel_image: Option<DynamicImage>,

    /// Color profile of the primary image
    pub color_profile: Option<ColorProfile>,

    /// EXIF orientation tag of the primary image (1-8)
    pub exif_orientation: Option<u8>,

    /// Portrait-effects matte, when the hardware delivered one
    pub portrait_matte: Option<MatteImage>,

    /// Segmentation mattes keyed by class
    pub segmentation_mattes: HashMap<SegmentationClass, MatteImage>,
}

impl PhotoPayload {
    /// Payload with encoded bytes only
    #[must_use]
    pub fn from_file_data(file_data: Vec<u8>) -> Self {
        Self {
            file_data: Some(file_data),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_pixel_image(mut self, image: DynamicImage) -> Self {
        self.pixel_image = Some(image);
        self
    }

    #[must_use]
    pub fn with_color_profile(mut self, profile: ColorProfile) -> Self {
        self.color_profile = Some(profile);
        self
    }

    #[must_use]
    pub fn with_orientation(mut self, exif_tag: u8) -> Self {
        self.exif_orientation = Some(exif_tag);
        self
    }

    #[must_use]
    pub fn with_portrait_matte(mut self, matte: MatteImage) -> Self {
        self.portrait_matte = Some(matte);
        self
    }

    #[must_use]
    pub fn with_segmentation_matte(mut self, class: SegmentationClass, matte: MatteImage) -> Self {
        self.segmentation_mattes.insert(class, matte);
        self
    }

    /// Whether any matte is attached
    #[must_use]
    pub fn has_mattes(&self) -> bool {
        self.portrait_matte.is_some() || !self.segmentation_mattes.is_empty()
    }
}

/// Finished companion motion clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveMovieInfo {
    pub file_location: PathBuf,
    pub duration: Duration,
    pub display_time: Duration,
}

/// One lifecycle notification for a capture request
#[derive(Debug)]
pub enum CaptureEvent {
    WillBegin(ResolvedCaptureParams),
    WillCapture(ResolvedCaptureParams),
    PhotoProcessed(Result<PhotoPayload>),
    LiveMovieEventuallyAt {
        file_location: PathBuf,
        params: ResolvedCaptureParams,
    },
    LiveMovieFinished {
        movie: Result<LiveMovieInfo>,
        params: ResolvedCaptureParams,
    },
    CaptureFinished {
        params: ResolvedCaptureParams,
        result: Result<()>,
    },
}

impl CaptureEvent {
    /// Event name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::WillBegin(_) => "capture_will_begin",
            Self::WillCapture(_) => "will_capture",
            Self::PhotoProcessed(_) => "photo_processed",
            Self::LiveMovieEventuallyAt { .. } => "live_movie_eventually_at",
            Self::LiveMovieFinished { .. } => "live_movie_finished",
            Self::CaptureFinished { .. } => "capture_finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_movie_expectation() {
        assert!(!ResolvedCaptureParams::new(1).expects_live_movie());
        assert!(ResolvedCaptureParams::new(1)
            .with_live_photo_movie_dimensions(1920, 1080)
            .expects_live_movie());
        assert!(!ResolvedCaptureParams::new(1)
            .with_live_photo_movie_dimensions(1920, 0)
            .expects_live_movie());
    }

    #[test]
    fn test_processing_range_end() {
        let range = ProcessingTimeRange::new(Duration::from_millis(300), Duration::from_millis(900));
        assert_eq!(range.end(), Duration::from_millis(1200));
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let params: ResolvedCaptureParams = serde_json::from_str(r#"{"unique_id": 7}"#).unwrap();
        assert_eq!(params.unique_id, 7);
        assert!(!params.expects_live_movie());
        assert!(params.photo_processing_time_range.is_none());
    }
}
