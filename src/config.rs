//! Configuration types for capture tracking and matte compositing

use crate::color::ReferenceColor;
use crate::error::{CaptureError, Result};
use crate::types::{ColorSpace, SegmentationClass};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Container format for encoded composites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG, RGBA8, with color chunk and text metadata
    Png,
    /// Lossless WebP, RGBA8, with ICC chunk when available
    WebP,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl OutputFormat {
    /// File extension (without the dot)
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

/// Encoding of the primary photo delivered by the capture hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoCodec {
    Jpeg,
    Heif,
    Png,
    Tiff,
}

impl Default for PhotoCodec {
    fn default() -> Self {
        Self::Jpeg
    }
}

impl PhotoCodec {
    /// Declared output format identifier handed to the asset store
    #[must_use]
    pub fn format_identifier(self) -> &'static str {
        match self {
            Self::Jpeg => "public.jpeg",
            Self::Heif => "public.heic",
            Self::Png => "public.png",
            Self::Tiff => "public.tiff",
        }
    }

    /// File extension (without the dot)
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Heif => "heic",
            Self::Png => "png",
            Self::Tiff => "tiff",
        }
    }
}

/// How the matte is scaled onto the primary image extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleMode {
    /// Both matte axes use the width ratio; the background uses per-axis ratios
    AsCaptured,
    /// Each matte axis uses its own ratio
    PerAxis,
}

impl Default for ScaleMode {
    fn default() -> Self {
        Self::AsCaptured
    }
}

/// Resampling filter used when scaling mattes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl Default for ResampleFilter {
    fn default() -> Self {
        Self::Triangle
    }
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for the matte compositor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Flat color the matte coverage is blended towards
    pub reference_color: ReferenceColor,

    /// Color space the blend is evaluated in
    pub working_color_space: ColorSpace,

    /// Matte scale-factor derivation
    pub scale_mode: ScaleMode,

    /// Filter used to resample the matte
    pub resample_filter: ResampleFilter,

    /// Container format for composites
    pub output_format: OutputFormat,

    /// Write blend/raw-matte metadata into the container
    pub embed_metadata: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            reference_color: ReferenceColor::white(),
            working_color_space: ColorSpace::Srgb,
            scale_mode: ScaleMode::default(),
            resample_filter: ResampleFilter::default(),
            output_format: OutputFormat::default(),
            embed_metadata: true,
        }
    }
}

impl CompositorConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use photo_matte::{CompositorConfig, ScaleMode};
    ///
    /// let config = CompositorConfig::builder()
    ///     .scale_mode(ScaleMode::PerAxis)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.scale_mode, ScaleMode::PerAxis);
    /// ```
    #[must_use]
    pub fn builder() -> CompositorConfigBuilder {
        CompositorConfigBuilder::default()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Working color space is not a perceptual (sRGB-curve) space
    /// - Reference color is fully transparent
    pub fn validate(&self) -> Result<()> {
        if !self.working_color_space.is_perceptual() {
            return Err(CaptureError::invalid_config(format!(
                "working color space {} is not perceptual; use sRGB or Display P3",
                self.working_color_space
            )));
        }

        if self.reference_color.a == 0 {
            return Err(CaptureError::config_value_error(
                "reference color alpha",
                self.reference_color.a,
                "1-255",
                Some(255),
            ));
        }

        Ok(())
    }
}

/// Builder for `CompositorConfig`
#[derive(Debug, Default)]
pub struct CompositorConfigBuilder {
    config: CompositorConfig,
}

impl CompositorConfigBuilder {
    #[must_use]
    pub fn reference_color(mut self, color: ReferenceColor) -> Self {
        self.config.reference_color = color;
        self
    }

    #[must_use]
    pub fn working_color_space(mut self, color_space: ColorSpace) -> Self {
        self.config.working_color_space = color_space;
        self
    }

    #[must_use]
    pub fn scale_mode(mut self, mode: ScaleMode) -> Self {
        self.config.scale_mode = mode;
        self
    }

    #[must_use]
    pub fn resample_filter(mut self, filter: ResampleFilter) -> Self {
        self.config.resample_filter = filter;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn embed_metadata(mut self, embed: bool) -> Self {
        self.config.embed_metadata = embed;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`CompositorConfig::validate`].
    pub fn build(self) -> Result<CompositorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Requested capture parameters, fixed for the lifetime of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Encoding of the primary photo
    pub photo_codec: PhotoCodec,

    /// Ask the hardware to deliver a portrait-effects matte
    pub portrait_matte_delivery: bool,

    /// Segmentation classes the output reports as enabled
    pub enabled_segmentation_classes: Vec<SegmentationClass>,

    /// Ask for a companion motion clip
    pub live_photo: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            photo_codec: PhotoCodec::default(),
            portrait_matte_delivery: false,
            enabled_segmentation_classes: Vec::new(),
            live_photo: false,
        }
    }
}

/// Where matte composites run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeExecution {
    /// On the task delivering the event
    Inline,
    /// On tokio's blocking pool; every composite is joined before the handler returns
    Blocking,
}

impl Default for CompositeExecution {
    fn default() -> Self {
        Self::Blocking
    }
}

/// Configuration for a capture session tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Processing estimate above which the processing indicator is shown
    pub processing_indicator_threshold_ms: u64,

    /// Where matte composites run
    pub composite_execution: CompositeExecution,

    /// Compositor settings applied to every matte of the request
    pub compositor: CompositorConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            processing_indicator_threshold_ms: 1000,
            composite_execution: CompositeExecution::default(),
            compositor: CompositorConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Processing indicator threshold as a `Duration`
    #[must_use]
    pub fn processing_indicator_threshold(&self) -> Duration {
        Duration::from_millis(self.processing_indicator_threshold_ms)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Zero processing indicator threshold
    /// - Invalid compositor configuration
    pub fn validate(&self) -> Result<()> {
        if self.processing_indicator_threshold_ms == 0 {
            return Err(CaptureError::config_value_error(
                "processing indicator threshold (ms)",
                self.processing_indicator_threshold_ms,
                "> 0",
                Some(1000),
            ));
        }
        self.compositor.validate()
    }
}
