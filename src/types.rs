//! Core types shared by the capture tracker and the matte compositor

use crate::error::{CaptureError, Result};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Semantic segmentation classes a capture may enable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationClass {
    Hair,
    Skin,
    Teeth,
    Glasses,
    Sky,
    /// A class reported by the hardware that the compositor does not know how to handle
    Unknown(String),
}

impl SegmentationClass {
    /// Whether the compositor can handle this class
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Stable identifier used in container metadata and file names
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Hair => "hair",
            Self::Skin => "skin",
            Self::Teeth => "teeth",
            Self::Glasses => "glasses",
            Self::Sky => "sky",
            Self::Unknown(name) => name,
        }
    }
}

impl SegmentationClass {
    /// Class for an identifier; unrecognised names become `Unknown`
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "hair" => Self::Hair,
            "skin" => Self::Skin,
            "teeth" => Self::Teeth,
            "glasses" => Self::Glasses,
            "sky" => Self::Sky,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl std::str::FromStr for SegmentationClass {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// Mask category that produced a composite
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatteType {
    /// Portrait-effects (subject separation) matte
    PortraitEffects,
    /// One semantic segmentation class
    Segmentation(SegmentationClass),
}

impl MatteType {
    /// Whether the compositor can handle this matte type
    #[must_use]
    pub fn is_supported(&self) -> bool {
        match self {
            Self::PortraitEffects => true,
            Self::Segmentation(class) => class.is_supported(),
        }
    }

    /// Auxiliary type tag written into container metadata
    #[must_use]
    pub fn auxiliary_tag(&self) -> String {
        match self {
            Self::PortraitEffects => "portrait-effects-matte".to_string(),
            Self::Segmentation(class) => format!("segmentation-matte:{}", class.identifier()),
        }
    }
}

impl std::fmt::Display for MatteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PortraitEffects => write!(f, "portrait"),
            Self::Segmentation(class) => write!(f, "{}", class.identifier()),
        }
    }
}

/// Single-channel matte delivered with a processed photo
#[derive(Debug, Clone)]
pub struct MatteImage {
    /// Per-pixel membership (0 = outside, 255 = fully inside)
    pub pixels: GrayImage,
}

impl MatteImage {
    /// Wrap a grayscale buffer
    #[must_use]
    pub fn new(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    /// Build a matte from raw grayscale bytes
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        GrayImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| {
                CaptureError::missing_pixel_data(format!(
                    "matte buffer does not match {}x{}",
                    width, height
                ))
            })
    }

    /// Convert any decoded image into a matte by taking its luma channel
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::new(image.to_luma8())
    }

    /// Matte dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Get matte coverage statistics
    #[must_use]
    pub fn statistics(&self) -> MatteStatistics {
        let total_pixels = self.pixels.as_raw().len();
        let covered_pixels = self.pixels.as_raw().iter().filter(|&&x| x > 127).count();
        let coverage_ratio = if total_pixels == 0 {
            0.0
        } else {
            covered_pixels as f32 / total_pixels as f32
        };

        MatteStatistics {
            total_pixels,
            covered_pixels,
            coverage_ratio,
        }
    }
}

/// Statistics about a matte
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatteStatistics {
    pub total_pixels: usize,
    pub covered_pixels: usize,
    pub coverage_ratio: f32,
}

/// Which branch of the compositor produced the stored bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeKind {
    /// Matte blended over the primary image against the reference background
    Blended,
    /// The blend produced nothing and the matte itself was encoded as an auxiliary image
    RawMatte,
}

impl CompositeKind {
    /// Value written into container metadata
    #[must_use]
    pub fn metadata_value(self) -> &'static str {
        match self {
            Self::Blended => "blended-visualization",
            Self::RawMatte => "raw-auxiliary-matte",
        }
    }
}

/// Encoded composite produced for one matte
#[derive(Debug, Clone)]
pub struct MatteCompositeResult {
    /// Encoded container bytes
    pub bytes: Vec<u8>,
    /// Mask category that produced the composite
    pub matte_type: MatteType,
    /// Blended visualization or raw matte fallback
    pub kind: CompositeKind,
    /// Pixel extent of the encoded image
    pub dimensions: (u32, u32),
}

impl MatteCompositeResult {
    /// Whether the encoded payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Color space families the crate recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    Srgb,
    DisplayP3,
    AdobeRgb,
    Unknown,
}

impl ColorSpace {
    /// Whether values in this space use the sRGB transfer curve and can be blended as-is
    #[must_use]
    pub fn is_perceptual(self) -> bool {
        matches!(self, Self::Srgb | Self::DisplayP3)
    }
}

impl std::fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Srgb => write!(f, "sRGB"),
            Self::DisplayP3 => write!(f, "Display P3"),
            Self::AdobeRgb => write!(f, "Adobe RGB"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// ICC color profile attached to an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorProfile {
    /// Raw ICC profile bytes, when present
    pub icc_data: Option<Vec<u8>>,
    /// Detected color space
    pub color_space: ColorSpace,
}

impl ColorProfile {
    #[must_use]
    pub fn new(icc_data: Option<Vec<u8>>, color_space: ColorSpace) -> Self {
        Self {
            icc_data,
            color_space,
        }
    }

    /// Declared sRGB profile without embedded ICC bytes
    #[must_use]
    pub fn srgb() -> Self {
        Self::new(None, ColorSpace::Srgb)
    }

    /// Build a profile from ICC bytes, detecting the color space from its description
    #[must_use]
    pub fn from_icc_data(icc_data: Vec<u8>) -> Self {
        let color_space = Self::detect_color_space(&icc_data);
        Self::new(Some(icc_data), color_space)
    }

    fn detect_color_space(icc_data: &[u8]) -> ColorSpace {
        let text = String::from_utf8_lossy(icc_data);
        if text.contains("sRGB") {
            ColorSpace::Srgb
        } else if text.contains("Display P3") || text.contains("P3") {
            ColorSpace::DisplayP3
        } else if text.contains("Adobe RGB") {
            ColorSpace::AdobeRgb
        } else {
            ColorSpace::Unknown
        }
    }

    /// Size of the embedded ICC data in bytes
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.icc_data.as_ref().map_or(0, Vec::len)
    }
}

/// Geolocation tag attached to a capture before persistence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl GeoLocation {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }
}
