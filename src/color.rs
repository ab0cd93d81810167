//! Reference colors, working color space resolution and blending math

use crate::error::{CaptureError, Result};
use crate::types::{ColorProfile, ColorSpace};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Flat color of the synthetic reference background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ReferenceColor {
    /// Opaque color from RGB components
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    #[must_use]
    pub fn with_alpha(mut self, a: u8) -> Self {
        self.a = a;
        self
    }

    /// RGBA components in channel order
    #[must_use]
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse `#RRGGBB`, `#RRGGBBAA` or `#RGB` (the `#` is optional)
    ///
    /// # Examples
    /// ```rust
    /// use photo_matte::color::ReferenceColor;
    ///
    /// let red = ReferenceColor::parse_hex("#f00").unwrap();
    /// assert_eq!(red, ReferenceColor::new(255, 0, 0));
    /// ```
    pub fn parse_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CaptureError::invalid_config(format!(
                "Invalid hex color '{}'",
                hex
            )));
        }

        let component = |range: std::ops::Range<usize>, name: &str| -> Result<u8> {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| {
                    CaptureError::invalid_config(format!("Invalid {} component in hex color", name))
                })
        };

        match hex.len() {
            6 => Ok(Self::new(
                component(0..2, "red")?,
                component(2..4, "green")?,
                component(4..6, "blue")?,
            )),
            8 => Ok(Self::new(
                component(0..2, "red")?,
                component(2..4, "green")?,
                component(4..6, "blue")?,
            )
            .with_alpha(component(6..8, "alpha")?)),
            3 => Ok(Self::new(
                component(0..1, "red")? * 17,
                component(1..2, "green")? * 17,
                component(2..3, "blue")? * 17,
            )),
            _ => Err(CaptureError::invalid_config(
                "Color must be in #RRGGBB, #RRGGBBAA or #RGB format",
            )),
        }
    }

    /// Hex representation, `#RRGGBB` for opaque colors and `#RRGGBBAA` otherwise
    #[must_use]
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl std::str::FromStr for ReferenceColor {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_hex(s)
    }
}

/// Resolve the color space a blend runs in
///
/// The configured working space must use the sRGB transfer curve. When the primary
/// image carries a profile, that profile must be perceptual too, since pixel values are
/// blended without conversion.
///
/// # Errors
/// - Working space is not perceptual
/// - Primary image profile is non-perceptual or unrecognised
pub fn resolve_working_space(
    working: ColorSpace,
    primary_profile: Option<&ColorProfile>,
) -> Result<ColorSpace> {
    if !working.is_perceptual() {
        return Err(CaptureError::color_space(format!(
            "working color space {} is unavailable for blending",
            working
        )));
    }

    if let Some(profile) = primary_profile {
        if !profile.color_space.is_perceptual() {
            return Err(CaptureError::color_space(format!(
                "primary image profile {} ({} bytes) cannot be blended in {}",
                profile.color_space,
                profile.data_size(),
                working
            )));
        }
        if profile.color_space != working {
            debug!(
                primary = %profile.color_space,
                working = %working,
                "Blending primary values as working-space values"
            );
        }
    }

    Ok(working)
}

/// Linear interpolation of two sRGB-encoded channel values
///
/// `weight` 0 keeps `from`, 255 yields `to`.
#[must_use]
pub fn lerp_channel(from: u8, to: u8, weight: u8) -> u8 {
    let t = f32::from(weight) / 255.0;
    let a = f32::from(from) / 255.0;
    let b = f32::from(to) / 255.0;
    let mixed = a + (b - a) * t;
    (mixed.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Per-pixel RGBA interpolation
#[must_use]
pub fn lerp_pixel(from: [u8; 4], to: [u8; 4], weight: u8) -> [u8; 4] {
    [
        lerp_channel(from[0], to[0], weight),
        lerp_channel(from[1], to[1], weight),
        lerp_channel(from[2], to[2], weight),
        lerp_channel(from[3], to[3], weight),
    ]
}
