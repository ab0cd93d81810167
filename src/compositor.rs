//! Matte compositor
//!
//! Turns a primary image and a lower-resolution matte into an encoded visualization of the
//! matte's coverage. The pipeline is:
//!
//! 1. Reject unsupported matte categories before any work
//! 2. Resolve the working color space from the configuration and the primary profile
//! 3. Bring primary and matte into the same upright frame from the EXIF orientation tag
//! 4. Derive scale factors and resample the matte and a flat reference background onto
//!    the primary extent
//! 5. Interpolate between primary and background, weighted by the matte
//! 6. Encode as RGBA8 into the configured container
//!
//! If step 4 or 5 cannot produce an image the matte itself is encoded and tagged as a
//! raw auxiliary matte ([`CompositeKind::RawMatte`]).
//!
//! Identical inputs and configuration always yield byte-identical output.

use crate::{
    color::{lerp_pixel, resolve_working_space},
    config::{CompositorConfig, ScaleMode},
    encoders::{self, AUXILIARY_TYPE_KEY, COMPOSITE_KIND_KEY},
    error::{CaptureError, Result},
    policy::{ErrorPolicy, PolicyAction},
    types::{ColorProfile, ColorSpace, CompositeKind, MatteCompositeResult, MatteImage, MatteType},
};
use image::{
    imageops::{self, FilterType},
    metadata::Orientation,
    DynamicImage, GrayImage, Rgba, RgbaImage,
};
use instant::Instant;
use tracing::{debug, instrument, span, Level};

/// Metadata keyword carrying the working color space of a blend
pub const WORKING_SPACE_KEY: &str = "WorkingColorSpace";

/// Scale factors mapping matte and background resolution onto the primary extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub matte_x: f64,
    pub matte_y: f64,
    pub background_x: f64,
    pub background_y: f64,
}

impl ScaleFactors {
    /// Derive factors for a matte of `matte` size composited onto `primary`
    ///
    /// The background is synthesized at the matte's native resolution and always scales
    /// per axis. In [`ScaleMode::AsCaptured`] the matte uses the width ratio on both axes,
    /// so a matte whose aspect ratio differs from the primary does not cover it exactly.
    #[must_use]
    pub fn derive(primary: (u32, u32), matte: (u32, u32), mode: ScaleMode) -> Self {
        let width_ratio = f64::from(primary.0) / f64::from(matte.0);
        let height_ratio = f64::from(primary.1) / f64::from(matte.1);

        let matte_y = match mode {
            ScaleMode::AsCaptured => width_ratio,
            ScaleMode::PerAxis => height_ratio,
        };

        Self {
            matte_x: width_ratio,
            matte_y,
            background_x: width_ratio,
            background_y: height_ratio,
        }
    }

    /// Extent of the matte after scaling
    #[must_use]
    pub fn scaled_matte_extent(&self, matte: (u32, u32)) -> (u32, u32) {
        (scale_dimension(matte.0, self.matte_x), scale_dimension(matte.1, self.matte_y))
    }

    /// Source region of the matte that lands inside `primary` once scaled
    ///
    /// Never empty for a non-empty matte.
    #[must_use]
    pub fn visible_matte_extent(&self, matte: (u32, u32), primary: (u32, u32)) -> (u32, u32) {
        (
            visible_dimension(matte.0, primary.0, self.matte_x),
            visible_dimension(matte.1, primary.1, self.matte_y),
        )
    }

    /// Extent of the background after scaling
    #[must_use]
    pub fn scaled_background_extent(&self, native: (u32, u32)) -> (u32, u32) {
        (
            scale_dimension(native.0, self.background_x),
            scale_dimension(native.1, self.background_y),
        )
    }
}

fn scale_dimension(size: u32, factor: f64) -> u32 {
    if size == 0 {
        return 0;
    }
    let scaled = (f64::from(size) * factor).round();
    if scaled.is_finite() {
        scaled.clamp(1.0, f64::from(u32::MAX)) as u32
    } else {
        1
    }
}

fn visible_dimension(size: u32, primary: u32, factor: f64) -> u32 {
    let covered = (f64::from(primary) / factor).ceil();
    if covered.is_finite() && covered >= 1.0 {
        size.min(covered.min(f64::from(u32::MAX)) as u32)
    } else {
        size.min(1)
    }
}

/// Apply an EXIF orientation tag (1-8) in place
///
/// Returns `false` and leaves the image untouched for tags outside 1-8.
pub fn apply_exif_orientation(image: &mut DynamicImage, exif_tag: u8) -> bool {
    match Orientation::from_exif(exif_tag) {
        Some(orientation) => {
            image.apply_orientation(orientation);
            true
        },
        None => false,
    }
}

/// Compositor for primary image + matte pairs
#[derive(Debug, Clone)]
pub struct MatteCompositor {
    config: CompositorConfig,
}

impl MatteCompositor {
    /// Create a compositor with a validated configuration
    ///
    /// # Errors
    /// - Invalid compositor configuration
    pub fn new(config: CompositorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Composite `matte` over `primary` and encode the result
    ///
    /// `primary_profile` is the color profile embedded in the captured photo, if any.
    /// `exif_orientation` is the raw EXIF orientation value of the primary image.
    ///
    /// # Errors
    /// - `UnsupportedMatte` for matte categories the compositor cannot handle
    /// - `MissingPixelData` when the primary image or matte has no pixels
    /// - `ColorSpace` when the working color space cannot be resolved
    /// - `Encoding` when the container cannot be written
    #[instrument(
        skip(self, primary, primary_profile, matte),
        fields(
            primary = %format!("{}x{}", primary.width(), primary.height()),
            matte = %format!("{}x{}", matte.pixels.width(), matte.pixels.height())
        )
    )]
    pub fn composite(
        &self,
        primary: &DynamicImage,
        primary_profile: Option<&ColorProfile>,
        matte: &MatteImage,
        matte_type: &MatteType,
        exif_orientation: Option<u8>,
    ) -> Result<MatteCompositeResult> {
        if !matte_type.is_supported() {
            return Err(CaptureError::unsupported_matte(format!(
                "no compositor for {:?}",
                matte_type
            )));
        }
        if primary.width() == 0 || primary.height() == 0 {
            return Err(CaptureError::missing_pixel_data("primary image has no pixels"));
        }
        let (matte_width, matte_height) = matte.dimensions();
        if matte_width == 0 || matte_height == 0 {
            return Err(CaptureError::missing_pixel_data("matte has no pixels"));
        }

        let working_space = resolve_working_space(self.config.working_color_space, primary_profile)?;
        let start = Instant::now();

        let (primary, matte_pixels) = {
            let _span = span!(Level::DEBUG, "orientation", tag = ?exif_orientation).entered();
            Self::orient(primary, &matte.pixels, exif_orientation)
        };

        let output_profile = primary_profile.cloned().unwrap_or_else(ColorProfile::srgb);

        let result = match self.blend(&primary, &matte_pixels) {
            Ok(blended) => {
                let metadata = self.metadata(CompositeKind::Blended, matte_type, Some(working_space));
                let bytes = encoders::encode_rgba(
                    &blended,
                    self.config.output_format,
                    &output_profile,
                    &metadata,
                )?;
                MatteCompositeResult {
                    bytes,
                    matte_type: matte_type.clone(),
                    kind: CompositeKind::Blended,
                    dimensions: blended.dimensions(),
                }
            },
            Err(error) => self.fallback(error, &matte_pixels, matte_type, &output_profile)?,
        };

        debug!(
            matte_type = %matte_type,
            kind = ?result.kind,
            bytes = result.bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Matte composite encoded"
        );

        Ok(result)
    }

    fn orient(
        primary: &DynamicImage,
        matte: &GrayImage,
        exif_orientation: Option<u8>,
    ) -> (RgbaImage, GrayImage) {
        let Some(tag) = exif_orientation else {
            return (primary.to_rgba8(), matte.clone());
        };

        let mut primary = primary.clone();
        let mut matte = DynamicImage::ImageLuma8(matte.clone());
        if apply_exif_orientation(&mut primary, tag) {
            apply_exif_orientation(&mut matte, tag);
        } else {
            debug!(tag, "Ignoring unrecognised EXIF orientation");
        }

        (primary.to_rgba8(), matte.into_luma8())
    }

    /// Blend primary towards the reference background by matte weight
    fn blend(&self, primary: &RgbaImage, matte: &GrayImage) -> Result<RgbaImage> {
        let _span = span!(Level::DEBUG, "blend", scale_mode = ?self.config.scale_mode).entered();

        let primary_extent = primary.dimensions();
        let matte_extent = matte.dimensions();
        let factors = ScaleFactors::derive(primary_extent, matte_extent, self.config.scale_mode);
        let filter: FilterType = self.config.resample_filter.into();

        // Only the rows and columns that land inside the primary are resampled
        let (visible_width, visible_height) = factors.visible_matte_extent(matte_extent, primary_extent);
        let (scaled_width, scaled_height) = factors.scaled_matte_extent((visible_width, visible_height));
        let (scaled_width, scaled_height) =
            (scaled_width.min(primary_extent.0), scaled_height.min(primary_extent.1));
        if scaled_width == 0 || scaled_height == 0 {
            return Err(CaptureError::blend_failed(format!(
                "matte {}x{} scales to an empty {}x{} image",
                matte_extent.0, matte_extent.1, scaled_width, scaled_height
            )));
        }
        let visible = imageops::crop_imm(matte, 0, 0, visible_width, visible_height).to_image();
        let scaled_matte = imageops::resize(&visible, scaled_width, scaled_height, filter);

        let native_background =
            RgbaImage::from_pixel(matte_extent.0, matte_extent.1, Rgba(self.config.reference_color.to_rgba()));
        let (background_width, background_height) = factors.scaled_background_extent(matte_extent);
        if (background_width, background_height) != primary_extent {
            return Err(CaptureError::blend_failed(format!(
                "reference background scaled to {}x{}, expected {}x{}",
                background_width, background_height, primary_extent.0, primary_extent.1
            )));
        }
        let background = imageops::resize(&native_background, background_width, background_height, filter);

        debug!(
            matte_x = factors.matte_x,
            matte_y = factors.matte_y,
            scaled_matte = %format!("{}x{}", scaled_width, scaled_height),
            "Resampled matte and reference background"
        );

        let mut output = RgbaImage::new(primary_extent.0, primary_extent.1);
        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let weight = if x < scaled_width && y < scaled_height {
                scaled_matte.get_pixel(x, y)[0]
            } else {
                0
            };
            *pixel = Rgba(lerp_pixel(primary.get_pixel(x, y).0, background.get_pixel(x, y).0, weight));
        }

        Ok(output)
    }

    /// Encode the raw matte when the policy degrades a blend failure, otherwise propagate
    fn fallback(
        &self,
        error: CaptureError,
        matte: &GrayImage,
        matte_type: &MatteType,
        profile: &ColorProfile,
    ) -> Result<MatteCompositeResult> {
        if ErrorPolicy::apply(&error, "compositing") != PolicyAction::Degrade {
            return Err(error);
        }
        self.encode_raw_matte(matte, matte_type, profile)
    }

    fn encode_raw_matte(
        &self,
        matte: &GrayImage,
        matte_type: &MatteType,
        profile: &ColorProfile,
    ) -> Result<MatteCompositeResult> {
        let rgba = DynamicImage::ImageLuma8(matte.clone()).to_rgba8();
        let metadata = self.metadata(CompositeKind::RawMatte, matte_type, None);
        let bytes = encoders::encode_rgba(&rgba, self.config.output_format, profile, &metadata)?;

        debug!(matte_type = %matte_type, "Stored raw matte in place of blended composite");

        Ok(MatteCompositeResult {
            bytes,
            matte_type: matte_type.clone(),
            kind: CompositeKind::RawMatte,
            dimensions: rgba.dimensions(),
        })
    }

    fn metadata(
        &self,
        kind: CompositeKind,
        matte_type: &MatteType,
        working_space: Option<ColorSpace>,
    ) -> Vec<(String, String)> {
        if !self.config.embed_metadata {
            return Vec::new();
        }
        let mut metadata = vec![
            (COMPOSITE_KIND_KEY.to_string(), kind.metadata_value().to_string()),
            (AUXILIARY_TYPE_KEY.to_string(), matte_type.auxiliary_tag()),
        ];
        if let Some(space) = working_space {
            metadata.push((WORKING_SPACE_KEY.to_string(), space.to_string()));
        }
        metadata
    }
}
