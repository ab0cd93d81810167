//! Container encoders for matte composites
//!
//! Every composite is written as 8-bit RGBA with an explicit color declaration. PNG is
//! the default container; lossless WebP is available behind the `webp-support` feature.

pub mod png_encoder;

pub use png_encoder::{PngContainerEncoder, PngMetadata};

use crate::{config::OutputFormat, error::Result, types::ColorProfile};
use image::RgbaImage;
use tracing::debug;

/// Metadata keyword carrying the composite kind
pub const COMPOSITE_KIND_KEY: &str = "MatteComposite";

/// Metadata keyword carrying the auxiliary matte type tag
pub const AUXILIARY_TYPE_KEY: &str = "AuxiliaryType";

/// Encode an RGBA8 image into the configured container
///
/// `metadata` entries become tEXt chunks in PNG output. WebP output carries only the
/// ICC profile.
pub fn encode_rgba(
    image: &RgbaImage,
    format: OutputFormat,
    profile: &ColorProfile,
    metadata: &[(String, String)],
) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Png => PngContainerEncoder::encode(image, profile, metadata),
        OutputFormat::WebP => encode_webp(image, profile, metadata),
    }
}

/// Read the text metadata written into an encoded PNG composite
pub fn read_text_metadata(bytes: &[u8]) -> Result<Vec<(String, String)>> {
    Ok(PngContainerEncoder::read_metadata(bytes)?.text)
}

#[cfg(feature = "webp-support")]
fn encode_webp(
    image: &RgbaImage,
    profile: &ColorProfile,
    metadata: &[(String, String)],
) -> Result<Vec<u8>> {
    use image::{codecs::webp::WebPEncoder, ExtendedColorType, ImageEncoder};
    use tracing::warn;

    let mut buffer = Vec::new();
    let mut encoder = WebPEncoder::new_lossless(&mut buffer);

    if let Some(icc_data) = &profile.icc_data {
        if let Err(e) = encoder.set_icc_profile(icc_data.clone()) {
            warn!("Failed to embed ICC profile in WebP: {e}");
        } else {
            debug!(bytes = icc_data.len(), "Embedded ICC profile in lossless WebP");
        }
    }
    if !metadata.is_empty() {
        debug!(entries = metadata.len(), "WebP output does not carry text metadata");
    }

    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;

    Ok(buffer)
}

#[cfg(not(feature = "webp-support"))]
fn encode_webp(
    image: &RgbaImage,
    profile: &ColorProfile,
    metadata: &[(String, String)],
) -> Result<Vec<u8>> {
    debug!("WebP support disabled - falling back to PNG container");
    PngContainerEncoder::encode(image, profile, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_dispatch_keeps_metadata() {
        let image = RgbaImage::new(3, 3);
        let metadata = vec![(COMPOSITE_KIND_KEY.to_string(), "raw-auxiliary-matte".to_string())];
        let bytes = encode_rgba(&image, OutputFormat::Png, &ColorProfile::srgb(), &metadata).unwrap();
        assert_eq!(read_text_metadata(&bytes).unwrap(), metadata);
    }

    #[cfg(feature = "webp-support")]
    #[test]
    fn test_webp_output_decodes() {
        let image = RgbaImage::from_pixel(5, 2, image::Rgba([1, 2, 3, 255]));
        let bytes = encode_rgba(&image, OutputFormat::WebP, &ColorProfile::srgb(), &[]).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 2));
    }
}
