//! PNG container encoder with color chunk and text metadata
//!
//! Composites are written as RGBA8 PNG. Before the first IDAT chunk the encoder inserts
//! either an iCCP chunk (when the color profile carries ICC bytes) or an sRGB chunk
//! declaring perceptual rendering intent, followed by one tEXt chunk per metadata entry.
//! iCCP and sRGB must not appear together, so exactly one is written.

use crate::{
    error::{CaptureError, Result},
    types::ColorProfile,
};
use flate2::{write::ZlibEncoder, Compression};
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder, RgbaImage};
use std::io::Write;
use tracing::debug;

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// sRGB rendering intent: perceptual
const SRGB_INTENT_PERCEPTUAL: u8 = 0;

/// Chunk-level facts read back from an encoded PNG
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PngMetadata {
    pub has_srgb_chunk: bool,
    pub has_iccp_chunk: bool,
    pub text: Vec<(String, String)>,
}

impl PngMetadata {
    /// Value of the first tEXt entry with the given keyword
    #[must_use]
    pub fn text_value(&self, keyword: &str) -> Option<&str> {
        self.text
            .iter()
            .find(|(key, _)| key == keyword)
            .map(|(_, value)| value.as_str())
    }
}

/// PNG encoder with color profile and metadata embedding
pub struct PngContainerEncoder;

impl PngContainerEncoder {
    /// Encode an RGBA8 image to PNG bytes
    ///
    /// # Errors
    /// - PNG encoding errors from the underlying image library
    /// - Metadata keywords that are empty, longer than 79 bytes, or contain NUL
    pub fn encode(
        image: &RgbaImage,
        profile: &ColorProfile,
        metadata: &[(String, String)],
    ) -> Result<Vec<u8>> {
        let mut png_buffer = Vec::new();
        PngEncoder::new(&mut png_buffer)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| CaptureError::encoding(format!("Failed to create PNG buffer: {e}")))?;

        let mut chunks = Vec::new();
        match &profile.icc_data {
            Some(icc_data) => {
                let name = profile.color_space.to_string();
                chunks.push(Self::create_iccp_chunk(icc_data, &name)?);
            },
            None => chunks.push(Self::create_chunk(b"sRGB", &[SRGB_INTENT_PERCEPTUAL])?),
        }
        for (keyword, value) in metadata {
            chunks.push(Self::create_text_chunk(keyword, value)?);
        }

        Self::insert_before_idat(&png_buffer, &chunks)
    }

    /// Read color chunks and tEXt metadata from PNG bytes
    ///
    /// # Errors
    /// - Invalid PNG signature
    /// - Truncated chunk headers
    pub fn read_metadata(png_data: &[u8]) -> Result<PngMetadata> {
        if png_data.get(0..8) != Some(&PNG_SIGNATURE[..]) {
            return Err(CaptureError::encoding("Invalid PNG signature"));
        }

        let mut metadata = PngMetadata::default();
        let mut pos = 8;
        while pos + 8 <= png_data.len() {
            let (chunk_type, data, next) = Self::chunk_at(png_data, pos)?;
            match chunk_type {
                b"sRGB" => metadata.has_srgb_chunk = true,
                b"iCCP" => metadata.has_iccp_chunk = true,
                b"tEXt" => {
                    if let Some(split) = data.iter().position(|&b| b == 0) {
                        let (keyword, rest) = data.split_at(split);
                        metadata.text.push((
                            String::from_utf8_lossy(keyword).into_owned(),
                            String::from_utf8_lossy(rest.get(1..).unwrap_or_default())
                                .into_owned(),
                        ));
                    }
                },
                b"IEND" => break,
                _ => {},
            }
            pos = next;
        }

        Ok(metadata)
    }

    /// Split out the chunk starting at `pos`: (type, data, offset of next chunk)
    fn chunk_at(png_data: &[u8], pos: usize) -> Result<(&[u8], &[u8], usize)> {
        let length_bytes: [u8; 4] = png_data
            .get(pos..pos + 4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| CaptureError::encoding("Truncated PNG: incomplete chunk length"))?;
        let length = usize::try_from(u32::from_be_bytes(length_bytes))
            .map_err(|_| CaptureError::encoding("PNG chunk length too large for usize"))?;
        let chunk_type = png_data
            .get(pos + 4..pos + 8)
            .ok_or_else(|| CaptureError::encoding("Truncated PNG: incomplete chunk type"))?;
        let data = png_data
            .get(pos + 8..pos + 8 + length)
            .ok_or_else(|| CaptureError::encoding("Truncated PNG: incomplete chunk data"))?;
        Ok((chunk_type, data, pos + 12 + length))
    }

    /// Insert chunks before the first IDAT chunk
    fn insert_before_idat(png_data: &[u8], chunks: &[Vec<u8>]) -> Result<Vec<u8>> {
        if png_data.get(0..8) != Some(&PNG_SIGNATURE[..]) {
            return Err(CaptureError::encoding("Invalid PNG signature"));
        }

        let extra: usize = chunks.iter().map(Vec::len).sum();
        let mut result = Vec::with_capacity(png_data.len() + extra);
        result.extend_from_slice(PNG_SIGNATURE);

        let mut pos = 8;
        let mut inserted = false;
        while pos + 8 <= png_data.len() {
            let (chunk_type, _, next) = Self::chunk_at(png_data, pos)?;

            if chunk_type == b"IDAT" && !inserted {
                for chunk in chunks {
                    result.extend_from_slice(chunk);
                }
                inserted = true;
                debug!(chunks = chunks.len(), "Inserted metadata chunks before IDAT");
            }

            let whole = png_data
                .get(pos..next)
                .ok_or_else(|| CaptureError::encoding("Truncated PNG: incomplete chunk CRC"))?;
            result.extend_from_slice(whole);
            pos = next;

            if chunk_type == b"IEND" {
                break;
            }
        }

        if !inserted {
            return Err(CaptureError::encoding(
                "Could not find IDAT chunk to insert metadata",
            ));
        }

        Ok(result)
    }

    /// Complete chunk: length + type + data + CRC
    fn create_chunk(chunk_type: &[u8; 4], data: &[u8]) -> Result<Vec<u8>> {
        let data_len: u32 = data
            .len()
            .try_into()
            .map_err(|_| CaptureError::encoding("PNG chunk data too large (>4GB)"))?;

        let mut chunk = Vec::with_capacity(data.len() + 12);
        chunk.extend_from_slice(&data_len.to_be_bytes());
        chunk.extend_from_slice(chunk_type);
        chunk.extend_from_slice(data);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(chunk_type);
        hasher.update(data);
        chunk.extend_from_slice(&hasher.finalize().to_be_bytes());

        Ok(chunk)
    }

    /// iCCP: profile name + NUL + compression method + zlib-compressed profile
    fn create_iccp_chunk(icc_data: &[u8], profile_name: &str) -> Result<Vec<u8>> {
        Self::validate_keyword(profile_name)?;

        let mut compressed_data = Vec::new();
        {
            let mut encoder = ZlibEncoder::new(&mut compressed_data, Compression::default());
            encoder.write_all(icc_data).map_err(|e| {
                CaptureError::encoding(format!("Failed to compress ICC data: {e}"))
            })?;
            encoder.finish().map_err(|e| {
                CaptureError::encoding(format!("Failed to finish ICC compression: {e}"))
            })?;
        }

        let mut chunk_data = Vec::with_capacity(profile_name.len() + 2 + compressed_data.len());
        chunk_data.extend_from_slice(profile_name.as_bytes());
        chunk_data.push(0);
        chunk_data.push(0); // zlib
        chunk_data.extend_from_slice(&compressed_data);

        debug!(
            profile = %profile_name,
            original_size = icc_data.len(),
            compressed_size = compressed_data.len(),
            "Created iCCP chunk"
        );

        Self::create_chunk(b"iCCP", &chunk_data)
    }

    /// tEXt: keyword + NUL + text
    fn create_text_chunk(keyword: &str, text: &str) -> Result<Vec<u8>> {
        Self::validate_keyword(keyword)?;
        let mut chunk_data = Vec::with_capacity(keyword.len() + 1 + text.len());
        chunk_data.extend_from_slice(keyword.as_bytes());
        chunk_data.push(0);
        chunk_data.extend_from_slice(text.as_bytes());
        Self::create_chunk(b"tEXt", &chunk_data)
    }

    fn validate_keyword(keyword: &str) -> Result<()> {
        if keyword.is_empty() || keyword.len() > 79 || keyword.contains('\0') {
            return Err(CaptureError::encoding(format!(
                "Invalid PNG keyword '{}' (1-79 bytes, no NUL)",
                keyword
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColorSpace;
    use image::Rgba;

    fn metadata(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_encode_declares_srgb_without_icc() {
        let image = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        let bytes = PngContainerEncoder::encode(
            &image,
            &ColorProfile::srgb(),
            &metadata(&[("Composite", "blended-visualization")]),
        )
        .unwrap();

        let read = PngContainerEncoder::read_metadata(&bytes).unwrap();
        assert!(read.has_srgb_chunk);
        assert!(!read.has_iccp_chunk);
        assert_eq!(read.text_value("Composite"), Some("blended-visualization"));

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_encode_embeds_icc_profile() {
        let image = RgbaImage::new(2, 2);
        let profile = ColorProfile::new(Some(b"Display P3 profile".to_vec()), ColorSpace::DisplayP3);
        let bytes = PngContainerEncoder::encode(&image, &profile, &[]).unwrap();

        let read = PngContainerEncoder::read_metadata(&bytes).unwrap();
        assert!(read.has_iccp_chunk);
        assert!(!read.has_srgb_chunk);
        assert!(read.text.is_empty());
    }

    #[test]
    fn test_rejects_invalid_keyword() {
        let image = RgbaImage::new(1, 1);
        let long = "k".repeat(80);
        let result =
            PngContainerEncoder::encode(&image, &ColorProfile::srgb(), &metadata(&[(&long, "v")]));
        assert!(matches!(result, Err(CaptureError::Encoding(_))));
    }

    #[test]
    fn test_read_metadata_rejects_non_png() {
        assert!(PngContainerEncoder::read_metadata(b"not a png").is_err());
    }
}
