//! Asset I/O operations service
//!
//! File access for the CLI and the tracker's temporary-file cleanup, kept apart from the
//! capture and compositing logic.

use crate::{
    error::{CaptureError, Result},
    types::{ColorProfile, MatteImage},
};
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::{io::Cursor, path::Path};
use tracing::debug;

/// Service for reading capture inputs and removing temporary files
pub struct AssetIOService;

impl AssetIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content-based format detection when the extension is wrong.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use photo_matte::services::AssetIOService;
    ///
    /// let image = AssetIOService::load_image("photo.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(CaptureError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                debug!(
                    path = %path_ref.display(),
                    error = %e,
                    "Extension-based loading failed, attempting content-based detection"
                );
                let data = Self::read_bytes(path_ref)?;
                Ok(image::load_from_memory(&data)?)
            },
        }
    }

    /// Read a file into memory
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        std::fs::read(path_ref).map_err(|e| CaptureError::file_io_error("read file", path_ref, &e))
    }

    /// Decode encoded image bytes together with their embedded ICC profile
    pub fn decode_with_profile(bytes: &[u8]) -> Result<(DynamicImage, Option<ColorProfile>)> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_decoder()?;

        let profile = match decoder.icc_profile() {
            Ok(Some(icc_data)) => Some(ColorProfile::from_icc_data(icc_data)),
            Ok(None) => None,
            Err(e) => {
                debug!("Failed to extract ICC profile: {e}");
                None
            },
        };

        let image = DynamicImage::from_decoder(decoder)?;
        Ok((image, profile))
    }

    /// Load a matte image, reducing it to a single luma channel
    pub fn load_matte<P: AsRef<Path>>(path: P) -> Result<MatteImage> {
        Self::load_image(path).map(|image| MatteImage::from_dynamic(&image))
    }

    /// Write bytes to a file, creating parent directories
    pub fn write_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CaptureError::file_io_error("create output directory", parent, &e))?;
        }
        std::fs::write(path_ref, bytes)
            .map_err(|e| CaptureError::file_io_error("write file", path_ref, &e))
    }

    /// Delete a file if it exists
    ///
    /// Returns whether a file was removed. A missing file is not an error.
    pub async fn remove_if_present<P: AsRef<Path>>(path: P) -> Result<bool> {
        let path_ref = path.as_ref();
        match tokio::fs::remove_file(path_ref).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CaptureError::cleanup(format!(
                "Failed to remove '{}': {}",
                path_ref.display(),
                e
            ))),
        }
    }
}
