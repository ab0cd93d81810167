//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use photo_matte::{
    error::{CaptureError, Result},
    AssetCreationRequest, AssetStore, AuthorizationStatus, MatteImage,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

/// Asset store that keeps every save request in memory
#[derive(Default)]
pub struct RecordingAssetStore {
    pub saved: Mutex<Vec<AssetCreationRequest>>,
    pub denied: bool,
    pub failing: bool,
}

impl RecordingAssetStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn denied() -> Arc<Self> {
        Arc::new(Self {
            denied: true,
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Self::default()
        })
    }

    pub fn save_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn last_save(&self) -> Option<AssetCreationRequest> {
        self.saved.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AssetStore for RecordingAssetStore {
    async fn authorization_status(&self) -> AuthorizationStatus {
        if self.denied {
            AuthorizationStatus::Denied
        } else {
            AuthorizationStatus::Authorized
        }
    }

    async fn save(&self, request: AssetCreationRequest) -> Result<String> {
        if self.failing {
            return Err(CaptureError::persistence("library write refused"));
        }
        let id = request.request_id.to_string();
        self.saved.lock().unwrap().push(request);
        Ok(id)
    }
}

/// Flat-colored photo
pub fn photo(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Photo encoded as PNG file data
pub fn photo_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let mut bytes = Vec::new();
    photo(width, height, color)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Uniform matte
pub fn matte(width: u32, height: u32, value: u8) -> MatteImage {
    MatteImage::new(GrayImage::from_pixel(width, height, Luma([value])))
}

/// Matte covering the left half of its extent
pub fn left_half_matte(width: u32, height: u32) -> MatteImage {
    MatteImage::new(GrayImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Luma([255])
        } else {
            Luma([0])
        }
    }))
}

/// Decode an encoded composite
pub fn decode(bytes: &[u8]) -> image::RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}
