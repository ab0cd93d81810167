#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Photo Matte
//!
//! Still-photo capture lifecycle tracking and matte compositing.
//!
//! The crate has two halves that meet in the capture tracker:
//!
//! - **Capture session tracking**: one [`CaptureSessionTracker`] per capture request consumes
//!   the six lifecycle events of a still capture, drives UI hooks, composites every delivered
//!   matte, persists the assets through an [`AssetStore`] and fires its completion exactly once.
//! - **Matte compositing**: [`MatteCompositor`] orients a photo and its matte, scales the matte
//!   onto the photo, blends against a flat reference background in the photo's working color
//!   space and encodes an RGBA8 container. If the blend cannot be produced the raw matte is
//!   emitted instead.
//!
//! ## Quick Start
//!
//! ### Compositing a single matte
//!
//! ```rust,no_run
//! use photo_matte::{
//!     services::AssetIOService, CompositorConfig, MatteCompositor, MatteType, ReferenceColor,
//! };
//!
//! # fn example() -> anyhow::Result<()> {
//! let bytes = AssetIOService::read_bytes("photo.jpg")?;
//! let (photo, profile) = AssetIOService::decode_with_profile(&bytes)?;
//! let matte = AssetIOService::load_matte("portrait-matte.png")?;
//!
//! let config = CompositorConfig::builder()
//!     .reference_color(ReferenceColor::white())
//!     .build()?;
//! let compositor = MatteCompositor::new(config)?;
//! let result = compositor.composite(
//!     &photo,
//!     profile.as_ref(),
//!     &matte,
//!     &MatteType::PortraitEffects,
//!     Some(6),
//! )?;
//! AssetIOService::write_bytes("composite.png", &result.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Tracking a capture
//!
//! ```rust,no_run
//! use photo_matte::{
//!     CaptureEvent, CaptureSessionTracker, CaptureSettings, DirectoryAssetStore,
//!     ResolvedCaptureParams,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(photo: photo_matte::PhotoPayload) -> anyhow::Result<()> {
//! let store = Arc::new(DirectoryAssetStore::new("library"));
//! let mut tracker = CaptureSessionTracker::builder(CaptureSettings::default())
//!     .store(store)
//!     .on_complete(|request| println!("{:?}", request.summary()))
//!     .build()?;
//!
//! let params = ResolvedCaptureParams::new(1);
//! tracker.handle(CaptureEvent::WillBegin(params.clone())).await;
//! tracker.handle(CaptureEvent::WillCapture(params.clone())).await;
//! tracker.handle(CaptureEvent::PhotoProcessed(Ok(photo))).await;
//! tracker.handle(CaptureEvent::CaptureFinished { params, result: Ok(()) }).await;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): `photo-matte` command-line tool and subscriber setup
//! - `webp-support` (default): lossless WebP output
//! - `tracing-json`: JSON log output
//! - `tracing-files`: log file output

pub mod capture;
#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod encoders;
pub mod error;
pub mod policy;
pub mod services;
pub mod tracing_config;
pub mod types;

// Public API exports
pub use capture::{
    persist, AssetCreationRequest, AssetManifest, AssetStore, AuthorizationStatus,
    AuxiliaryResource, CallbackHooks, CaptureCoordinator, CaptureEvent, CaptureHooks,
    CaptureOutcome, CaptureRequest, CaptureSessionTracker, CaptureSessionTrackerBuilder,
    CaptureSummary, CompositeSummary, DirectoryAssetStore, LiveMovieInfo, LoggingCaptureHooks,
    NoOpCaptureHooks, PersistenceOutcome, PhotoPayload, ProcessingTimeRange, RequestId,
    ResolvedCaptureParams, TrackerState,
};
pub use color::ReferenceColor;
pub use compositor::{MatteCompositor, ScaleFactors};
pub use config::{
    CaptureSettings, CompositeExecution, CompositorConfig, OutputFormat, PhotoCodec,
    ResampleFilter, ScaleMode, TrackerConfig,
};
pub use error::{CaptureError, FailureKind, Result};
pub use policy::{ErrorPolicy, PolicyAction, Severity};
pub use services::AssetIOService;
pub use types::{
    ColorProfile, ColorSpace, CompositeKind, GeoLocation, MatteCompositeResult, MatteImage,
    MatteType, SegmentationClass,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, init_library_tracing, TracingConfig, TracingFormat, TracingOutput};
pub use tracing_config::{events, spans};

/// Composite a matte over an encoded photo
///
/// Decodes `photo_bytes` (with its embedded ICC profile, if any) and runs a single
/// [`MatteCompositor::composite`] with `config`.
pub fn composite_from_bytes(
    photo_bytes: &[u8],
    matte: &MatteImage,
    matte_type: &MatteType,
    exif_orientation: Option<u8>,
    config: CompositorConfig,
) -> Result<MatteCompositeResult> {
    let (photo, profile) = AssetIOService::decode_with_profile(photo_bytes)?;
    MatteCompositor::new(config)?.composite(
        &photo,
        profile.as_ref(),
        matte,
        matte_type,
        exif_orientation,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_composite_from_bytes() {
        let photo = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([10, 20, 30])));
        let mut bytes = Vec::new();
        photo
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let matte = MatteImage::new(GrayImage::from_pixel(4, 3, Luma([255])));

        let result = composite_from_bytes(
            &bytes,
            &matte,
            &MatteType::PortraitEffects,
            None,
            CompositorConfig::default(),
        )
        .unwrap();

        assert_eq!(result.kind, CompositeKind::Blended);
        assert_eq!(result.dimensions, (8, 6));
    }
}
