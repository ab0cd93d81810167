use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use photo_matte::{
    AssetStore, CaptureEvent, CaptureSessionTracker, CaptureSettings, CompositeExecution,
    CompositorConfig, DirectoryAssetStore, MatteCompositor, MatteImage, MatteType, PhotoPayload,
    ResolvedCaptureParams, ScaleMode, SegmentationClass, TrackerConfig,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn gradient_photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn radial_matte(width: u32, height: u32) -> MatteImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    MatteImage::new(GrayImage::from_fn(width, height, |x, y| {
        let distance = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
        Luma([(255.0 - distance.min(255.0)) as u8])
    }))
}

fn benchmark_composite(c: &mut Criterion) {
    let primary = gradient_photo(1024, 768);
    let matte = radial_matte(256, 192);

    let mut group = c.benchmark_group("composite");
    group.sample_size(20);

    for (name, scale_mode) in [("as_captured", ScaleMode::AsCaptured), ("per_axis", ScaleMode::PerAxis)] {
        let compositor = MatteCompositor::new(
            CompositorConfig::builder().scale_mode(scale_mode).build().unwrap(),
        )
        .unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                compositor
                    .composite(
                        black_box(&primary),
                        None,
                        black_box(&matte),
                        &MatteType::PortraitEffects,
                        Some(6),
                    )
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_photo_processed(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let root = tempfile::TempDir::new().unwrap();
    let store: Arc<dyn AssetStore> = Arc::new(DirectoryAssetStore::new(root.path()));
    let primary = gradient_photo(1024, 768);
    let classes = vec![
        SegmentationClass::Hair,
        SegmentationClass::Skin,
        SegmentationClass::Teeth,
        SegmentationClass::Sky,
    ];

    let mut group = c.benchmark_group("photo_processed");
    group.sample_size(10);

    for (name, execution) in [("inline", CompositeExecution::Inline), ("blocking", CompositeExecution::Blocking)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let settings = CaptureSettings {
                    enabled_segmentation_classes: classes.clone(),
                    ..CaptureSettings::default()
                };
                let config = TrackerConfig {
                    composite_execution: execution,
                    ..TrackerConfig::default()
                };
                let mut tracker = CaptureSessionTracker::builder(settings)
                    .config(config)
                    .store(Arc::clone(&store))
                    .build()
                    .unwrap();

                let mut payload = PhotoPayload::from_file_data(vec![0xFF, 0xD8])
                    .with_pixel_image(primary.clone())
                    .with_portrait_matte(radial_matte(256, 192));
                for class in &classes {
                    payload = payload.with_segmentation_matte(class.clone(), radial_matte(256, 192));
                }

                rt.block_on(async {
                    tracker
                        .handle(CaptureEvent::WillCapture(ResolvedCaptureParams::new(1)))
                        .await;
                    tracker.handle(CaptureEvent::PhotoProcessed(Ok(payload))).await;
                });
                black_box(tracker.request().segmentation_mattes().len())
            });
        });
    }

    group.finish();
}

criterion_group!(compositor_benches, benchmark_composite, benchmark_photo_processed);
criterion_main!(compositor_benches);
