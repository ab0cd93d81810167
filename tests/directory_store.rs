//! Directory asset store driven through the capture coordinator

mod common;

use common::{left_half_matte, matte, photo_bytes};
use photo_matte::{
    AssetStore, CaptureCoordinator, CaptureEvent, CaptureSettings, CompositeKind,
    DirectoryAssetStore, LiveMovieInfo, LoggingCaptureHooks, PersistenceOutcome, PhotoPayload,
    ResolvedCaptureParams, SegmentationClass, TrackerConfig,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn coordinator(store: Arc<DirectoryAssetStore>) -> CaptureCoordinator {
    CaptureCoordinator::new(
        TrackerConfig::default(),
        Arc::new(LoggingCaptureHooks),
        store as Arc<dyn AssetStore>,
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_capture_lands_in_directory() {
    let root = TempDir::new().unwrap();
    let movie = root.path().join("capture.mov");
    std::fs::write(&movie, b"moov").unwrap();

    let store = Arc::new(DirectoryAssetStore::new(root.path().join("library")));
    let coordinator = coordinator(Arc::clone(&store));
    let outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);
    let settings = CaptureSettings {
        enabled_segmentation_classes: vec![SegmentationClass::Hair],
        live_photo: true,
        ..CaptureSettings::default()
    };
    let id = coordinator
        .begin(settings, move |request| {
            *sink.lock().unwrap() = request.persistence_outcome().cloned();
        })
        .unwrap();

    let params = ResolvedCaptureParams::new(11).with_live_photo_movie_dimensions(1920, 1440);
    let payload = PhotoPayload::from_file_data(photo_bytes(12, 8, [90, 120, 150]))
        .with_portrait_matte(left_half_matte(6, 4))
        .with_segmentation_matte(SegmentationClass::Hair, matte(6, 4, 200));
    let events = vec![
        CaptureEvent::WillBegin(params.clone()),
        CaptureEvent::WillCapture(params.clone()),
        CaptureEvent::PhotoProcessed(Ok(payload)),
        CaptureEvent::LiveMovieFinished {
            movie: Ok(LiveMovieInfo {
                file_location: movie.clone(),
                duration: Duration::from_millis(2500),
                display_time: Duration::from_millis(1200),
            }),
            params: params.clone(),
        },
        CaptureEvent::CaptureFinished {
            params,
            result: Ok(()),
        },
    ];
    for event in events {
        coordinator.dispatch(id, event).await.unwrap();
    }

    let Some(PersistenceOutcome::Saved { asset_id }) = outcome.lock().unwrap().clone() else {
        panic!("capture was not saved");
    };
    let manifest = store.read_manifest(&asset_id).await.unwrap();
    assert!(manifest.primary.starts_with("primary."));
    assert_eq!(manifest.companion_movie.as_deref(), Some("companion.mov"));
    assert_eq!(manifest.resources.len(), 2);
    assert_eq!(manifest.resources[0].auxiliary_type, "portrait-effects-matte");
    assert_eq!(manifest.resources[1].auxiliary_type, "segmentation-matte:hair");
    assert!(manifest
        .resources
        .iter()
        .all(|resource| resource.composite_kind == CompositeKind::Blended));

    let dir = store.asset_dir(&asset_id);
    for resource in &manifest.resources {
        let composite = common::decode(&std::fs::read(dir.join(&resource.file)).unwrap());
        assert_eq!(composite.dimensions(), (12, 8));
    }
    assert!(dir.join("companion.mov").exists());
    assert!(!movie.exists());
    assert_eq!(coordinator.in_flight(), 0);
}

#[tokio::test]
async fn test_denied_store_leaves_root_empty() {
    let root = TempDir::new().unwrap();
    let store = Arc::new(DirectoryAssetStore::new(root.path()));
    store.set_authorized(false);
    let coordinator = coordinator(Arc::clone(&store));

    let outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);
    let id = coordinator
        .begin(CaptureSettings::default(), move |request| {
            *sink.lock().unwrap() = request.persistence_outcome().cloned();
        })
        .unwrap();

    coordinator
        .dispatch(
            id,
            CaptureEvent::PhotoProcessed(Ok(PhotoPayload::from_file_data(photo_bytes(4, 4, [0; 3])))),
        )
        .await
        .unwrap();
    coordinator
        .dispatch(
            id,
            CaptureEvent::CaptureFinished {
                params: ResolvedCaptureParams::new(1),
                result: Ok(()),
            },
        )
        .await
        .unwrap();

    assert_eq!(*outcome.lock().unwrap(), Some(PersistenceOutcome::NotAuthorized));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[cfg(feature = "cli")]
#[tokio::test]
async fn test_replayed_script_is_saved() {
    use photo_matte::cli::CaptureScript;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("photo.png"), photo_bytes(8, 8, [10, 10, 10])).unwrap();
    let mut matte_png = Vec::new();
    image::DynamicImage::ImageLuma8(left_half_matte(4, 4).pixels)
        .write_to(&mut std::io::Cursor::new(&mut matte_png), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.path().join("portrait.png"), matte_png).unwrap();
    std::fs::write(
        dir.path().join("capture.json"),
        r#"{
            "events": [
                { "event": "will_begin", "params": { "unique_id": 5 } },
                { "event": "will_capture" },
                { "event": "photo_processed", "photo": "photo.png", "portrait_matte": "portrait.png" },
                { "event": "capture_finished" }
            ]
        }"#,
    )
    .unwrap();

    let script = CaptureScript::load(dir.path().join("capture.json")).unwrap();
    let store = Arc::new(DirectoryAssetStore::new(dir.path().join("library")));
    let coordinator = coordinator(Arc::clone(&store));
    let report = script.replay(&coordinator).await.unwrap();

    assert_eq!(report.events_delivered, 4);
    assert_eq!(report.events_rejected, 0);
    let summary = report.summary.unwrap();
    assert_eq!(summary.portrait_matte, Some(CompositeKind::Blended));
    let Some(PersistenceOutcome::Saved { asset_id }) = summary.persistence else {
        panic!("replay was not saved");
    };
    assert_eq!(store.read_manifest(&asset_id).await.unwrap().resources.len(), 1);
}
