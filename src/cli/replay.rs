//! Scripted capture replay
//!
//! A script is a JSON document listing the lifecycle events of one capture. File paths are
//! resolved relative to the script's directory.
//!
//! ```json
//! {
//!   "settings": { "enabled_segmentation_classes": ["hair"], "live_photo": true },
//!   "events": [
//!     { "event": "will_begin", "params": { "unique_id": 1, "live_photo_movie_dimensions": [1920, 1080] } },
//!     { "event": "will_capture" },
//!     { "event": "photo_processed", "photo": "photo.jpg", "portrait_matte": "portrait.png",
//!       "segmentation_mattes": { "hair": "hair.png" }, "orientation": 6 },
//!     { "event": "live_movie_finished", "file": "clip.mov", "duration_ms": 1500 },
//!     { "event": "capture_finished" }
//!   ]
//! }
//! ```

use crate::{
    capture::{
        CaptureCoordinator, CaptureEvent, CaptureSummary, LiveMovieInfo, PhotoPayload, RequestId,
        ResolvedCaptureParams,
    },
    config::{CaptureSettings, TrackerConfig},
    error::CaptureError,
    services::AssetIOService,
    types::{GeoLocation, SegmentationClass},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};

/// One scripted lifecycle event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    WillBegin {
        #[serde(default)]
        params: ResolvedCaptureParams,
    },
    WillCapture {
        #[serde(default)]
        params: ResolvedCaptureParams,
    },
    PhotoProcessed {
        photo: Option<PathBuf>,
        portrait_matte: Option<PathBuf>,
        #[serde(default)]
        segmentation_mattes: BTreeMap<String, PathBuf>,
        orientation: Option<u8>,
        error: Option<String>,
    },
    LiveMovieEventuallyAt {
        file: PathBuf,
        #[serde(default)]
        params: ResolvedCaptureParams,
    },
    LiveMovieFinished {
        file: PathBuf,
        #[serde(default)]
        duration_ms: u64,
        #[serde(default)]
        display_time_ms: u64,
        error: Option<String>,
        #[serde(default)]
        params: ResolvedCaptureParams,
    },
    CaptureFinished {
        #[serde(default)]
        params: ResolvedCaptureParams,
        error: Option<String>,
    },
}

/// A scripted capture
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureScript {
    #[serde(default)]
    pub settings: CaptureSettings,
    #[serde(default)]
    pub tracker: Option<TrackerConfig>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
    pub events: Vec<ScriptEvent>,
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Result of a replay, printed as JSON
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub request_id: RequestId,
    pub events_delivered: usize,
    pub events_rejected: usize,
    /// Final request state; `None` when the script never finished the capture
    pub summary: Option<CaptureSummary>,
}

impl CaptureScript {
    /// Load a script from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = AssetIOService::read_bytes(path)?;
        let mut script: Self = serde_json::from_slice(&data)
            .with_context(|| format!("Invalid capture script {}", path.display()))?;
        script.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(script)
    }

    /// Tracker configuration from the script, or defaults
    #[must_use]
    pub fn tracker_config(&self) -> TrackerConfig {
        self.tracker.clone().unwrap_or_default()
    }

    /// Deliver every event in order to a fresh request on `coordinator`
    pub async fn replay(&self, coordinator: &CaptureCoordinator) -> Result<ReplayReport> {
        let (sender, mut receiver) = tokio::sync::oneshot::channel();
        let request_id = coordinator.begin(self.settings.clone(), move |request| {
            let _ = sender.send(request.summary());
        })?;

        if let Some(location) = self.location {
            coordinator.set_location(request_id, location).await?;
        }

        let mut events_delivered = 0;
        let mut events_rejected = 0;
        for event in &self.events {
            let event = self.to_capture_event(event)?;
            let name = event.name();
            match coordinator.dispatch(request_id, event).await {
                Ok(()) => {
                    debug!(event = name, "Event delivered");
                    events_delivered += 1;
                },
                Err(error) => {
                    warn!(event = name, error = %error, "Event rejected");
                    events_rejected += 1;
                },
            }
        }

        Ok(ReplayReport {
            request_id,
            events_delivered,
            events_rejected,
            summary: receiver.try_recv().ok(),
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn to_capture_event(&self, event: &ScriptEvent) -> Result<CaptureEvent> {
        Ok(match event {
            ScriptEvent::WillBegin { params } => CaptureEvent::WillBegin(params.clone()),
            ScriptEvent::WillCapture { params } => CaptureEvent::WillCapture(params.clone()),
            ScriptEvent::PhotoProcessed {
                photo,
                portrait_matte,
                segmentation_mattes,
                orientation,
                error,
            } => {
                let result = match error {
                    Some(message) => Err(CaptureError::hardware(message.clone())),
                    None => Ok(self.load_payload(
                        photo.as_deref(),
                        portrait_matte.as_deref(),
                        segmentation_mattes,
                        *orientation,
                    )?),
                };
                CaptureEvent::PhotoProcessed(result)
            },
            ScriptEvent::LiveMovieEventuallyAt { file, params } => {
                CaptureEvent::LiveMovieEventuallyAt {
                    file_location: self.resolve(file),
                    params: params.clone(),
                }
            },
            ScriptEvent::LiveMovieFinished {
                file,
                duration_ms,
                display_time_ms,
                error,
                params,
            } => {
                let movie = match error {
                    Some(message) => Err(CaptureError::hardware(message.clone())),
                    None => Ok(LiveMovieInfo {
                        file_location: self.resolve(file),
                        duration: Duration::from_millis(*duration_ms),
                        display_time: Duration::from_millis(*display_time_ms),
                    }),
                };
                CaptureEvent::LiveMovieFinished {
                    movie,
                    params: params.clone(),
                }
            },
            ScriptEvent::CaptureFinished { params, error } => CaptureEvent::CaptureFinished {
                params: params.clone(),
                result: match error {
                    Some(message) => Err(CaptureError::hardware(message.clone())),
                    None => Ok(()),
                },
            },
        })
    }

    fn load_payload(
        &self,
        photo: Option<&Path>,
        portrait_matte: Option<&Path>,
        segmentation_mattes: &BTreeMap<String, PathBuf>,
        orientation: Option<u8>,
    ) -> Result<PhotoPayload> {
        let mut payload = PhotoPayload::default();
        if let Some(photo) = photo {
            let path = self.resolve(photo);
            payload.file_data = Some(
                AssetIOService::read_bytes(&path)
                    .with_context(|| format!("Failed to read photo {}", path.display()))?,
            );
        }
        if let Some(matte) = portrait_matte {
            let path = self.resolve(matte);
            payload.portrait_matte = Some(
                AssetIOService::load_matte(&path)
                    .with_context(|| format!("Failed to load matte {}", path.display()))?,
            );
        }
        for (class, matte) in segmentation_mattes {
            let path = self.resolve(matte);
            let matte = AssetIOService::load_matte(&path)
                .with_context(|| format!("Failed to load matte {}", path.display()))?;
            payload
                .segmentation_mattes
                .insert(SegmentationClass::from_name(class), matte);
        }
        payload.exif_orientation = orientation;
        Ok(payload)
    }
}
