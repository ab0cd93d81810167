//! Caller-side bookkeeping for concurrent capture requests
//!
//! Each request gets its own tracker behind its own async mutex, so events for one
//! request are handled one at a time while distinct requests proceed independently.
//! The only shared state is the id → tracker map, which the completion handler
//! uses to discard its entry.

use super::{
    events::CaptureEvent,
    hooks::CaptureHooks,
    persistence::AssetStore,
    request::{CaptureRequest, RequestId},
    tracker::{CaptureSessionTracker, TrackerState},
};
use crate::{
    compositor::MatteCompositor,
    config::{CaptureSettings, TrackerConfig},
    error::{CaptureError, Result},
    tracing_config::spans,
    types::GeoLocation,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, Instrument};

type TrackerHandle = Arc<tokio::sync::Mutex<CaptureSessionTracker>>;
type TrackerMap = Arc<Mutex<HashMap<RequestId, TrackerHandle>>>;

/// Creates trackers and routes lifecycle events to them by request id
pub struct CaptureCoordinator {
    config: TrackerConfig,
    compositor: Arc<MatteCompositor>,
    hooks: Arc<dyn CaptureHooks>,
    store: Arc<dyn AssetStore>,
    trackers: TrackerMap,
}

impl CaptureCoordinator {
    /// Create a coordinator sharing one compositor, hook set and store across requests
    ///
    /// # Errors
    /// - Invalid tracker or compositor configuration
    pub fn new(
        config: TrackerConfig,
        hooks: Arc<dyn CaptureHooks>,
        store: Arc<dyn AssetStore>,
    ) -> Result<Self> {
        config.validate()?;
        let compositor = Arc::new(MatteCompositor::new(config.compositor.clone())?);
        Ok(Self {
            config,
            compositor,
            hooks,
            store,
            trackers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Register a new capture request
    ///
    /// `on_complete` runs once, after the request was finalized and removed from the
    /// coordinator.
    pub fn begin<F>(&self, settings: CaptureSettings, on_complete: F) -> Result<RequestId>
    where
        F: FnOnce(&CaptureRequest) + Send + 'static,
    {
        let id = RequestId::new();
        let trackers = Arc::clone(&self.trackers);

        let tracker = CaptureSessionTracker::builder(settings)
            .id(id)
            .config(self.config.clone())
            .compositor(Arc::clone(&self.compositor))
            .hooks(Arc::clone(&self.hooks))
            .store(Arc::clone(&self.store))
            .on_complete(move |request| {
                trackers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&request.id());
                on_complete(request);
            })
            .build()?;

        self.lock_trackers()
            .insert(id, Arc::new(tokio::sync::Mutex::new(tracker)));
        debug!(request_id = %id, "Capture request registered");
        Ok(id)
    }

    /// Deliver one lifecycle event to the request's tracker
    ///
    /// # Errors
    /// - `ProtocolViolation` when the id is unknown or already completed
    pub async fn dispatch(&self, id: RequestId, event: CaptureEvent) -> Result<()> {
        let tracker = self.tracker(id, event.name())?;
        let span = spans::capture_session(&id);
        async move {
            let mut tracker = tracker.lock().await;
            tracker.handle(event).await;
        }
        .instrument(span)
        .await;
        Ok(())
    }

    /// Attach a geolocation tag to an in-flight request
    pub async fn set_location(&self, id: RequestId, location: GeoLocation) -> Result<()> {
        let tracker = self.tracker(id, "set_location")?;
        tracker.lock().await.set_location(location);
        Ok(())
    }

    /// Current state of an in-flight request
    pub async fn state(&self, id: RequestId) -> Option<TrackerState> {
        let tracker = self.lock_trackers().get(&id).cloned()?;
        let state = tracker.lock().await.state();
        Some(state)
    }

    /// Number of requests not yet completed
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock_trackers().len()
    }

    fn tracker(&self, id: RequestId, event: &str) -> Result<TrackerHandle> {
        self.lock_trackers().get(&id).cloned().ok_or_else(|| {
            CaptureError::protocol_violation(format!("{event} for unknown request {id}"))
        })
    }

    fn lock_trackers(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, TrackerHandle>> {
        self.trackers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        events::{PhotoPayload, ResolvedCaptureParams},
        hooks::NoOpCaptureHooks,
        persistence::DirectoryAssetStore,
    };
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_completed_requests_are_removed() {
        let dir = TempDir::new().unwrap();
        let coordinator = CaptureCoordinator::new(
            TrackerConfig::default(),
            Arc::new(NoOpCaptureHooks),
            Arc::new(DirectoryAssetStore::new(dir.path())),
        )
        .unwrap();

        let first = coordinator.begin(CaptureSettings::default(), |_| {}).unwrap();
        let second = coordinator.begin(CaptureSettings::default(), |_| {}).unwrap();
        assert_eq!(coordinator.in_flight(), 2);

        let params = ResolvedCaptureParams::new(1);
        coordinator
            .dispatch(first, CaptureEvent::PhotoProcessed(Ok(PhotoPayload::from_file_data(vec![1]))))
            .await
            .unwrap();
        coordinator
            .dispatch(
                first,
                CaptureEvent::CaptureFinished {
                    params,
                    result: Ok(()),
                },
            )
            .await
            .unwrap();

        assert_eq!(coordinator.in_flight(), 1);
        assert_eq!(coordinator.state(second).await, Some(TrackerState::Created));
        assert!(coordinator.state(first).await.is_none());

        let late = coordinator
            .dispatch(first, CaptureEvent::WillCapture(ResolvedCaptureParams::new(1)))
            .await;
        assert!(matches!(late, Err(CaptureError::ProtocolViolation(_))));
    }
}
