//! Per-request capture state machine
//!
//! One [`CaptureSessionTracker`] owns one [`CaptureRequest`] and is driven by the six
//! lifecycle events of the capture hardware. States only move forward:
//!
//! ```text
//! Created -> AwaitingCapture -> AwaitingProcessing -> AwaitingPersistence -> Finalized
//! ```
//!
//! Events that arrive out of their nominal order are accepted and never move the state
//! backwards. Live-movie events do not move it at all. Anything after `Finalized` is a
//! protocol violation: logged, not acted upon. The completion handler fires exactly once.

use super::{
    events::{CaptureEvent, LiveMovieInfo, PhotoPayload, ResolvedCaptureParams},
    hooks::{CaptureHooks, CompletionHandler, NoOpCaptureHooks},
    persistence::{persist, AssetStore},
    request::{CaptureRequest, RequestId},
};
use crate::{
    compositor::MatteCompositor,
    config::{CaptureSettings, CompositeExecution, TrackerConfig},
    error::{CaptureError, Result},
    policy::ErrorPolicy,
    services::AssetIOService,
    tracing_config::{events, spans},
    types::{ColorProfile, MatteCompositeResult, MatteImage, MatteType},
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use tracing::{debug, instrument, warn, Instrument};

/// Lifecycle state of a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrackerState {
    Created,
    AwaitingCapture,
    AwaitingProcessing,
    AwaitingPersistence,
    Finalized,
}

impl std::fmt::Display for TrackerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::AwaitingCapture => "awaiting-capture",
            Self::AwaitingProcessing => "awaiting-processing",
            Self::AwaitingPersistence => "awaiting-persistence",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

type CompositeJob = (MatteType, MatteImage);

/// State machine driving a single capture from shutter to completion
pub struct CaptureSessionTracker {
    request: CaptureRequest,
    state: TrackerState,
    config: TrackerConfig,
    compositor: Arc<MatteCompositor>,
    hooks: Arc<dyn CaptureHooks>,
    store: Arc<dyn AssetStore>,
    completion: Option<CompletionHandler>,
}

impl CaptureSessionTracker {
    /// Start building a tracker for a capture with the given settings
    #[must_use]
    pub fn builder(settings: CaptureSettings) -> CaptureSessionTrackerBuilder {
        CaptureSessionTrackerBuilder::new(settings)
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.request.id()
    }

    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    #[must_use]
    pub fn request(&self) -> &CaptureRequest {
        &self.request
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state == TrackerState::Finalized
    }

    /// Attach a geolocation tag, read when the capture is persisted
    pub fn set_location(&mut self, location: crate::types::GeoLocation) {
        if self.reject_if_finalized("set_location") {
            return;
        }
        self.request.set_location(location);
    }

    /// Route an event to its handler
    pub async fn handle(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::WillBegin(params) => self.on_capture_will_begin(&params),
            CaptureEvent::WillCapture(params) => self.on_will_capture(&params),
            CaptureEvent::PhotoProcessed(result) => self.on_photo_processed(result).await,
            CaptureEvent::LiveMovieEventuallyAt {
                file_location,
                params,
            } => self.on_live_movie_eventually_at(&file_location, &params),
            CaptureEvent::LiveMovieFinished { movie, params } => {
                self.on_live_movie_finished(movie, &params);
            },
            CaptureEvent::CaptureFinished { params, result } => {
                self.on_capture_finished(&params, result).await;
            },
        }
    }

    /// Capture settings are resolved; a motion clip may be coming
    pub fn on_capture_will_begin(&mut self, params: &ResolvedCaptureParams) {
        if !self.advance(TrackerState::AwaitingCapture, "capture_will_begin") {
            return;
        }

        if params.expects_live_movie() {
            self.hooks.live_capture_active(true);
        }
        if let Some(range) = params.photo_processing_time_range {
            self.request.set_max_processing_deadline(range.end());
        }
    }

    /// The hardware is about to capture
    pub fn on_will_capture(&mut self, _params: &ResolvedCaptureParams) {
        if !self.advance(TrackerState::AwaitingProcessing, "will_capture") {
            return;
        }

        self.hooks.will_capture();
        if let Some(deadline) = self.request.max_processing_deadline() {
            if deadline > self.config.processing_indicator_threshold() {
                debug!(deadline_ms = deadline.as_millis() as u64, "Slow processing expected");
                self.hooks.processing_indicator(true);
            }
        }
    }

    /// The processed photo (or a hardware error) arrived
    ///
    /// Every matte composite produced here is stored before this returns.
    #[instrument(skip_all, fields(request_id = %self.request.id()))]
    pub async fn on_photo_processed(&mut self, result: Result<PhotoPayload>) {
        if !self.advance(TrackerState::AwaitingPersistence, "photo_processed") {
            return;
        }
        self.hooks.processing_indicator(false);

        let mut payload = match result {
            Ok(payload) => payload,
            Err(error) => {
                ErrorPolicy::apply(&error, "photo_processed");
                return;
            },
        };

        let Some(file_data) = payload.file_data.take() else {
            ErrorPolicy::apply(
                &CaptureError::missing_data("processed photo carried no file data"),
                "photo_processed",
            );
            return;
        };
        if self.request.has_primary_image() {
            ErrorPolicy::apply(
                &CaptureError::protocol_violation("primary image delivered twice"),
                "photo_processed",
            );
            return;
        }

        let jobs = self.collect_jobs(&mut payload);
        let primary = if jobs.is_empty() {
            None
        } else {
            Self::primary_pixels(&mut payload, &file_data)
        };
        self.request.set_primary_image_bytes(file_data);

        let Some((primary, profile)) = primary else {
            return;
        };

        let results = self
            .run_composites(primary, profile, payload.exif_orientation, jobs)
            .await;
        self.store_composites(results);
    }

    /// The companion movie file location is known but may still be written
    pub fn on_live_movie_eventually_at(&mut self, file_location: &Path, _params: &ResolvedCaptureParams) {
        if self.reject_if_finalized("live_movie_eventually_at") {
            return;
        }
        debug!(path = %file_location.display(), "Companion movie pending");
        self.hooks.live_capture_active(false);
    }

    /// The companion movie finished recording (or failed)
    pub fn on_live_movie_finished(&mut self, movie: Result<LiveMovieInfo>, _params: &ResolvedCaptureParams) {
        if self.reject_if_finalized("live_movie_finished") {
            return;
        }

        match movie {
            Ok(info) => {
                debug!(
                    path = %info.file_location.display(),
                    duration_ms = info.duration.as_millis() as u64,
                    "Companion movie finished"
                );
                if !self.request.set_companion_movie_location(info.file_location) {
                    warn!("Companion movie already recorded; ignoring second location");
                }
            },
            Err(error) => {
                ErrorPolicy::apply(&error, "live_movie_finished");
            },
        }
    }

    /// Terminal event: persist what was gathered, then finalize
    #[instrument(skip_all, fields(request_id = %self.request.id()))]
    pub async fn on_capture_finished(&mut self, _params: &ResolvedCaptureParams, result: Result<()>) {
        if !self.advance(TrackerState::AwaitingPersistence, "capture_finished") {
            return;
        }

        if let Err(error) = result {
            ErrorPolicy::apply(&error, "capture_finished");
        } else {
            match self.request.take_asset_request(self.config.compositor.output_format) {
                Some(asset) => {
                    let span = spans::persistence(&self.request.id(), asset.resource_count());
                    let outcome = persist(self.store.as_ref(), asset).instrument(span).await;
                    self.request.record_persistence(outcome);
                },
                None => {
                    ErrorPolicy::apply(
                        &CaptureError::missing_data("no primary image at capture finish"),
                        "capture_finished",
                    );
                },
            }
        }

        self.finalize().await;
    }

    async fn finalize(&mut self) {
        if self.is_finalized() {
            return;
        }

        if let Some(movie) = self.request.companion_movie_location().map(Path::to_path_buf) {
            match AssetIOService::remove_if_present(&movie).await {
                Ok(true) => debug!(path = %movie.display(), "Removed companion movie"),
                Ok(false) => debug!(path = %movie.display(), "Companion movie already gone"),
                Err(error) => {
                    ErrorPolicy::apply(&error, "finalize");
                },
            }
        }

        events::state_transition(&self.request.id(), self.state, TrackerState::Finalized);
        self.state = TrackerState::Finalized;
        self.request.mark_finalized();

        if let Some(completion) = self.completion.take() {
            completion(&self.request);
        }
        events::capture_completed(&self.request.summary());
    }

    /// Move forward to `to` unless finalized; never moves backwards
    fn advance(&mut self, to: TrackerState, event: &str) -> bool {
        if self.reject_if_finalized(event) {
            return false;
        }
        if to > self.state {
            events::state_transition(&self.request.id(), self.state, to);
            self.state = to;
        }
        true
    }

    fn reject_if_finalized(&self, event: &str) -> bool {
        if self.is_finalized() {
            ErrorPolicy::apply(
                &CaptureError::protocol_violation(format!(
                    "{event} received for finalized request {}",
                    self.request.id()
                )),
                event,
            );
            return true;
        }
        false
    }

    /// Portrait matte first, then one job per enabled segmentation class
    fn collect_jobs(&self, payload: &mut PhotoPayload) -> Vec<CompositeJob> {
        let mut jobs = Vec::new();
        if let Some(matte) = payload.portrait_matte.take() {
            jobs.push((MatteType::PortraitEffects, matte));
        }
        for class in &self.request.settings().enabled_segmentation_classes {
            match payload.segmentation_mattes.remove(class) {
                Some(matte) => jobs.push((MatteType::Segmentation(class.clone()), matte)),
                None => debug!(class = %class.identifier(), "No matte delivered for enabled class"),
            }
        }
        if !payload.segmentation_mattes.is_empty() {
            debug!(
                count = payload.segmentation_mattes.len(),
                "Ignoring mattes for classes that are not enabled"
            );
        }
        jobs
    }

    /// Pixel image and profile of the primary, decoding the file data when needed
    fn primary_pixels(
        payload: &mut PhotoPayload,
        file_data: &[u8],
    ) -> Option<(DynamicImage, Option<ColorProfile>)> {
        if let Some(image) = payload.pixel_image.take() {
            return Some((image, payload.color_profile.take()));
        }

        match AssetIOService::decode_with_profile(file_data) {
            Ok((image, embedded)) => Some((image, payload.color_profile.take().or(embedded))),
            Err(error) => {
                ErrorPolicy::apply(
                    &CaptureError::missing_pixel_data(format!("primary image undecodable: {error}")),
                    "photo_processed",
                );
                None
            },
        }
    }

    async fn run_composites(
        &self,
        primary: DynamicImage,
        profile: Option<ColorProfile>,
        orientation: Option<u8>,
        jobs: Vec<CompositeJob>,
    ) -> Vec<(MatteType, Result<MatteCompositeResult>)> {
        match self.config.composite_execution {
            CompositeExecution::Inline => jobs
                .into_iter()
                .map(|(matte_type, matte)| {
                    let _span = spans::compositing(&matte_type).entered();
                    let result = self.compositor.composite(
                        &primary,
                        profile.as_ref(),
                        &matte,
                        &matte_type,
                        orientation,
                    );
                    (matte_type, result)
                })
                .collect(),
            CompositeExecution::Blocking => {
                let primary = Arc::new(primary);
                let profile = Arc::new(profile);

                let (matte_types, handles): (Vec<_>, Vec<_>) = jobs
                    .into_iter()
                    .map(|(matte_type, matte)| {
                        let compositor = Arc::clone(&self.compositor);
                        let primary = Arc::clone(&primary);
                        let profile = Arc::clone(&profile);
                        let job_type = matte_type.clone();
                        let handle = tokio::task::spawn_blocking(move || {
                            let _span = spans::compositing(&job_type).entered();
                            compositor.composite(
                                &primary,
                                (*profile).as_ref(),
                                &matte,
                                &job_type,
                                orientation,
                            )
                        });
                        (matte_type, handle)
                    })
                    .unzip();

                let joined = futures::future::join_all(handles).await;
                matte_types
                    .into_iter()
                    .zip(joined)
                    .map(|(matte_type, joined)| {
                        let result = joined.unwrap_or_else(|e| {
                            Err(CaptureError::internal(format!("composite task failed: {e}")))
                        });
                        (matte_type, result)
                    })
                    .collect()
            },
        }
    }

    fn store_composites(&mut self, results: Vec<(MatteType, Result<MatteCompositeResult>)>) {
        for (matte_type, result) in results {
            match result {
                Ok(composite) if composite.is_empty() => {
                    debug!(matte_type = %matte_type, "Composite produced no bytes; skipped");
                },
                Ok(composite) => match matte_type {
                    MatteType::PortraitEffects => {
                        if !self.request.set_portrait_matte(composite) {
                            warn!("Portrait composite already stored; ignoring duplicate");
                        }
                    },
                    MatteType::Segmentation(_) => self.request.push_segmentation_matte(composite),
                },
                Err(error) => {
                    ErrorPolicy::apply(&error, &format!("photo_processed:{matte_type}"));
                },
            }
        }
    }
}

/// Builder for [`CaptureSessionTracker`]
pub struct CaptureSessionTrackerBuilder {
    settings: CaptureSettings,
    id: Option<RequestId>,
    config: TrackerConfig,
    compositor: Option<Arc<MatteCompositor>>,
    hooks: Arc<dyn CaptureHooks>,
    store: Option<Arc<dyn AssetStore>>,
    completion: Option<CompletionHandler>,
}

impl CaptureSessionTrackerBuilder {
    fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            id: None,
            config: TrackerConfig::default(),
            compositor: None,
            hooks: Arc::new(NoOpCaptureHooks),
            store: None,
            completion: None,
        }
    }

    #[must_use]
    pub fn id(mut self, id: RequestId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a compositor instead of building one from the tracker configuration
    #[must_use]
    pub fn compositor(mut self, compositor: Arc<MatteCompositor>) -> Self {
        self.compositor = Some(compositor);
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn CaptureHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn on_complete<F>(mut self, completion: F) -> Self
    where
        F: FnOnce(&CaptureRequest) + Send + 'static,
    {
        self.completion = Some(Box::new(completion));
        self
    }

    /// Validate the configuration and build the tracker
    ///
    /// # Errors
    /// - Invalid tracker or compositor configuration
    /// - No asset store supplied
    pub fn build(self) -> Result<CaptureSessionTracker> {
        self.config.validate()?;
        let store = self
            .store
            .ok_or_else(|| CaptureError::invalid_config("an asset store is required"))?;
        let compositor = match self.compositor {
            Some(compositor) => compositor,
            None => Arc::new(MatteCompositor::new(self.config.compositor.clone())?),
        };
        let id = self.id.unwrap_or_default();

        Ok(CaptureSessionTracker {
            request: CaptureRequest::new(id, self.settings),
            state: TrackerState::Created,
            config: self.config,
            compositor,
            hooks: self.hooks,
            store,
            completion: self.completion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::persistence::{AssetCreationRequest, AuthorizationStatus};
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    #[derive(Default)]
    struct CountingStore {
        saves: AtomicUsize,
    }

    #[async_trait]
    impl AssetStore for CountingStore {
        async fn authorization_status(&self) -> AuthorizationStatus {
            AuthorizationStatus::Authorized
        }

        async fn save(&self, request: AssetCreationRequest) -> Result<String> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(request.request_id.to_string())
        }
    }

    fn tracker(store: Arc<CountingStore>) -> CaptureSessionTracker {
        CaptureSessionTracker::builder(CaptureSettings::default())
            .store(store)
            .build()
            .unwrap()
    }

    #[test]
    fn test_states_are_ordered() {
        assert!(TrackerState::Created < TrackerState::AwaitingCapture);
        assert!(TrackerState::AwaitingPersistence < TrackerState::Finalized);
    }

    #[test]
    fn test_builder_requires_store() {
        let result = CaptureSessionTracker::builder(CaptureSettings::default()).build();
        assert!(matches!(result, Err(CaptureError::InvalidConfig(_))));
    }

    #[test]
    fn test_state_never_moves_backwards() {
        let mut tracker = tracker(Arc::new(CountingStore::default()));
        let params = ResolvedCaptureParams::new(1);

        tracker.on_will_capture(&params);
        assert_eq!(tracker.state(), TrackerState::AwaitingProcessing);
        tracker.on_capture_will_begin(&params);
        assert_eq!(tracker.state(), TrackerState::AwaitingProcessing);
    }

    #[tokio::test]
    async fn test_events_after_finalize_are_ignored() {
        let store = Arc::new(CountingStore::default());
        let completions = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&completions);
        let mut tracker = CaptureSessionTracker::builder(CaptureSettings::default())
            .store(Arc::clone(&store) as Arc<dyn AssetStore>)
            .on_complete(move |_| *counter.lock().unwrap() += 1)
            .build()
            .unwrap();
        let params = ResolvedCaptureParams::new(1);

        tracker
            .on_photo_processed(Ok(PhotoPayload::from_file_data(vec![1, 2, 3])))
            .await;
        tracker.on_capture_finished(&params, Ok(())).await;
        assert!(tracker.is_finalized());

        tracker
            .on_photo_processed(Ok(PhotoPayload::from_file_data(vec![4])))
            .await;
        tracker.on_capture_finished(&params, Ok(())).await;
        tracker.on_will_capture(&params);

        assert_eq!(*completions.lock().unwrap(), 1);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.state(), TrackerState::Finalized);
    }
}
