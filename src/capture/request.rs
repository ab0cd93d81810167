//! Accumulated state of one capture request

use super::persistence::{AssetCreationRequest, AuxiliaryResource, PersistenceOutcome};
use crate::{
    config::{CaptureSettings, OutputFormat},
    types::{CompositeKind, GeoLocation, MatteCompositeResult, MatteType},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use uuid::Uuid;

/// Identifier of a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal status of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureOutcome {
    NotYetFinalized,
    Finalized,
}

/// State of a single photo capture, owned by its tracker
///
/// Encoded bytes move into the asset creation request at persistence time. The request
/// keeps the composite descriptors (type, kind, extent) so its final state stays readable.
#[derive(Debug)]
pub struct CaptureRequest {
    id: RequestId,
    settings: CaptureSettings,
    primary_image_bytes: Option<Vec<u8>>,
    primary_image_len: Option<usize>,
    companion_movie_location: Option<PathBuf>,
    portrait_matte: Option<MatteCompositeResult>,
    segmentation_mattes: Vec<MatteCompositeResult>,
    max_processing_deadline: Option<Duration>,
    location: Option<GeoLocation>,
    outcome: CaptureOutcome,
    persistence: Option<PersistenceOutcome>,
}

impl CaptureRequest {
    #[must_use]
    pub fn new(id: RequestId, settings: CaptureSettings) -> Self {
        Self {
            id,
            settings,
            primary_image_bytes: None,
            primary_image_len: None,
            companion_movie_location: None,
            portrait_matte: None,
            segmentation_mattes: Vec::new(),
            max_processing_deadline: None,
            location: None,
            outcome: CaptureOutcome::NotYetFinalized,
            persistence: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Encoded primary image, until handed to the asset store
    #[must_use]
    pub fn primary_image_bytes(&self) -> Option<&[u8]> {
        self.primary_image_bytes.as_deref()
    }

    /// Whether the primary image was ever delivered
    #[must_use]
    pub fn has_primary_image(&self) -> bool {
        self.primary_image_len.is_some()
    }

    #[must_use]
    pub fn companion_movie_location(&self) -> Option<&Path> {
        self.companion_movie_location.as_deref()
    }

    #[must_use]
    pub fn portrait_matte(&self) -> Option<&MatteCompositeResult> {
        self.portrait_matte.as_ref()
    }

    /// Encoded portrait composite, until handed to the asset store
    #[must_use]
    pub fn portrait_matte_bytes(&self) -> Option<&[u8]> {
        self.portrait_matte
            .as_ref()
            .filter(|result| !result.is_empty())
            .map(|result| result.bytes.as_slice())
    }

    #[must_use]
    pub fn segmentation_mattes(&self) -> &[MatteCompositeResult] {
        &self.segmentation_mattes
    }

    #[must_use]
    pub fn max_processing_deadline(&self) -> Option<Duration> {
        self.max_processing_deadline
    }

    #[must_use]
    pub fn location(&self) -> Option<GeoLocation> {
        self.location
    }

    #[must_use]
    pub fn outcome(&self) -> CaptureOutcome {
        self.outcome
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.outcome == CaptureOutcome::Finalized
    }

    /// What the asset store reported, if persistence ran
    #[must_use]
    pub fn persistence_outcome(&self) -> Option<&PersistenceOutcome> {
        self.persistence.as_ref()
    }

    /// Serializable snapshot of the request
    #[must_use]
    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            id: self.id,
            outcome: self.outcome,
            primary_image_bytes: self.primary_image_len,
            companion_movie: self.companion_movie_location.clone(),
            portrait_matte: self.portrait_matte.as_ref().map(|result| result.kind),
            segmentation_mattes: self
                .segmentation_mattes
                .iter()
                .map(|result| CompositeSummary {
                    matte_type: result.matte_type.clone(),
                    kind: result.kind,
                    dimensions: result.dimensions,
                })
                .collect(),
            location: self.location,
            persistence: self.persistence.clone(),
        }
    }

    pub(crate) fn set_primary_image_bytes(&mut self, bytes: Vec<u8>) -> bool {
        if self.primary_image_len.is_some() {
            return false;
        }
        self.primary_image_len = Some(bytes.len());
        self.primary_image_bytes = Some(bytes);
        true
    }

    pub(crate) fn set_companion_movie_location(&mut self, location: PathBuf) -> bool {
        if self.companion_movie_location.is_some() {
            return false;
        }
        self.companion_movie_location = Some(location);
        true
    }

    pub(crate) fn set_portrait_matte(&mut self, result: MatteCompositeResult) -> bool {
        if self.portrait_matte.is_some() {
            return false;
        }
        self.portrait_matte = Some(result);
        true
    }

    pub(crate) fn push_segmentation_matte(&mut self, result: MatteCompositeResult) {
        self.segmentation_mattes.push(result);
    }

    pub(crate) fn set_max_processing_deadline(&mut self, deadline: Duration) {
        self.max_processing_deadline = Some(deadline);
    }

    pub(crate) fn set_location(&mut self, location: GeoLocation) {
        self.location = Some(location);
    }

    pub(crate) fn record_persistence(&mut self, outcome: PersistenceOutcome) {
        self.persistence = Some(outcome);
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.outcome = CaptureOutcome::Finalized;
    }

    /// Move the accumulated bundle out for persistence
    ///
    /// Returns `None` when no primary image was delivered. The companion movie path stays
    /// recorded so finalize can remove whatever the store left behind.
    pub(crate) fn take_asset_request(
        &mut self,
        composite_format: OutputFormat,
    ) -> Option<AssetCreationRequest> {
        let primary = self.primary_image_bytes.take()?;

        let auxiliary = self
            .portrait_matte
            .iter_mut()
            .chain(self.segmentation_mattes.iter_mut())
            .filter(|result| !result.is_empty())
            .map(|result| AuxiliaryResource {
                matte_type: result.matte_type.clone(),
                kind: result.kind,
                format: composite_format,
                bytes: std::mem::take(&mut result.bytes),
            })
            .collect();

        Some(AssetCreationRequest {
            request_id: self.id,
            primary,
            format_identifier: self.settings.photo_codec.format_identifier().to_string(),
            primary_extension: self.settings.photo_codec.extension().to_string(),
            companion_movie: self.companion_movie_location.clone(),
            location: self.location,
            auxiliary,
        })
    }
}

/// Descriptor of one stored composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSummary {
    pub matte_type: MatteType,
    pub kind: CompositeKind,
    pub dimensions: (u32, u32),
}

/// Serializable snapshot of a capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub id: RequestId,
    pub outcome: CaptureOutcome,
    pub primary_image_bytes: Option<usize>,
    pub companion_movie: Option<PathBuf>,
    pub portrait_matte: Option<CompositeKind>,
    pub segmentation_mattes: Vec<CompositeSummary>,
    pub location: Option<GeoLocation>,
    pub persistence: Option<PersistenceOutcome>,
}
