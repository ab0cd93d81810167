//! Asset persistence: the store interface and a directory-backed implementation
//!
//! A finished capture is handed over as one [`AssetCreationRequest`]. [`persist`] checks
//! authorization, performs the transactional save and folds every result into a
//! [`PersistenceOutcome`]; nothing here escalates past the tracker.

use super::request::RequestId;
use crate::{
    config::OutputFormat,
    error::{CaptureError, Result},
    policy::ErrorPolicy,
    types::{CompositeKind, GeoLocation, MatteType},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info, instrument, warn};

/// Authorization answer from the asset store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Authorized,
    Denied,
}

/// Composite saved as an independent asset linked to the primary image
#[derive(Debug, Clone)]
pub struct AuxiliaryResource {
    pub matte_type: MatteType,
    pub kind: CompositeKind,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

/// One transactional save request
#[derive(Debug, Clone)]
pub struct AssetCreationRequest {
    pub request_id: RequestId,
    /// Encoded primary image
    pub primary: Vec<u8>,
    /// Declared output format identifier of the primary image
    pub format_identifier: String,
    pub primary_extension: String,
    /// Temporary motion clip; moved into the store
    pub companion_movie: Option<PathBuf>,
    pub location: Option<GeoLocation>,
    pub auxiliary: Vec<AuxiliaryResource>,
}

impl AssetCreationRequest {
    /// Number of image resources: the primary plus every auxiliary composite
    #[must_use]
    pub fn resource_count(&self) -> usize {
        1 + self.auxiliary.len()
    }
}

/// What the store reported for a save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistenceOutcome {
    Saved { asset_id: String },
    SaveFailed(String),
    NotAuthorized,
}

impl PersistenceOutcome {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Persistent photo-asset store
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Ask for permission to add assets
    async fn authorization_status(&self) -> AuthorizationStatus;

    /// Save the primary image, linked resources and companion movie in one transaction
    ///
    /// Returns the identifier of the created asset.
    async fn save(&self, request: AssetCreationRequest) -> Result<String>;
}

/// Authorize, save, and report the outcome
///
/// Failures are logged through the error policy and returned as an outcome.
#[instrument(
    skip(store, request),
    fields(request_id = %request.request_id, resources = request.resource_count())
)]
pub async fn persist(store: &dyn AssetStore, request: AssetCreationRequest) -> PersistenceOutcome {
    if store.authorization_status().await != AuthorizationStatus::Authorized {
        ErrorPolicy::apply(&CaptureError::NotAuthorized, "persistence");
        return PersistenceOutcome::NotAuthorized;
    }

    match store.save(request).await {
        Ok(asset_id) => {
            info!(asset_id = %asset_id, "💾 Capture saved");
            PersistenceOutcome::Saved { asset_id }
        },
        Err(error) => {
            ErrorPolicy::apply(&error, "persistence");
            PersistenceOutcome::SaveFailed(error.to_string())
        },
    }
}

/// Manifest entry for one linked resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestResource {
    pub file: String,
    pub auxiliary_type: String,
    pub composite_kind: CompositeKind,
}

/// JSON manifest written next to a saved asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub asset_id: String,
    pub created_at: DateTime<Utc>,
    pub format_identifier: String,
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion_movie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    pub resources: Vec<ManifestResource>,
}

/// File name of the manifest inside each asset directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Asset store writing one directory per capture under a root
///
/// Layout: `<root>/<request id>/{primary.<ext>, aux-<n>-<type>.<ext>, companion.<ext>, manifest.json}`
pub struct DirectoryAssetStore {
    root: PathBuf,
    authorized: AtomicBool,
}

impl DirectoryAssetStore {
    /// Store rooted at `root`, authorized by default
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            authorized: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Grant or revoke authorization
    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    /// Directory an asset is written to
    #[must_use]
    pub fn asset_dir(&self, asset_id: &str) -> PathBuf {
        self.root.join(asset_id)
    }

    /// Read the manifest of a saved asset
    pub async fn read_manifest(&self, asset_id: &str) -> Result<AssetManifest> {
        let path = self.asset_dir(asset_id).join(MANIFEST_FILE);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| CaptureError::file_io_error("read manifest", &path, &e))?;
        serde_json::from_slice(&data)
            .map_err(|e| CaptureError::persistence(format!("Invalid manifest {}: {e}", path.display())))
    }

    async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| CaptureError::persistence(format!("Failed to write {}: {e}", path.display())))
    }

    /// Move a file, falling back to copy + delete across filesystems
    async fn move_file(from: &Path, to: &Path) -> Result<()> {
        if tokio::fs::rename(from, to).await.is_ok() {
            return Ok(());
        }
        tokio::fs::copy(from, to).await.map_err(|e| {
            CaptureError::persistence(format!("Failed to move {}: {e}", from.display()))
        })?;
        if let Err(e) = tokio::fs::remove_file(from).await {
            warn!(path = %from.display(), error = %e, "Moved movie source could not be removed");
        }
        Ok(())
    }

    async fn write_asset(
        &self,
        dir: &Path,
        request: &AssetCreationRequest,
        moved_movie: &mut Option<(PathBuf, PathBuf)>,
    ) -> Result<AssetManifest> {
        let primary_name = format!("primary.{}", request.primary_extension);
        Self::write_file(&dir.join(&primary_name), &request.primary).await?;

        let mut resources = Vec::with_capacity(request.auxiliary.len());
        for (index, resource) in request.auxiliary.iter().enumerate() {
            let tag = resource.matte_type.auxiliary_tag().replace(':', "-");
            let file = format!("aux-{index}-{tag}.{}", resource.format.extension());
            Self::write_file(&dir.join(&file), &resource.bytes).await?;
            resources.push(ManifestResource {
                file,
                auxiliary_type: resource.matte_type.auxiliary_tag(),
                composite_kind: resource.kind,
            });
        }

        let companion_movie = match &request.companion_movie {
            Some(source) => {
                let extension = source.extension().and_then(|e| e.to_str()).unwrap_or("mov");
                let name = format!("companion.{extension}");
                let target = dir.join(&name);
                Self::move_file(source, &target).await?;
                *moved_movie = Some((source.clone(), target));
                Some(name)
            },
            None => None,
        };

        let manifest = AssetManifest {
            asset_id: request.request_id.to_string(),
            created_at: Utc::now(),
            format_identifier: request.format_identifier.clone(),
            primary: primary_name,
            companion_movie,
            location: request.location,
            resources,
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| CaptureError::persistence(format!("Failed to serialize manifest: {e}")))?;
        Self::write_file(&dir.join(MANIFEST_FILE), &json).await?;

        Ok(manifest)
    }

    async fn roll_back(dir: &Path, moved_movie: Option<(PathBuf, PathBuf)>) {
        if let Some((source, target)) = moved_movie {
            if let Err(e) = Self::move_file(&target, &source).await {
                warn!(error = %e, "Could not return companion movie during rollback");
            }
        }
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "Could not remove partial asset");
        }
    }
}

#[async_trait]
impl AssetStore for DirectoryAssetStore {
    async fn authorization_status(&self) -> AuthorizationStatus {
        if self.authorized.load(Ordering::SeqCst) {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        }
    }

    async fn save(&self, request: AssetCreationRequest) -> Result<String> {
        let asset_id = request.request_id.to_string();
        let dir = self.asset_dir(&asset_id);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(CaptureError::persistence(format!(
                "Asset {asset_id} already exists"
            )));
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CaptureError::persistence(format!("Failed to create {}: {e}", dir.display())))?;

        let mut moved_movie = None;
        match self.write_asset(&dir, &request, &mut moved_movie).await {
            Ok(manifest) => {
                debug!(
                    asset_id = %asset_id,
                    resources = manifest.resources.len(),
                    movie = manifest.companion_movie.is_some(),
                    "Asset written"
                );
                Ok(asset_id)
            },
            Err(error) => {
                Self::roll_back(&dir, moved_movie).await;
                Err(error)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn asset_request(movie: Option<PathBuf>) -> AssetCreationRequest {
        AssetCreationRequest {
            request_id: RequestId::new(),
            primary: vec![0xFF, 0xD8, 0xFF],
            format_identifier: "public.jpeg".to_string(),
            primary_extension: "jpg".to_string(),
            companion_movie: movie,
            location: Some(GeoLocation::new(52.52, 13.405)),
            auxiliary: vec![AuxiliaryResource {
                matte_type: MatteType::PortraitEffects,
                kind: CompositeKind::Blended,
                format: OutputFormat::Png,
                bytes: vec![1, 2, 3],
            }],
        }
    }

    #[tokio::test]
    async fn test_save_writes_manifest_and_moves_movie() {
        let root = TempDir::new().unwrap();
        let movie = root.path().join("clip.mov");
        std::fs::write(&movie, b"movie").unwrap();

        let store = DirectoryAssetStore::new(root.path().join("library"));
        let outcome = persist(&store, asset_request(Some(movie.clone()))).await;

        let PersistenceOutcome::Saved { asset_id } = outcome else {
            panic!("expected save, got {outcome:?}");
        };
        let manifest = store.read_manifest(&asset_id).await.unwrap();
        assert_eq!(manifest.primary, "primary.jpg");
        assert_eq!(manifest.resources.len(), 1);
        assert_eq!(manifest.resources[0].auxiliary_type, "portrait-effects-matte");
        assert_eq!(manifest.companion_movie.as_deref(), Some("companion.mov"));
        assert!(!movie.exists());
        assert!(store.asset_dir(&asset_id).join("companion.mov").exists());
    }

    #[tokio::test]
    async fn test_denied_authorization_skips_save() {
        let root = TempDir::new().unwrap();
        let store = DirectoryAssetStore::new(root.path());
        store.set_authorized(false);

        let outcome = persist(&store, asset_request(None)).await;
        assert_eq!(outcome, PersistenceOutcome::NotAuthorized);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back() {
        let root = TempDir::new().unwrap();
        let store = DirectoryAssetStore::new(root.path());
        let request = asset_request(Some(root.path().join("missing.mov")));
        let asset_dir = store.asset_dir(&request.request_id.to_string());

        let outcome = persist(&store, request).await;
        assert!(matches!(outcome, PersistenceOutcome::SaveFailed(_)));
        assert!(!asset_dir.exists());
    }
}
