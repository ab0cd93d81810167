//! Capture session tracking
//!
//! The capture hardware reports each photo through six ordered lifecycle events.
//! [`CaptureSessionTracker`] accumulates them into a [`CaptureRequest`], composites any
//! delivered mattes, hands the bundle to an [`AssetStore`] and fires the completion
//! handler exactly once. [`CaptureCoordinator`] keeps one tracker per in-flight request.

pub mod coordinator;
pub mod events;
pub mod hooks;
pub mod persistence;
pub mod request;
pub mod tracker;

pub use coordinator::CaptureCoordinator;
pub use events::{CaptureEvent, LiveMovieInfo, PhotoPayload, ProcessingTimeRange, ResolvedCaptureParams};
pub use hooks::{CallbackHooks, CaptureHooks, CompletionHandler, LoggingCaptureHooks, NoOpCaptureHooks};
pub use persistence::{
    persist, AssetCreationRequest, AssetManifest, AssetStore, AuthorizationStatus, AuxiliaryResource,
    DirectoryAssetStore, PersistenceOutcome,
};
pub use request::{CaptureOutcome, CaptureRequest, CaptureSummary, CompositeSummary, RequestId};
pub use tracker::{CaptureSessionTracker, CaptureSessionTrackerBuilder, TrackerState};
