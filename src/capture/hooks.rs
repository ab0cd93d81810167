//! Caller hooks fired by the capture tracker
//!
//! Hooks are injected at construction so the tracker never calls into UI code directly.

use super::request::CaptureRequest;
use tracing::info;

/// Completion callback, invoked exactly once per request
pub type CompletionHandler = Box<dyn FnOnce(&CaptureRequest) + Send>;

/// UI-facing notifications emitted while a capture progresses
pub trait CaptureHooks: Send + Sync {
    /// A companion motion clip is (or stopped) being recorded
    fn live_capture_active(&self, active: bool);

    /// The hardware is about to flash / capture
    fn will_capture(&self);

    /// Show or hide the "processing is slow" indicator
    fn processing_indicator(&self, visible: bool);
}

/// Hooks that discard every notification
pub struct NoOpCaptureHooks;

impl CaptureHooks for NoOpCaptureHooks {
    fn live_capture_active(&self, _active: bool) {}

    fn will_capture(&self) {}

    fn processing_indicator(&self, _visible: bool) {}
}

/// Hooks that report notifications through tracing
pub struct LoggingCaptureHooks;

impl CaptureHooks for LoggingCaptureHooks {
    fn live_capture_active(&self, active: bool) {
        info!(active, "📹 Live capture active");
    }

    fn will_capture(&self) {
        info!("📸 Capturing");
    }

    fn processing_indicator(&self, visible: bool) {
        info!(visible, "⏳ Processing indicator");
    }
}

type BoolHook = Box<dyn Fn(bool) + Send + Sync>;
type UnitHook = Box<dyn Fn() + Send + Sync>;

/// Hooks assembled from closures; unset hooks do nothing
#[derive(Default)]
pub struct CallbackHooks {
    live_capture_active: Option<BoolHook>,
    will_capture: Option<UnitHook>,
    processing_indicator: Option<BoolHook>,
}

impl CallbackHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_live_capture_active<F>(mut self, hook: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.live_capture_active = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_will_capture<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.will_capture = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_processing_indicator<F>(mut self, hook: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.processing_indicator = Some(Box::new(hook));
        self
    }
}

impl CaptureHooks for CallbackHooks {
    fn live_capture_active(&self, active: bool) {
        if let Some(hook) = &self.live_capture_active {
            hook(active);
        }
    }

    fn will_capture(&self) {
        if let Some(hook) = &self.will_capture {
            hook();
        }
    }

    fn processing_indicator(&self, visible: bool) {
        if let Some(hook) = &self.processing_indicator {
            hook(visible);
        }
    }
}
