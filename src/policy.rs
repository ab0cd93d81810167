//! Fixed error policy for the capture pipeline
//!
//! Every failure the tracker observes is classified into a [`FailureKind`] and looked up
//! in a static table. The table answers two questions: what happens to the work in
//! progress ([`PolicyAction`]) and how loudly it is logged ([`Severity`]). No entry
//! escalates; completion always fires.

use crate::error::{CaptureError, FailureKind};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// What the tracker does after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyAction {
    /// Record the failure and carry on unchanged
    Log,
    /// Drop the contribution of the failing stage (one matte, one movie, persistence)
    Skip,
    /// Store a lesser result in place of the failed one
    Degrade,
}

/// Log level used when a policy entry fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warn,
    Error,
}

/// One row of the policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEntry {
    pub kind: FailureKind,
    pub action: PolicyAction,
    pub severity: Severity,
}

const fn entry(kind: FailureKind, action: PolicyAction, severity: Severity) -> PolicyEntry {
    PolicyEntry {
        kind,
        action,
        severity,
    }
}

/// Static error policy table
pub struct ErrorPolicy;

impl ErrorPolicy {
    /// The complete table, one row per failure kind
    pub const TABLE: [PolicyEntry; 8] = [
        entry(FailureKind::HardwareCapture, PolicyAction::Skip, Severity::Error),
        entry(FailureKind::MissingData, PolicyAction::Skip, Severity::Warn),
        entry(FailureKind::Compositing, PolicyAction::Skip, Severity::Warn),
        entry(FailureKind::BlendFallback, PolicyAction::Degrade, Severity::Warn),
        entry(FailureKind::Persistence, PolicyAction::Log, Severity::Error),
        entry(FailureKind::Cleanup, PolicyAction::Log, Severity::Warn),
        entry(FailureKind::ProtocolViolation, PolicyAction::Log, Severity::Warn),
        entry(FailureKind::Configuration, PolicyAction::Log, Severity::Error),
    ];

    /// Look up the table row for a failure kind
    #[must_use]
    pub fn entry_for(kind: FailureKind) -> PolicyEntry {
        Self::TABLE
            .iter()
            .copied()
            .find(|row| row.kind == kind)
            .unwrap_or(entry(kind, PolicyAction::Log, Severity::Error))
    }

    /// Action prescribed for a failure kind
    #[must_use]
    pub fn action_for(kind: FailureKind) -> PolicyAction {
        Self::entry_for(kind).action
    }

    /// Classify, log and resolve an error
    ///
    /// `context` names the lifecycle stage the error arrived in and is attached to the
    /// emitted event.
    pub fn apply(error: &CaptureError, context: &str) -> PolicyAction {
        let row = Self::entry_for(error.failure_kind());
        match row.severity {
            Severity::Warn => warn!(
                kind = %row.kind,
                action = ?row.action,
                context = %context,
                error = %error,
                "Capture stage failed"
            ),
            Severity::Error => error!(
                kind = %row.kind,
                action = ?row.action,
                context = %context,
                error = %error,
                "Capture stage failed"
            ),
        }
        row.action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_exactly_one_row() {
        let kinds = [
            FailureKind::HardwareCapture,
            FailureKind::MissingData,
            FailureKind::Compositing,
            FailureKind::BlendFallback,
            FailureKind::Persistence,
            FailureKind::Cleanup,
            FailureKind::ProtocolViolation,
            FailureKind::Configuration,
        ];
        for kind in kinds {
            let rows = ErrorPolicy::TABLE.iter().filter(|r| r.kind == kind).count();
            assert_eq!(rows, 1, "kind {kind} must appear once");
        }
    }

    #[test]
    fn test_policy_actions() {
        assert_eq!(
            ErrorPolicy::action_for(FailureKind::HardwareCapture),
            PolicyAction::Skip
        );
        assert_eq!(
            ErrorPolicy::action_for(FailureKind::Compositing),
            PolicyAction::Skip
        );
        assert_eq!(
            ErrorPolicy::action_for(FailureKind::BlendFallback),
            PolicyAction::Degrade
        );
        assert_eq!(
            ErrorPolicy::action_for(FailureKind::Persistence),
            PolicyAction::Log
        );
        assert_eq!(
            ErrorPolicy::action_for(FailureKind::Cleanup),
            PolicyAction::Log
        );
    }

    #[test]
    fn test_apply_returns_table_action() {
        let err = CaptureError::unsupported_matte("Unknown(\"clouds\")");
        assert_eq!(ErrorPolicy::apply(&err, "photo_processed"), PolicyAction::Skip);

        let err = CaptureError::NotAuthorized;
        assert_eq!(ErrorPolicy::apply(&err, "capture_finished"), PolicyAction::Log);
    }
}
