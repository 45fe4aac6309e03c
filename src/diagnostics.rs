// ABOUTME: Diagnostics accumulator for non-fatal warnings during rollback and hooks.
// ABOUTME: Collects problems that must not abort cleanup but must reach the operator.

use serde::Serialize;

/// Collects non-fatal warnings.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Looking up the secondary instance failed.
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Lookup, message)
    }

    pub fn detach(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Detach, message)
    }

    pub fn detach_timeout(message: impl Into<String>) -> Self {
        Self::new(WarningKind::DetachTimeout, message)
    }

    pub fn delete(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Delete, message)
    }

    pub fn delete_verification(message: impl Into<String>) -> Self {
        Self::new(WarningKind::DeleteVerification, message)
    }

    pub fn instance_delete(message: impl Into<String>) -> Self {
        Self::new(WarningKind::InstanceDelete, message)
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Hook, message)
    }
}

/// Categories of non-fatal warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// Could not resolve or inspect the secondary instance.
    Lookup,
    /// The detach request was rejected.
    Detach,
    /// Volumes were still attached when the detach bound ran out.
    DetachTimeout,
    /// The bulk volume delete was rejected.
    Delete,
    /// A volume could not be confirmed as gone after deletion.
    DeleteVerification,
    InstanceDelete,
    /// A lifecycle hook failed.
    Hook,
}
