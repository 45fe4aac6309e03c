// ABOUTME: Error taxonomy for provisioning stages, using the SNAFU pattern.
// ABOUTME: Every error names the stage it happened in; kind() exposes the category.

use snafu::Snafu;
use std::fmt;

use super::stage::Stage;
use super::volumes::ShapeError;
use crate::cloud::CloudError;
use crate::poll::PollError;

/// A fatal provisioning failure. Aborts the remaining stages and triggers rollback.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProvisionError {
    /// A control-plane call failed, after any bounded resubmission.
    #[snafu(display("{stage}: request failed after {attempts} attempt(s): {source}"))]
    Submission {
        stage: Stage,
        attempts: u32,
        source: CloudError,
    },

    /// The backend reported an explicit failure state.
    #[snafu(display("{stage}: {resource} entered failure state '{status}'"))]
    TerminalFailure {
        stage: Stage,
        resource: String,
        status: String,
    },

    /// A poll bound ran out before a terminal state was reached.
    #[snafu(display("{stage}: {resource} not ready after {attempts} checks; last seen: {}",
        last_seen.as_deref().unwrap_or("nothing")))]
    TimeoutExceeded {
        stage: Stage,
        resource: String,
        attempts: u32,
        last_seen: Option<String>,
    },

    /// A response lacked fields or broke the volume contract.
    #[snafu(display("{stage}: unexpected response: {message}"))]
    DataShape { stage: Stage, message: String },

    /// The stage code itself failed (panic or broken internal invariant).
    #[snafu(display("{stage}: internal fault: {message}"))]
    Fault { stage: Stage, message: String },
}

/// Error category, for exit reporting and hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Submission,
    TerminalFailure,
    Timeout,
    DataShape,
    Fault,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Submission => "submission-error",
            ErrorKind::TerminalFailure => "terminal-failure",
            ErrorKind::Timeout => "timeout-exceeded",
            ErrorKind::DataShape => "data-shape-error",
            ErrorKind::Fault => "fault",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::Submission { .. } => ErrorKind::Submission,
            ProvisionError::TerminalFailure { .. } => ErrorKind::TerminalFailure,
            ProvisionError::TimeoutExceeded { .. } => ErrorKind::Timeout,
            ProvisionError::DataShape { .. } => ErrorKind::DataShape,
            ProvisionError::Fault { .. } => ErrorKind::Fault,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ProvisionError::Submission { stage, .. }
            | ProvisionError::TerminalFailure { stage, .. }
            | ProvisionError::TimeoutExceeded { stage, .. }
            | ProvisionError::DataShape { stage, .. }
            | ProvisionError::Fault { stage, .. } => *stage,
        }
    }

    pub(crate) fn from_poll(stage: Stage, err: PollError) -> Self {
        match err {
            PollError::TerminalFailure { what, status } => ProvisionError::TerminalFailure {
                stage,
                resource: what,
                status,
            },
            PollError::TimeoutExceeded {
                what,
                attempts,
                last_seen,
                ..
            } => ProvisionError::TimeoutExceeded {
                stage,
                resource: what,
                attempts,
                last_seen,
            },
        }
    }

    pub(crate) fn from_shape(stage: Stage, err: ShapeError) -> Self {
        ProvisionError::DataShape {
            stage,
            message: err.to_string(),
        }
    }
}
