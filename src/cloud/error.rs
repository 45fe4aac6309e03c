// ABOUTME: Errors returned by control-plane operations.
// ABOUTME: Classifies which failures are worth resubmitting.

/// Errors from the control-plane client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloudError {
    #[error("not authenticated: authenticate before issuing requests")]
    NotAuthenticated,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{method} {path} returned HTTP {status}: {body}")]
    Http {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl CloudError {
    /// Whether resubmitting the same request may succeed.
    ///
    /// Connection-level failures, request timeouts, throttling, and server
    /// errors are transient. Client errors and malformed bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::Transport(_) => true,
            CloudError::Http { status, .. } => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CloudError::Decode {
                path: err
                    .url()
                    .map(|u| u.path().to_string())
                    .unwrap_or_default(),
                message: err.to_string(),
            }
        } else {
            CloudError::Transport(err.to_string())
        }
    }
}
