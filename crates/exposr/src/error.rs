use std::path::PathBuf;

use thiserror::Error;

/// Failures of the login intent. The session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Please enter both email and password")]
    EmptyCredential,
}

/// Failures of a single still capture. None of these mutate the capture buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Camera permission was not granted")]
    PermissionDenied,
    #[error("Camera is not ready")]
    CameraUnready,
    #[error("Failed to capture photo: {0}")]
    CaptureFailed(String),
}

/// Failures of one analysis attempt. Stored on the attempt, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Photo captured but base64 data is missing")]
    MissingData,
    #[error("OpenAI API key not configured. Set EXPOSR_OPENAI_API_KEY or [api] key in config.toml")]
    MissingCredential,
    #[error("No analysis received from API")]
    EmptyResponse,
    #[error("{0}")]
    RequestFailed(String),
    /// Raised by the presenter, never by the client: the buffer was empty on entry.
    #[error("No photo data found")]
    NoPhoto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// The router has no current screen yet (startup) or nothing to go back to.
    #[error("navigation state is not resolvable yet")]
    Unresolved,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config.toml: {0}")]
    Parse(#[from] toml::de::Error),
}
