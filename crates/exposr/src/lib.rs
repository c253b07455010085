//! Core of the Exposr meal analyzer: who is signed in, which screen they may
//! see, the photo they just took, and the vision-model analysis of it.
//!
//! Screens, theming and static copy live in the host shell. They read the
//! view models exposed by [`AppShell`] and send user intents back to it.

pub mod api;
pub mod capture;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod navigation;
pub mod presenter;
pub mod session;
pub mod shell;

use std::path::Path;

use tracing::info;

pub use api::{AnalysisClient, HttpTransport, VisionTransport};
pub use capture::{Camera, CaptureBuffer, CaptureController, CapturedImage, StillFileCamera};
pub use config::Config;
pub use error::{AnalysisError, CaptureError, ConfigError, NavigationError, SessionError};
pub use navigation::{guard_redirect, Navigator, Screen, StackNavigator};
pub use presenter::{AnalysisAttempt, AnalysisStatus, ResultPresenter};
pub use session::Session;
pub use shell::AppShell;

/// Load `config.toml`, apply the environment credential, start file logging
/// if enabled, and build the shell with the guard already applied.
pub fn init(config_path: &Path) -> Result<AppShell, ConfigError> {
    let config = Config::load(config_path)?.with_env_credential();

    if config.logging.enabled {
        logging::init_tracing(&logging::log_directory(&config.logging), &config.logging.level);
    }
    info!(
        "Exposr starting (model {}, credential configured: {})",
        config.api.model,
        config.api.has_credential()
    );

    let shell = AppShell::from_config(&config);
    shell.start();
    Ok(shell)
}
