use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::api::{AnalysisClient, HttpTransport, VisionTransport};
use crate::capture::{
    Camera, CameraLease, CaptureBuffer, CaptureController, CapturedImage, Permission, StillOptions,
};
use crate::config::Config;
use crate::error::{CaptureError, NavigationError, SessionError};
use crate::history::{HistoryEntry, MealHistory};
use crate::logging::AnalysisLog;
use crate::navigation::{enforce_guard, Navigator, Screen, StackNavigator};
use crate::presenter::{AnalysisAttempt, ResultPresenter};
use crate::session::Session;

/// Application context handed to every screen.
///
/// Owns the session, the capture buffer and the flow objects built on top of
/// them, and turns user intents into state changes. The navigation guard runs
/// after every session or route change.
pub struct AppShell {
    session: Mutex<Session>,
    navigator: Mutex<Box<dyn Navigator>>,
    buffer: Arc<CaptureBuffer>,
    capture: CaptureController,
    presenter: ResultPresenter,
    history: Arc<MealHistory>,
}

impl AppShell {
    pub fn new(
        config: &Config,
        navigator: Box<dyn Navigator>,
        transport: Arc<dyn VisionTransport>,
        log: AnalysisLog,
    ) -> Self {
        let buffer = Arc::new(CaptureBuffer::new());
        let history = Arc::new(MealHistory::new());
        let capture = CaptureController::new(
            Arc::clone(&buffer),
            StillOptions {
                encode_base64: config.capture.encode_base64,
            },
        );
        let presenter = ResultPresenter::new(
            Arc::clone(&buffer),
            AnalysisClient::new(config.api.clone(), transport),
            Arc::clone(&history),
            log,
        );
        Self {
            session: Mutex::new(Session::new()),
            navigator: Mutex::new(navigator),
            buffer,
            capture,
            presenter,
            history,
        }
    }

    /// Shell on the in-memory router, talking HTTP to the configured endpoint.
    /// The router mounts the index (camera) route first, like a cold start.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Box::new(StackNavigator::starting_at(Screen::Camera)),
            Arc::new(HttpTransport::from_config(&config.api)),
            AnalysisLog::open(&config.logging),
        )
    }

    fn guard(&self) -> Option<Screen> {
        let authenticated = self.session.lock().is_authenticated();
        let mut navigator = self.navigator.lock();
        enforce_guard(&mut **navigator, authenticated)
    }

    /// Run the guard once the router is mounted.
    pub fn start(&self) -> Option<Screen> {
        self.guard()
    }

    /// Push `screen`, then let the guard correct it. Returns where the user ended up.
    pub fn navigate(&self, screen: Screen) -> Option<Screen> {
        self.navigator.lock().push(screen);
        self.guard();
        self.current_screen()
    }

    pub fn back(&self) -> Result<(), NavigationError> {
        self.navigator.lock().back()?;
        self.guard();
        Ok(())
    }

    pub fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        self.session.lock().login(email, password)?;
        self.guard();
        Ok(())
    }

    pub fn demo_login(&self) -> Result<(), SessionError> {
        self.session.lock().demo_login()?;
        self.guard();
        Ok(())
    }

    /// Sign out and forget everything tied to the user: photo, analysis, history.
    pub fn logout(&self) {
        self.session.lock().logout();
        self.presenter.retake();
        self.history.clear();
        self.guard();
    }

    /// Hand the camera to the capture controller while the camera screen is up.
    pub fn attach_camera(&self, camera: Arc<dyn Camera>) -> CameraLease {
        self.capture.attach(camera)
    }

    pub async fn ensure_camera_permission(&self) -> Result<Permission, CaptureError> {
        self.capture.ensure_permission().await
    }

    /// Shutter press: take a photo, move to the result screen and analyze it.
    ///
    /// `Ok(None)` means a capture was already in flight and this press was ignored.
    pub async fn capture(&self) -> Result<Option<AnalysisAttempt>, CaptureError> {
        let Some(image) = self.capture.capture().await? else {
            return Ok(None);
        };
        debug!("Opening result for {}", image.uri);
        self.navigate(Screen::Result);
        Ok(Some(self.presenter.enter().await))
    }

    /// Result screen entry without a fresh capture (e.g. deep link).
    pub async fn show_result(&self) -> AnalysisAttempt {
        self.navigate(Screen::Result);
        self.presenter.enter().await
    }

    pub async fn retry(&self) -> Option<AnalysisAttempt> {
        self.presenter.retry().await
    }

    /// Discard photo and analysis and go back to the camera.
    pub fn retake(&self) {
        self.presenter.retake();
        if self.back().is_err() {
            info!("Nothing to go back to, opening camera");
            self.navigator.lock().replace(Screen::Camera);
            self.guard();
        }
    }

    pub fn session(&self) -> Session {
        self.session.lock().clone()
    }

    pub fn current_screen(&self) -> Option<Screen> {
        self.navigator.lock().current_screen()
    }

    pub fn photo(&self) -> Option<CapturedImage> {
        self.buffer.current()
    }

    pub fn attempt(&self) -> AnalysisAttempt {
        self.presenter.attempt()
    }

    pub fn can_retry(&self) -> bool {
        self.presenter.can_retry()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_capturing()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.entries()
    }
}
