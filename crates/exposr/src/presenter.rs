//! Loading / error / success states for the analysis of the buffered photo.
//!
//! ```text
//! Idle ──enter──▶ Loading ──▶ Succeeded
//!   │                │
//!   │ (no data)      └──────▶ Failed ──retry──▶ Loading
//!   └───────────────────────▶ Failed
//! ```
//!
//! Every attempt is tied to the capture buffer generation it started from.
//! A result that comes back after the buffer moved on (new capture, retake)
//! is dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::api::AnalysisClient;
use crate::capture::{CaptureBuffer, CapturedImage};
use crate::error::AnalysisError;
use crate::history::MealHistory;
use crate::logging::AnalysisLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// View model of one analysis attempt. `result_text` is set only when
/// succeeded, `error` only when failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisAttempt {
    status: AnalysisStatus,
    result_text: Option<String>,
    error: Option<AnalysisError>,
    image_generation: u64,
}

impl AnalysisAttempt {
    fn idle(image_generation: u64) -> Self {
        Self {
            status: AnalysisStatus::Idle,
            result_text: None,
            error: None,
            image_generation,
        }
    }

    fn loading(image_generation: u64) -> Self {
        Self {
            status: AnalysisStatus::Loading,
            ..Self::idle(image_generation)
        }
    }

    fn succeeded(image_generation: u64, text: String) -> Self {
        Self {
            status: AnalysisStatus::Succeeded,
            result_text: Some(text),
            ..Self::idle(image_generation)
        }
    }

    fn failed(image_generation: u64, error: AnalysisError) -> Self {
        Self {
            status: AnalysisStatus::Failed,
            error: Some(error),
            ..Self::idle(image_generation)
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn result_text(&self) -> Option<&str> {
        self.result_text.as_deref()
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn image_generation(&self) -> u64 {
        self.image_generation
    }

    pub fn is_loading(&self) -> bool {
        self.status == AnalysisStatus::Loading
    }
}

pub struct ResultPresenter {
    buffer: Arc<CaptureBuffer>,
    client: AnalysisClient,
    history: Arc<MealHistory>,
    log: AnalysisLog,
    attempt: Mutex<AnalysisAttempt>,
}

impl ResultPresenter {
    pub fn new(
        buffer: Arc<CaptureBuffer>,
        client: AnalysisClient,
        history: Arc<MealHistory>,
        log: AnalysisLog,
    ) -> Self {
        let generation = buffer.generation();
        Self {
            buffer,
            client,
            history,
            log,
            attempt: Mutex::new(AnalysisAttempt::idle(generation)),
        }
    }

    /// Current attempt for the buffered photo. An attempt left over from an
    /// earlier photo reads as idle.
    pub fn attempt(&self) -> AnalysisAttempt {
        let generation = self.buffer.generation();
        let attempt = self.attempt.lock();
        if attempt.image_generation == generation {
            attempt.clone()
        } else {
            AnalysisAttempt::idle(generation)
        }
    }

    /// Result screen entry: analyze the buffered photo.
    ///
    /// Without a photo, or with one lacking base64 data, the attempt fails
    /// straight away and nothing is sent. Entering again for the same photo
    /// while loading, or after it settled, changes nothing.
    pub async fn enter(&self) -> AnalysisAttempt {
        let (photo, generation) = self.buffer.snapshot();
        let image = {
            let mut attempt = self.attempt.lock();
            if attempt.image_generation == generation && attempt.status != AnalysisStatus::Idle {
                return attempt.clone();
            }
            match photo {
                None => {
                    *attempt = AnalysisAttempt::failed(generation, AnalysisError::NoPhoto);
                    return attempt.clone();
                }
                Some(image) if !image.has_encoded_data() => {
                    *attempt = AnalysisAttempt::failed(generation, AnalysisError::MissingData);
                    return attempt.clone();
                }
                Some(image) => {
                    *attempt = AnalysisAttempt::loading(generation);
                    image
                }
            }
        };
        self.run(image, generation).await
    }

    /// Retry is offered only after a failure and only while the same photo,
    /// with its base64 data, is still buffered.
    pub fn can_retry(&self) -> bool {
        let (photo, generation) = self.buffer.snapshot();
        let attempt = self.attempt.lock();
        attempt.status == AnalysisStatus::Failed
            && attempt.image_generation == generation
            && photo.is_some_and(|p| p.has_encoded_data())
    }

    /// Re-issue the identical request after a failure. Returns `None` when
    /// retry is not available.
    pub async fn retry(&self) -> Option<AnalysisAttempt> {
        let (photo, generation) = self.buffer.snapshot();
        let image = {
            let mut attempt = self.attempt.lock();
            if attempt.status != AnalysisStatus::Failed || attempt.image_generation != generation {
                return None;
            }
            let image = photo.filter(CapturedImage::has_encoded_data)?;
            *attempt = AnalysisAttempt::loading(generation);
            image
        };
        info!("Retrying analysis of {}", image.uri);
        Some(self.run(image, generation).await)
    }

    /// Drop the attempt and the photo. Any request still in flight will be
    /// discarded when it returns.
    pub fn retake(&self) {
        let generation = self.buffer.clear();
        *self.attempt.lock() = AnalysisAttempt::idle(generation);
        debug!("Retake: photo and analysis discarded");
    }

    async fn run(&self, image: CapturedImage, generation: u64) -> AnalysisAttempt {
        let result = self.client.analyze(&image).await;

        let settled = {
            let mut attempt = self.attempt.lock();
            let current = attempt.image_generation == generation
                && attempt.is_loading()
                && self.buffer.generation() == generation;
            if current {
                *attempt = match result {
                    Ok(text) => AnalysisAttempt::succeeded(generation, text),
                    Err(error) => AnalysisAttempt::failed(generation, error),
                };
                Some(attempt.clone())
            } else {
                None
            }
        };
        let Some(settled) = settled else {
            debug!("Discarding stale analysis result for photo generation {generation}");
            return self.attempt();
        };

        if let Some(text) = settled.result_text() {
            self.history.record(&image.uri, text);
            self.log.log_analysis(&image.uri, text);
        }
        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn presenter(buffer: Arc<CaptureBuffer>) -> ResultPresenter {
        ResultPresenter::new(
            buffer,
            AnalysisClient::from_config(ApiConfig::default()),
            Arc::new(MealHistory::new()),
            AnalysisLog::disabled(),
        )
    }

    #[test]
    fn starts_idle_without_retry() {
        let presenter = presenter(Arc::new(CaptureBuffer::new()));
        let attempt = presenter.attempt();
        assert_eq!(attempt.status(), AnalysisStatus::Idle);
        assert!(attempt.result_text().is_none());
        assert!(attempt.error().is_none());
        assert!(!presenter.can_retry());
    }

    #[tokio::test]
    async fn empty_buffer_fails_without_loading() {
        let presenter = presenter(Arc::new(CaptureBuffer::new()));
        let attempt = presenter.enter().await;
        assert_eq!(attempt.status(), AnalysisStatus::Failed);
        assert_eq!(attempt.error_message().as_deref(), Some("No photo data found"));
        assert!(!presenter.can_retry());
        assert_eq!(presenter.retry().await, None);
    }

    #[tokio::test]
    async fn photo_without_data_fails_and_withholds_retry() {
        let buffer = Arc::new(CaptureBuffer::new());
        buffer.store(CapturedImage {
            uri: "file:///meal.jpg".into(),
            encoded_data: String::new(),
            width: None,
            height: None,
        });
        let presenter = presenter(Arc::clone(&buffer));
        let attempt = presenter.enter().await;
        assert_eq!(attempt.error(), Some(&AnalysisError::MissingData));
        assert!(!presenter.can_retry());
    }

    #[tokio::test]
    async fn stale_attempt_reads_as_idle_after_new_capture() {
        let buffer = Arc::new(CaptureBuffer::new());
        let presenter = presenter(Arc::clone(&buffer));
        presenter.enter().await;
        buffer.store(CapturedImage {
            uri: "file:///next.jpg".into(),
            encoded_data: "QUJD".into(),
            width: None,
            height: None,
        });
        assert_eq!(presenter.attempt().status(), AnalysisStatus::Idle);
    }
}
