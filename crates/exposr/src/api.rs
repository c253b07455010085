use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::capture::CapturedImage;
use crate::config::ApiConfig;
use crate::error::AnalysisError;

// --- OpenAI-compatible request/response structs ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<OaiMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OaiMessage {
    pub role: &'static str,
    pub content: Vec<OaiContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OaiContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatCompletionRequest {
    /// The image part's data URI, if the request carries one.
    pub fn image_data_uri(&self) -> Option<&str> {
        self.messages
            .iter()
            .flat_map(|m| &m.content)
            .find_map(|part| match part {
                OaiContentPart::ImageUrl { image_url } => Some(image_url.url.as_str()),
                OaiContentPart::Text { .. } => None,
            })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice. No choices, a missing message, a null
    /// content or an empty string all count as no analysis.
    pub fn into_text(self) -> Result<String, AnalysisError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.is_empty())
            .ok_or(AnalysisError::EmptyResponse)
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Sends one completion request. Errors come back already mapped to
/// [`AnalysisError::RequestFailed`].
#[async_trait]
pub trait VisionTransport: Send + Sync {
    async fn complete(
        &self,
        credential: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AnalysisError>;
}

/// reqwest-backed transport for an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(api: &ApiConfig) -> Self {
        Self::new(api.endpoint.clone(), api.timeout())
    }

    /// Use a preconfigured client (proxy, TLS roots, timeout) as is.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

fn request_failed(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::RequestFailed("timeout".into())
    } else {
        AnalysisError::RequestFailed(e.to_string())
    }
}

#[async_trait]
impl VisionTransport for HttpTransport {
    async fn complete(
        &self,
        credential: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AnalysisError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(request)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(parsed) => format!("{} {}", status.as_u16(), parsed.error.message),
                Err(_) if body.trim().is_empty() => {
                    format!("{} status code (no body)", status.as_u16())
                }
                Err(_) => format!("{} {}", status.as_u16(), body.trim()),
            };
            return Err(AnalysisError::RequestFailed(message));
        }

        response.json().await.map_err(request_failed)
    }
}

/// Turns a captured photo into a free-text nutrition summary.
#[derive(Clone)]
pub struct AnalysisClient {
    api: ApiConfig,
    transport: Arc<dyn VisionTransport>,
}

impl AnalysisClient {
    pub fn new(api: ApiConfig, transport: Arc<dyn VisionTransport>) -> Self {
        Self { api, transport }
    }

    /// Client talking to the configured endpoint over HTTP.
    pub fn from_config(api: ApiConfig) -> Self {
        let transport = Arc::new(HttpTransport::from_config(&api));
        Self::new(api, transport)
    }

    pub fn build_request(&self, image: &CapturedImage) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.api.model.clone(),
            messages: vec![OaiMessage {
                role: "user",
                content: vec![
                    OaiContentPart::Text {
                        text: self.api.prompt.clone(),
                    },
                    OaiContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_uri(),
                        },
                    },
                ],
            }],
            max_tokens: self.api.max_tokens,
        }
    }

    /// One request, no automatic retry. Input and credential problems are
    /// reported before anything goes on the wire.
    pub async fn analyze(&self, image: &CapturedImage) -> Result<String, AnalysisError> {
        if !image.has_encoded_data() {
            return Err(AnalysisError::MissingData);
        }
        if !self.api.has_credential() {
            warn!("Analysis skipped: no API key configured");
            return Err(AnalysisError::MissingCredential);
        }

        let request = self.build_request(image);
        info!(
            "Analyzing {} with {} ({} base64 bytes)",
            image.uri,
            request.model,
            image.encoded_data.len()
        );

        let text = self
            .transport
            .complete(self.api.key.trim(), &request)
            .await
            .and_then(ChatCompletionResponse::into_text);

        match &text {
            Ok(text) => info!("Analysis received ({} chars)", text.len()),
            Err(e) => warn!("Analysis failed: {e}"),
        }
        text
    }
}
