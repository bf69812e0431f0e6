//! Gemini implementation of [`GenerationService`].
//!
//! Uses the API-key endpoint (`generativelanguage.googleapis.com`). A key is
//! only stored after a `countTokens` probe accepts it; a credentials failure
//! during generation clears it again, disabling the service until
//! [`GenerationService::reconfigure`] is called with a new key.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use tracing::{debug, error, info, instrument, warn};

use crate::service::{
    Generation, GenerationParams, GenerationService, ServiceError, ServiceResult,
};

use super::types::{
    CountTokensRequest, DEFAULT_BASE_URL, DEFAULT_MAX_OUTPUT_TOKENS, Content, ErrorEnvelope,
    GenerateRequest, GenerateResponse, GenerationConfig, STOP_SEQUENCES,
    permissive_safety_settings,
};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Prefix shared by every failure sentinel.
const FAILURE_SENTINEL_PREFIX: &str = "{Terminal: generation-failed";

/// Sentinel returned when the backend produced no text.
pub const EMPTY_RESPONSE_SENTINEL: &str = "{Terminal: generation-failed-empty-response}";

/// Sentinel for a prompt refused by the backend's filters.
pub fn blocked_sentinel(reason: &str) -> String {
    format!("{{Terminal: generation-failed-prompt-blocked[Reason: {reason}]}}")
}

/// Whether `text` is empty or one of the failure sentinels.
///
/// Such text arrives as `Ok` but carries no model output.
pub fn is_failure_sentinel(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text.starts_with(FAILURE_SENTINEL_PREFIX)
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API base URL (overridable for tests).
    pub base_url: String,
    /// Model name, e.g. `gemini-1.5-flash-latest`.
    pub model: String,
    /// Output token cap.
    pub max_output_tokens: u32,
}

impl GeminiConfig {
    /// Default endpoint for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    /// Override the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{method}",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini generation client.
pub struct GeminiService {
    config: GeminiConfig,
    client: reqwest::Client,
    /// Validated key; `None` while disabled.
    api_key: RwLock<Option<String>>,
}

impl GeminiService {
    /// Create a disabled client. Call [`GenerationService::reconfigure`] to
    /// validate a key.
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_key: RwLock::new(None),
        }
    }

    /// Create a client and validate `api_key` right away.
    pub async fn connect(config: GeminiConfig, api_key: &str) -> Self {
        let service = Self::new(config);
        let _ = service.reconfigure(api_key).await;
        service
    }

    /// Model in use.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn disable(&self) {
        *self.api_key.write() = None;
    }

    async fn probe_key(&self, api_key: &str) -> ServiceResult<()> {
        let body = CountTokensRequest {
            contents: vec![Content::user_text("test")],
        };
        let response = self
            .client
            .post(self.config.endpoint("countTokens"))
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_status(status, &text))
    }
}

/// Map an error status and body to a [`ServiceError`].
fn classify_status(status: StatusCode, body: &str) -> ServiceError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let api_error = envelope.error.unwrap_or_default();
    let message = if api_error.message.is_empty() {
        body.to_string()
    } else {
        api_error.message
    };

    let key_rejected = status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || api_error.status == "PERMISSION_DENIED"
        || (status == StatusCode::BAD_REQUEST && message.to_lowercase().contains("api key"));

    if key_rejected {
        ServiceError::Credentials { message }
    } else {
        ServiceError::Request {
            status: Some(status.as_u16()),
            message,
        }
    }
}

#[async_trait]
impl GenerationService for GeminiService {
    fn is_ready(&self) -> bool {
        self.api_key.read().is_some()
    }

    #[instrument(skip_all, fields(model = %self.config.model, prompt_chars = prompt.len()))]
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> ServiceResult<Generation> {
        let current_key = self.api_key.read().clone();
        let Some(api_key) = current_key else {
            error!("generate called without a valid API key");
            return Err(ServiceError::Unavailable {
                message: "no valid API key configured".into(),
            });
        };

        let body = GenerateRequest {
            contents: vec![Content::user_text(prompt)],
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
                stop_sequences: STOP_SEQUENCES.iter().map(ToString::to_string).collect(),
            },
            safety_settings: permissive_safety_settings(),
        };

        debug!("sending generateContent request");
        let response = self
            .client
            .post(self.config.endpoint("generateContent"))
            .header(API_KEY_HEADER, &api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = classify_status(status, &text);
            if err.disables_generation() {
                error!(status = status.as_u16(), "API key rejected during generation, disabling");
                self.disable();
            } else {
                warn!(status = status.as_u16(), error = %err, "generation request failed");
            }
            return Err(err);
        }

        let raw = response.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&raw).map_err(|e| ServiceError::Malformed {
                message: e.to_string(),
            })?;

        let usage = parsed.usage_metadata.map(Into::into);
        let mut text = parsed.first_text();
        if text.is_empty() {
            if let Some(reason) = parsed.block_reason() {
                warn!(reason, "prompt blocked by the backend");
                text = blocked_sentinel(reason);
            } else {
                warn!("backend returned an empty response");
                text = EMPTY_RESPONSE_SENTINEL.to_string();
            }
        }

        Ok(Generation { text, usage })
    }

    async fn reconfigure(&self, api_key: &str) -> bool {
        if api_key.trim().is_empty() {
            warn!("API key is empty, generation disabled");
            self.disable();
            return false;
        }

        match self.probe_key(api_key).await {
            Ok(()) => {
                *self.api_key.write() = Some(api_key.to_string());
                info!(model = %self.config.model, "API key validated");
                true
            }
            Err(e) => {
                match &e {
                    ServiceError::Credentials { .. } => warn!(error = %e, "API key rejected"),
                    _ => error!(error = %e, "API key validation failed"),
                }
                self.disable();
                false
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
