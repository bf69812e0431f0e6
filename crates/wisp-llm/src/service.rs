//! # Generation Service
//!
//! The engine only ever talks to a [`GenerationService`]: one prompt in, one
//! text out. Credentials problems disable the service until it is
//! reconfigured with a new key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wisp_core::TokenUsage;

/// Result type alias for generation calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur during generation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The key was rejected; generation is disabled until reconfigured.
    #[error("credentials rejected: {message}")]
    Credentials {
        /// Error description.
        message: String,
    },

    /// The service has no usable key or backend.
    #[error("service unavailable: {message}")]
    Unavailable {
        /// Error description.
        message: String,
    },

    /// The request failed in transit or the backend returned an error status.
    #[error("request failed: {message}")]
    Request {
        /// HTTP status, when the backend answered.
        status: Option<u16>,
        /// Error description.
        message: String,
    },

    /// The backend answered with a body that could not be decoded.
    #[error("malformed response: {message}")]
    Malformed {
        /// Error description.
        message: String,
    },
}

impl ServiceError {
    /// Whether this error leaves the service disabled.
    pub fn disables_generation(&self) -> bool {
        matches!(self, Self::Credentials { .. } | Self::Unavailable { .. })
    }

    /// Error category string for status reporting.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Credentials { .. } => "auth",
            Self::Unavailable { .. } => "unavailable",
            Self::Request { .. } => "network",
            Self::Malformed { .. } => "parse",
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Malformed {
                message: e.to_string(),
            };
        }
        Self::Request {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Sampling parameters for one call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Top-k cutoff.
    pub top_k: u32,
    /// Nucleus cutoff.
    pub top_p: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 30,
            top_p: 0.9,
        }
    }
}

/// Output of one generation call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Generation {
    /// Generated text; a `{Terminal: generation-failed-...}` sentinel when the
    /// backend produced no content.
    pub text: String,
    /// Token usage, when reported.
    pub usage: Option<TokenUsage>,
}

/// A text generation backend.
///
/// Implementors must be `Send + Sync` so the engine task can hold them
/// behind an `Arc`.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Whether a call can currently succeed (a validated key is configured).
    fn is_ready(&self) -> bool;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams)
    -> ServiceResult<Generation>;

    /// Replace the key and validate it. Returns the new readiness.
    async fn reconfigure(&self, api_key: &str) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabling_errors() {
        assert!(
            ServiceError::Credentials {
                message: "x".into()
            }
            .disables_generation()
        );
        assert!(
            ServiceError::Unavailable {
                message: "x".into()
            }
            .disables_generation()
        );
        assert!(
            !ServiceError::Request {
                status: Some(500),
                message: "x".into()
            }
            .disables_generation()
        );
        assert!(
            !ServiceError::Malformed {
                message: "x".into()
            }
            .disables_generation()
        );
    }

    #[test]
    fn categories() {
        let err = ServiceError::Request {
            status: None,
            message: "timeout".into(),
        };
        assert_eq!(err.category(), "network");
        assert_eq!(err.to_string(), "request failed: timeout");
    }

    #[test]
    fn default_params() {
        let p = GenerationParams::default();
        assert_eq!(p.top_k, 30);
        assert!((p.temperature - 0.7).abs() < f64::EPSILON);
    }
}
