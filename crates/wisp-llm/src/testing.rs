//! Scripted [`GenerationService`] for tests of the engine and consolidator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use wisp_core::TokenUsage;

use crate::service::{
    Generation, GenerationParams, GenerationService, ServiceError, ServiceResult,
};

/// Replays queued replies in order and records every prompt it receives.
///
/// Once the queue is empty, every call returns an empty text.
pub struct ScriptedService {
    ready: AtomicBool,
    replies: Mutex<VecDeque<ServiceResult<Generation>>>,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedService {
    /// A ready service with no queued replies.
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A service that reports not ready.
    pub fn not_ready() -> Self {
        let service = Self::new();
        service.ready.store(false, Ordering::SeqCst);
        service
    }

    /// Queue a text reply with a small fixed usage.
    pub fn push_text(&self, text: impl Into<String>) {
        self.replies.lock().push_back(Ok(Generation {
            text: text.into(),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }));
    }

    /// Queue an error reply.
    pub fn push_error(&self, error: ServiceError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> ServiceResult<Generation> {
        self.prompts.lock().push(prompt.to_string());
        let reply = self.replies.lock().pop_front();
        let reply = reply.unwrap_or_else(|| Ok(Generation::default()));
        if matches!(&reply, Err(e) if e.disables_generation()) {
            self.ready.store(false, Ordering::SeqCst);
        }
        reply
    }

    async fn reconfigure(&self, api_key: &str) -> bool {
        let ready = !api_key.is_empty();
        self.ready.store(ready, Ordering::SeqCst);
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn replays_in_order_then_empty() {
        let service = ScriptedService::new();
        service.push_text("one");
        service.push_text("two");
        let params = GenerationParams::default();

        assert_eq!(service.generate("a", &params).await.unwrap().text, "one");
        assert_eq!(service.generate("b", &params).await.unwrap().text, "two");
        assert_eq!(service.generate("c", &params).await.unwrap().text, "");
        assert_eq!(service.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn credentials_error_disables() {
        let service = ScriptedService::new();
        service.push_error(ServiceError::Credentials {
            message: "bad".into(),
        });
        let result = service.generate("a", &GenerationParams::default()).await;
        assert_matches!(result, Err(ServiceError::Credentials { .. }));
        assert!(!service.is_ready());
        assert!(service.reconfigure("new").await);
        assert!(service.is_ready());
    }
}
