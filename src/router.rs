//! Command routing
//!
//! Every recognized command goes to the language model; whatever comes back
//! (or a fixed fallback) is the text to speak.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::llm::{GenerationError, LanguageModel};
use crate::memory::{MemoryKind, MemoryStore};

/// Spoken when the language model produced nothing usable
pub const GENERATION_FALLBACK: &str = "I encountered an error while generating a response.";

/// Routes recognized commands to the language model
pub struct CommandRouter {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
    memory: Option<Arc<MemoryStore>>,
    persist: bool,
}

impl CommandRouter {
    /// Create a router; each generation is cut off after `timeout`
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            memory: None,
            persist: false,
        }
    }

    /// Record each exchange in `memory`
    ///
    /// Exchanges always go to short-term memory, and to the long-term log
    /// too when `persist` is set.
    #[must_use]
    pub fn with_memory(mut self, memory: Arc<MemoryStore>, persist: bool) -> Self {
        self.memory = Some(memory);
        self.persist = persist;
        self
    }

    /// Produce the response for `command`
    ///
    /// Makes a single attempt. Generation failures are logged and replaced by
    /// [`GENERATION_FALLBACK`]; nothing is propagated.
    pub async fn route(&self, command: &str) -> String {
        tracing::info!(command, "processing command");

        let outcome = match tokio::time::timeout(self.timeout, self.model.generate(command)).await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout),
        };

        let response = match outcome {
            Ok(text) => text,
            Err(GenerationError::Timeout) => {
                tracing::error!(timeout = ?self.timeout, "response generation timed out");
                GENERATION_FALLBACK.to_string()
            }
            Err(GenerationError::EmptyResponse) => {
                tracing::warn!("language model returned no text");
                GENERATION_FALLBACK.to_string()
            }
            Err(GenerationError::Backend(e)) => {
                tracing::error!(error = %e, "response generation error");
                GENERATION_FALLBACK.to_string()
            }
        };

        tracing::debug!(response_len = response.len(), "response ready");
        self.remember(command, &response);
        response
    }

    fn remember(&self, command: &str, response: &str) {
        let Some(memory) = &self.memory else {
            return;
        };

        let exchange = json!({ "command": command, "response": response });
        if self.persist {
            memory.add_memory(MemoryKind::LongTerm, exchange.clone());
        }
        memory.add_memory(MemoryKind::ShortTerm, exchange);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::memory::JsonFileStorage;

    struct Echo;

    #[async_trait]
    impl LanguageModel for Echo {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            Ok(format!("you said {prompt}"))
        }
    }

    struct Broken;

    #[async_trait]
    impl LanguageModel for Broken {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Backend("503 Service Unavailable".to_string()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl LanguageModel for Stalled {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_route_returns_model_text() {
        let router = CommandRouter::new(Arc::new(Echo), Duration::from_secs(5));
        let response = tokio_test::block_on(router.route("what time is it"));
        assert_eq!(response, "you said what time is it");
    }

    #[tokio::test]
    async fn test_route_falls_back_on_error() {
        let router = CommandRouter::new(Arc::new(Broken), Duration::from_secs(5));
        assert_eq!(router.route("hello").await, GENERATION_FALLBACK);
    }

    #[tokio::test]
    async fn test_route_falls_back_on_timeout() {
        let router = CommandRouter::new(Arc::new(Stalled), Duration::from_millis(20));
        assert_eq!(router.route("hello").await, GENERATION_FALLBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_waits_for_slow_model() {
        let router = CommandRouter::new(Arc::new(Stalled), Duration::from_secs(5));
        let mut route = tokio_test::task::spawn(router.route("hello"));

        tokio_test::assert_pending!(route.poll());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(tokio_test::assert_ready!(route.poll()), GENERATION_FALLBACK);
    }

    #[tokio::test]
    async fn test_route_records_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let memory = Arc::new(MemoryStore::open(JsonFileStorage::new(&path), 10).unwrap());

        let router = CommandRouter::new(Arc::new(Echo), Duration::from_secs(5))
            .with_memory(Arc::clone(&memory), true);
        router.route("open the pod bay doors").await;

        let expected = json!({
            "command": "open the pod bay doors",
            "response": "you said open the pod bay doors",
        });
        assert_eq!(memory.short_term()[0].content, expected);

        let reloaded = MemoryStore::load(&JsonFileStorage::new(&path)).unwrap();
        assert_eq!(reloaded.conversations.last().unwrap().content, expected);
    }

    #[tokio::test]
    async fn test_route_without_persist_skips_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let memory = Arc::new(MemoryStore::open(JsonFileStorage::new(&path), 10).unwrap());

        let router = CommandRouter::new(Arc::new(Broken), Duration::from_secs(5))
            .with_memory(Arc::clone(&memory), false);
        router.route("hello").await;

        assert_eq!(memory.short_term().len(), 1);
        assert!(!path.exists());
    }
}
