//! Daemon - the long-running assistant process
//!
//! Builds every collaborator up front (any failure is fatal), then runs the
//! assistant loop on the current thread until Ctrl-C.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::assistant::{AssistantLoop, LoopSettings};
use crate::llm::ChatCompletionModel;
use crate::memory::{JsonFileStorage, MemoryStore};
use crate::router::CommandRouter;
use crate::voice::{MicrophoneRecognizer, SpeakerSynthesizer};
use crate::{Config, Result};

/// The assistant daemon
pub struct Daemon {
    assistant: AssistantLoop,
    memory: Arc<MemoryStore>,
}

impl Daemon {
    /// Construct the memory store, language model and audio collaborators
    ///
    /// # Errors
    ///
    /// Returns error if the memory file is unreadable or corrupt, an API key
    /// is missing, or no audio device is usable
    pub fn new(config: &Config) -> Result<Self> {
        let storage = JsonFileStorage::new(&config.memory.path);
        let memory = Arc::new(MemoryStore::open(
            storage,
            config.memory.short_term_capacity,
        )?);

        tracing::debug!(path = %config.memory.path.display(), "memory file");

        let model = Arc::new(ChatCompletionModel::from_config(config)?);
        let router = CommandRouter::new(model, config.llm.timeout)
            .with_memory(Arc::clone(&memory), config.memory.persist_conversations);

        let recognizer = MicrophoneRecognizer::from_config(config)?;
        let synthesizer = SpeakerSynthesizer::from_config(config)?;

        let assistant = AssistantLoop::new(
            Box::new(recognizer),
            Box::new(synthesizer),
            router,
            LoopSettings::from_config(config),
        );

        Ok(Self { assistant, memory })
    }

    /// Run until interrupted
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self) {
        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            } else {
                // Dropping the sender closes the channel, which also stops the loop
                tracing::error!("failed to listen for ctrl-c");
            }
        });

        // Run on the current thread (cpal streams aren't Send)
        self.assistant.run(&mut shutdown_rx).await;

        tracing::info!(
            short_term = self.memory.short_term().len(),
            conversations = self.memory.long_term().conversations.len(),
            "assistant stopped"
        );
    }
}
