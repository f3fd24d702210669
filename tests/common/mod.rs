//! Shared test utilities
//!
//! Scripted stand-ins for the speech and language model collaborators, so
//! the assistant loop runs without audio hardware or network access.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use jarvis::{
    AssistantLoop, CommandRouter, GenerationError, LanguageModel, LoopSettings, RecognitionError,
    SpeechRecognizer, SpeechSynthesizer, SynthesisError,
};

/// Recognizer that replays a fixed script
///
/// Once the script runs out it requests shutdown (if given a sender) and
/// then never returns, like a microphone nobody talks into.
pub struct ScriptedRecognizer {
    script: VecDeque<(Duration, Result<String, RecognitionError>)>,
    calls: Arc<AtomicUsize>,
    shutdown: Option<mpsc::Sender<()>>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<Result<String, RecognitionError>>) -> Self {
        Self {
            script: script.into_iter().map(|r| (Duration::ZERO, r)).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
            shutdown: None,
        }
    }

    /// Append a reply that arrives only after `delay`
    #[must_use]
    pub fn then_after(mut self, delay: Duration, reply: Result<String, RecognitionError>) -> Self {
        self.script.push_back((delay, reply));
        self
    }

    /// Request shutdown once the script is exhausted
    #[must_use]
    pub fn then_shutdown(mut self, shutdown: mpsc::Sender<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Counter of every `listen` call, including ones past the script
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait(?Send)]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn listen(
        &mut self,
        _timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((delay, next)) = self.script.pop_front() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            return next;
        }

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(()).await;
        }
        std::future::pending().await
    }
}

/// Synthesizer that records every line it is asked to speak
#[derive(Default)]
pub struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail (after recording) whenever asked to speak `text`
    #[must_use]
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    /// Shared log of spoken lines
    pub fn spoken(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }
}

#[async_trait(?Send)]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn speak(
        &mut self,
        text: &str,
        _language: &str,
        _deadline: Duration,
    ) -> Result<(), SynthesisError> {
        self.spoken.lock().unwrap().push(text.to_string());

        if self.fail_on.as_deref() == Some(text) {
            return Err(SynthesisError::Service("speaker unplugged".to_string()));
        }
        Ok(())
    }
}

/// Model that answers with a fixed reply and records prompts
#[derive(Default)]
pub struct StubModel {
    reply: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Model whose backend is always down
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Backend("connection refused".to_string()))
    }
}

/// Model that panics on its first call and answers afterwards
#[derive(Default)]
pub struct PanicOnceModel {
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for PanicOnceModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        assert!(
            self.calls.fetch_add(1, Ordering::SeqCst) > 0,
            "model crashed on {prompt}"
        );
        Ok("recovered".to_string())
    }
}

/// Loop settings with short bounds and no backoff
pub fn test_settings() -> LoopSettings {
    LoopSettings {
        wake_word: "jarvis".to_string(),
        language: "en".to_string(),
        system_name: "JARVIS".to_string(),
        listen_timeout: Duration::from_secs(5),
        phrase_limit: Duration::from_secs(3),
        ambient_calibration: Duration::ZERO,
        transcription_timeout: Duration::from_secs(5),
        playback_deadline: Duration::from_secs(10),
        backoff_initial: Duration::ZERO,
        backoff_max: Duration::ZERO,
    }
}

/// Build a loop around the given fakes
pub fn build_loop(
    recognizer: ScriptedRecognizer,
    synthesizer: RecordingSynthesizer,
    model: Arc<dyn LanguageModel>,
) -> AssistantLoop {
    build_loop_with(recognizer, synthesizer, model, test_settings())
}

/// Build a loop around the given fakes with custom settings
pub fn build_loop_with(
    recognizer: ScriptedRecognizer,
    synthesizer: RecordingSynthesizer,
    model: Arc<dyn LanguageModel>,
    settings: LoopSettings,
) -> AssistantLoop {
    let router = CommandRouter::new(model, Duration::from_secs(5));
    AssistantLoop::new(
        Box::new(recognizer),
        Box::new(synthesizer),
        router,
        settings,
    )
}
