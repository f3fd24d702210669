//! The assistant control loop
//!
//! ```text
//! greeting → Idle ──wake word──▶ Engaged ──command──▶ route → speak → Idle
//!              ▲                    │
//!              └─── listen failed ──┘          shutdown (any state) → farewell → Stopped
//! ```
//!
//! The loop is strictly sequential: one collaborator call at a time. Every
//! call is bounded, and a pending shutdown is always taken before the next
//! iteration starts.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::router::CommandRouter;
use crate::voice::{
    RecognitionError, SpeechRecognizer, SpeechSynthesizer, SynthesisError, contains_wake_word,
};

/// Spoken once the wake word is heard
pub const ACKNOWLEDGEMENT: &str = "Yes, sir?";

/// Spoken exactly once on shutdown
pub const FAREWELL: &str = "System shutting down. Goodbye!";

/// Spoken when an iteration fails unexpectedly
pub const APOLOGY: &str = "I encountered an unexpected error.";

/// Slack on top of everything a recognizer is allowed to spend
const LISTEN_GRACE: Duration = Duration::from_secs(2);

/// Slack on top of the playback deadline for the TTS round trip
const SYNTHESIS_GRACE: Duration = Duration::from_secs(15);

/// Startup announcement for `system_name`
#[must_use]
pub fn greeting(system_name: &str) -> String {
    format!("{system_name} system online. How may I help you?")
}

/// Where the loop is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the wake word
    Idle,
    /// Wake word heard; the next utterance is a command
    Engaged,
    /// Shut down; terminal
    Stopped,
}

/// Timing and wording knobs for [`AssistantLoop`]
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub wake_word: String,
    pub language: String,
    pub system_name: String,
    pub listen_timeout: Duration,
    pub phrase_limit: Duration,
    /// Noise sampling a recognizer may do before its first capture
    pub ambient_calibration: Duration,
    /// Transcription round trip after the utterance is captured
    pub transcription_timeout: Duration,
    pub playback_deadline: Duration,
    /// First pause after a failed idle listen; zero retries immediately
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl LoopSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            wake_word: config.wake_word.clone(),
            language: config.language.clone(),
            system_name: config.system_name.clone(),
            listen_timeout: config.voice.listen_timeout,
            phrase_limit: config.voice.phrase_limit,
            ambient_calibration: config.voice.ambient_calibration,
            transcription_timeout: config.voice.stt_timeout,
            playback_deadline: config.voice.playback_deadline,
            backoff_initial: config.recognition.backoff_initial,
            backoff_max: config.recognition.backoff_max,
        }
    }

    /// Outer bound on one `listen()`: calibration, onset wait, phrase and
    /// transcription, plus grace
    #[must_use]
    pub fn listen_bound(&self) -> Duration {
        self.ambient_calibration
            + self.listen_timeout
            + self.phrase_limit
            + self.transcription_timeout
            + LISTEN_GRACE
    }
}

/// Listens for the wake word, then for a command, and speaks the response
pub struct AssistantLoop {
    recognizer: Box<dyn SpeechRecognizer>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    router: CommandRouter,
    settings: LoopSettings,
    state: LoopState,
    backoff: Duration,
}

impl AssistantLoop {
    #[must_use]
    pub fn new(
        recognizer: Box<dyn SpeechRecognizer>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        router: CommandRouter,
        settings: LoopSettings,
    ) -> Self {
        Self {
            recognizer,
            synthesizer,
            router,
            settings,
            state: LoopState::Idle,
            backoff: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Run until `shutdown_rx` yields or closes
    ///
    /// Greets, then cycles between Idle and Engaged. Per-iteration failures
    /// never escape: recognition and synthesis failures are logged, and a
    /// panicking iteration is answered with [`APOLOGY`]. On shutdown the
    /// in-flight iteration is abandoned and [`FAREWELL`] is spoken once.
    #[allow(clippy::future_not_send)]
    pub async fn run(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) {
        let greeting = greeting(&self.settings.system_name);
        self.say(&greeting).await;

        self.state = LoopState::Idle;
        tracing::info!(wake_word = %self.settings.wake_word, "listening for wake word");

        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                outcome = AssertUnwindSafe(self.tick()).catch_unwind() => outcome,
            };

            if let Err(panic) = outcome {
                tracing::error!(error = panic_message(&*panic), "unexpected error in assistant loop");
                self.state = LoopState::Idle;
                self.say(APOLOGY).await;
            }
        }

        self.state = LoopState::Stopped;
        self.say(FAREWELL).await;
    }

    /// One step of the state machine
    #[allow(clippy::future_not_send)]
    async fn tick(&mut self) {
        match self.state {
            LoopState::Idle => match self.listen().await {
                Ok(text) => {
                    self.backoff = Duration::ZERO;
                    if contains_wake_word(&text, &self.settings.wake_word) {
                        self.say(ACKNOWLEDGEMENT).await;
                        self.state = LoopState::Engaged;
                    } else {
                        tracing::debug!(text, "no wake word, ignoring");
                    }
                }
                Err(e) => {
                    log_recognition_failure(&e);
                    self.back_off().await;
                }
            },
            LoopState::Engaged => {
                let heard = self.listen().await;
                self.state = LoopState::Idle;

                match heard {
                    Ok(command) => {
                        self.backoff = Duration::ZERO;
                        let response = self.router.route(&command).await;
                        self.say(&response).await;
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "command not captured, back to idle");
                    }
                }
            }
            LoopState::Stopped => {}
        }
    }

    #[allow(clippy::future_not_send)]
    async fn listen(&mut self) -> Result<String, RecognitionError> {
        let timeout = self.settings.listen_timeout;
        let phrase_limit = self.settings.phrase_limit;
        let bound = self.settings.listen_bound();

        tokio::time::timeout(bound, self.recognizer.listen(timeout, phrase_limit))
            .await
            .unwrap_or_else(|_| {
                tracing::debug!(bound = ?bound, "listen bound elapsed");
                Err(RecognitionError::Timeout)
            })
    }

    /// Speak `text`; failures are logged and never propagate
    #[allow(clippy::future_not_send)]
    async fn say(&mut self, text: &str) {
        let deadline = self.settings.playback_deadline;
        let bound = deadline + SYNTHESIS_GRACE;
        let speak = self
            .synthesizer
            .speak(text, &self.settings.language, deadline);

        let result = match AssertUnwindSafe(tokio::time::timeout(bound, speak))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SynthesisError::Timeout),
            Err(panic) => Err(SynthesisError::Playback(panic_message(&*panic).to_string())),
        };

        match result {
            Ok(()) => {}
            Err(SynthesisError::Timeout) => tracing::warn!(bound = ?bound, "speech timed out"),
            Err(SynthesisError::Service(e)) => tracing::error!(error = %e, "speech synthesis error"),
            Err(SynthesisError::Playback(e)) => tracing::error!(error = %e, "speech playback error"),
        }
    }

    /// Pause after a failed idle listen, doubling each time
    #[allow(clippy::future_not_send)]
    async fn back_off(&mut self) {
        self.backoff = next_backoff(
            self.backoff,
            self.settings.backoff_initial,
            self.settings.backoff_max,
        );
        if !self.backoff.is_zero() {
            tracing::trace!(backoff = ?self.backoff, "backing off");
            tokio::time::sleep(self.backoff).await;
        }
    }
}

fn next_backoff(current: Duration, initial: Duration, max: Duration) -> Duration {
    if current.is_zero() {
        initial.min(max)
    } else {
        current.saturating_mul(2).min(max)
    }
}

fn log_recognition_failure(error: &RecognitionError) {
    match error {
        // Silence and mumbling are the normal idle case
        RecognitionError::Timeout | RecognitionError::Unintelligible => {
            tracing::trace!(error = %error, "nothing recognized");
        }
        RecognitionError::ServiceUnavailable(e) => {
            tracing::warn!(error = %e, "speech recognition service unavailable");
        }
        RecognitionError::Other(e) => tracing::warn!(error = %e, "speech recognition failed"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic")
}
