//! Jarvis - a wake-word voice assistant
//!
//! This library provides the pieces of the assistant:
//! - Memory (bounded short-term buffer, write-through long-term log)
//! - Command routing to a language model
//! - Voice processing (capture, wake word, STT, TTS, playback)
//! - The assistant loop that ties them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  AssistantLoop                      │
//! │   Idle ──wake word──▶ Engaged ──command──▶ Idle     │
//! └───────┬───────────────────┬─────────────────┬───────┘
//!         │                   │                 │
//! ┌───────▼───────┐   ┌───────▼───────┐  ┌──────▼──────┐
//! │ Speech        │   │ CommandRouter │  │ Speech      │
//! │ Recognizer    │   │  → LLM        │  │ Synthesizer │
//! └───────────────┘   └───────┬───────┘  └─────────────┘
//!                             │
//!                     ┌───────▼───────┐
//!                     │  MemoryStore  │
//!                     └───────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod daemon;
pub mod error;
pub mod llm;
pub mod memory;
pub mod practical;
pub mod router;
pub mod voice;

pub use assistant::{AssistantLoop, LoopSettings, LoopState};
pub use config::{Config, ConfigOverrides};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use llm::{ChatCompletionModel, GenerationError, LanguageModel};
pub use memory::{JsonFileStorage, LongTermLog, MemoryEntry, MemoryKind, MemoryStore};
pub use router::CommandRouter;
pub use voice::{RecognitionError, SpeechRecognizer, SpeechSynthesizer, SynthesisError};
