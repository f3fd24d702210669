//! Wake word matching

/// Check whether `text` contains `wake_word`
///
/// Case-insensitive substring containment, not word-boundary aware:
/// "jarvisy" contains "jarvis".
#[must_use]
pub fn contains_wake_word(text: &str, wake_word: &str) -> bool {
    let found = text
        .to_lowercase()
        .contains(&wake_word.trim().to_lowercase());

    if found {
        tracing::info!(wake_word, transcript = text, "wake word detected");
    }

    found
}
