//! Transcription result filtering
//!
//! Cleans the raw text returned by the transcription endpoint before it is
//! delivered to the host. Whisper-family services emit bracketed noise
//! tokens for non-speech audio — "(wind blowing)", "[BLANK_AUDIO]",
//! "{inaudible}" — which must never reach the chat input.

/// Matching bracket pairs treated as noise wrappers
const NOISE_PAIRS: [(char, char); 3] = [('{', '}'), ('(', ')'), ('[', ']')];

/// Filter a raw transcription result.
///
/// Trims surrounding whitespace, then discards the text entirely when it is
/// empty or wholly wrapped in a single matching pair of `{}`, `()` or `[]`.
/// The wrapper check looks only at the first and last characters, so a
/// legitimate sentence that happens to be fully parenthesised is discarded
/// too; that trade-off is accepted to keep noise tokens out.
///
/// Accepted text is returned trimmed but otherwise unchanged.
pub fn filter_result(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut chars = trimmed.chars();
    let first = chars.next()?;
    let last = chars.last().unwrap_or(first);

    if NOISE_PAIRS
        .iter()
        .any(|&(open, close)| first == open && last == close)
    {
        tracing::debug!("Discarding bracketed noise token: {:?}", trimmed);
        return None;
    }

    Some(trimmed.to_string())
}
