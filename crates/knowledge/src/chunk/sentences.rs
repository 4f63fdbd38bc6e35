//! Sentence splitting shared by the semantic and agentic strategies.

use regex::Regex;
use std::sync::OnceLock;

fn boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern"))
}

/// Split on whitespace that follows `.`, `!` or `?`. The punctuation stays
/// with its sentence; pieces are trimmed and blanks dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in boundary().find_iter(text) {
        // Keep the punctuation mark (always one ASCII byte) with the sentence.
        let end = m.start() + 1;
        push_trimmed(&mut sentences, &text[start..end]);
        start = m.end();
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}
