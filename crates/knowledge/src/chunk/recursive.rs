//! Structural splitter: paragraphs, then lines, then punctuation, then
//! words, then characters.

use super::fixed::split_fixed;
use super::{char_len, ChunkStrategy, ChunkingConfig};
use docrag_core::AppResult;

/// Coarsest first. The empty separator splits into characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " ", ""];

#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveChunker;

#[async_trait::async_trait]
impl ChunkStrategy for RecursiveChunker {
    async fn chunk(&self, text: &str, config: &ChunkingConfig) -> AppResult<Vec<String>> {
        let chunks = split_recursive(text, SEPARATORS, config.chunk_size, config.overlap);
        Ok(apply_overlap(chunks, config.overlap))
    }
}

/// Split `text` so every piece fits in `chunk_size` chars, trying
/// `separators` in order.
fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((separator, finer)) = separators.split_first() else {
        return split_fixed(text, chunk_size, overlap)
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();
    };

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator).map(str::to_string).collect()
    };

    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        let candidate_len = if current.is_empty() {
            char_len(&piece)
        } else {
            char_len(&current) + char_len(separator) + char_len(&piece)
        };

        if candidate_len <= chunk_size {
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(&piece);
            continue;
        }

        flush(&mut chunks, &mut current);
        if char_len(&piece) > chunk_size {
            chunks.extend(split_recursive(&piece, finer, chunk_size, overlap));
        } else {
            current = piece;
        }
    }
    flush(&mut chunks, &mut current);

    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let chunk = std::mem::take(current);
    if !chunk.trim().is_empty() {
        chunks.push(chunk);
    }
}

/// Prefix each chunk after the first with the word-aligned tail of the
/// chunk before it.
fn apply_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut out = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let prefix = i
            .checked_sub(1)
            .and_then(|prev| overlap_tail(&chunks[prev], overlap));
        match prefix {
            Some(prefix) => out.push(format!("{} {}", prefix, chunk)),
            None => out.push(chunk.clone()),
        }
    }
    out
}

/// The last `overlap` chars of `prev` with any leading partial word removed.
/// `None` when `prev` is not longer than `overlap` or no whole word fits.
fn overlap_tail(prev: &str, overlap: usize) -> Option<String> {
    let chars: Vec<char> = prev.chars().collect();
    if chars.len() <= overlap {
        return None;
    }

    let start = chars.len() - overlap;
    let mut tail = &chars[start..];

    let cut_mid_word = !chars[start - 1].is_whitespace() && !tail[0].is_whitespace();
    if cut_mid_word {
        let boundary = tail.iter().position(|c| c.is_whitespace())?;
        tail = &tail[boundary..];
    }

    let tail: String = tail.iter().collect();
    let tail = tail.trim();
    if tail.is_empty() {
        None
    } else {
        Some(tail.to_string())
    }
}
