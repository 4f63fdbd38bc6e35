//! Sliding-window splitter.

use super::{ChunkStrategy, ChunkingConfig};
use docrag_core::AppResult;

/// Fixed-size character windows. Window `i` starts at
/// `i * (chunk_size - overlap)`; the final window may be shorter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedChunker;

#[async_trait::async_trait]
impl ChunkStrategy for FixedChunker {
    async fn chunk(&self, text: &str, config: &ChunkingConfig) -> AppResult<Vec<String>> {
        Ok(split_fixed(text, config.chunk_size, config.overlap))
    }
}

/// Cut `text` into windows of `chunk_size` chars advancing by
/// `chunk_size - overlap`. Windows are not trimmed.
pub fn split_fixed(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let size = chunk_size.max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_and_step() {
        assert_eq!(split_fixed("A. B. C.", 4, 1), vec!["A. B", "B. C", "C."]);
        assert_eq!(split_fixed("abcdefgh", 3, 0), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_window_count() {
        // ceil(len / step) windows
        let text = "x".repeat(103);
        let chunks = split_fixed(&text, 20, 5);
        assert_eq!(chunks.len(), 103_usize.div_ceil(15));
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn test_short_text_is_one_window() {
        assert_eq!(split_fixed("tiny", 500, 100), vec!["tiny"]);
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let chunks = split_fixed("héllo wörld ✓✓", 5, 0);
        assert_eq!(chunks[0], "héllo");
        assert_eq!(chunks[1], " wörl");
        assert_eq!(chunks[2], "d ✓✓");
    }

    #[test]
    fn test_whitespace_is_preserved() {
        let chunks = split_fixed("  ab  cd  ", 5, 1);
        assert_eq!(chunks[0], "  ab ");
        assert_eq!(chunks[1], "  cd ");
        assert_eq!(chunks[2], "  ");
    }
}
