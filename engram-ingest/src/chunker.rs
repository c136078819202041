//! Overlapping-window chunker.
//!
//! Short texts pass through whole. Longer ones become sliding windows
//! with a fixed overlap so no sentence is stranded on a boundary.
//! Windows are cut on char boundaries, never inside a code point.

use engram_core::constants::{CHUNK_OVERLAP_CHARS, CHUNK_SIZE_CHARS, CHUNK_THRESHOLD_CHARS};

pub fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= CHUNK_THRESHOLD_CHARS {
        return vec![text.to_string()];
    }

    let step = CHUNK_SIZE_CHARS - CHUNK_OVERLAP_CHARS;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + CHUNK_SIZE_CHARS).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn long_text_overlaps() {
        let text = "a".repeat(2_500);
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        // Every chunk except possibly the last is full-size.
        for c in &chunks[..chunks.len() - 1] {
            assert_eq!(c.chars().count(), CHUNK_SIZE_CHARS);
        }
        // Consecutive chunks share the overlap.
        let step = CHUNK_SIZE_CHARS - CHUNK_OVERLAP_CHARS;
        let total: usize = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| if i == 0 { c.chars().count() } else { c.chars().count().min(step) })
            .sum();
        assert!(total >= 2_500);
    }

    #[test]
    fn multibyte_text_does_not_split_codepoints() {
        let text = "héllo wörld ünïcode ".repeat(100);
        let chunks = chunk_text(&text);
        // Reassembly through chars must never panic; validity is enough.
        for c in &chunks {
            assert!(!c.is_empty());
        }
    }

    #[test]
    fn boundary_length_stays_single() {
        let text = "x".repeat(CHUNK_THRESHOLD_CHARS);
        assert_eq!(chunk_text(&text).len(), 1);
        let text = "x".repeat(CHUNK_THRESHOLD_CHARS + 1);
        assert!(chunk_text(&text).len() > 1);
    }
}
