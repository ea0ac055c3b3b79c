//! Boundary-aware text chunker with fixed overlap.
//!
//! Splits normalized document text into [`Chunk`]s of at most `chunk_size`
//! characters, where each chunk repeats the last `overlap` characters of
//! its predecessor. Lengths and offsets count Unicode scalar values, never
//! bytes, so multi-byte text is never cut inside a character.
//!
//! # Algorithm
//!
//! 1. Open a window of `chunk_size` characters at the current start.
//! 2. If the window reaches the end of the text, emit it and stop.
//! 3. Otherwise pick the break point inside the window, trying boundary
//!    tiers in order: paragraph (`\n\n`), line (`\n`), sentence (`. `,
//!    `? `, `! `), word (` `). The last boundary of the first tier that has
//!    one wins. With no boundary at all, cut at the window edge.
//! 4. Emit `[start, break)` and restart at `break - overlap`.
//!
//! A break is only accepted if it lies beyond `start + overlap`, which
//! keeps every step moving forward. Because the next chunk always starts
//! exactly `overlap` characters before the previous one ended, removing the
//! first `overlap` characters of every chunk but the first and
//! concatenating reproduces the input.
//!
//! # Example
//!
//! ```rust
//! use query_assistant_core::chunk::Chunker;
//!
//! let chunker = Chunker::new(20, 5).unwrap();
//! let chunks = chunker.split("Alpha Beta. Gamma Delta. Epsilon Zeta.");
//! assert_eq!(chunks[0].text, "Alpha Beta. ");
//! assert!(chunks.iter().any(|c| c.text.contains("Gamma Delta")));
//! ```

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Boundary tiers, highest preference first.
const BOUNDARY_TIERS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

/// Splits text into overlapping, size-bounded chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker for `chunk_size` characters with `overlap`
    /// characters shared between neighbours.
    ///
    /// # Errors
    ///
    /// [`RagError::Configuration`] if `chunk_size` is zero or
    /// `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks in document order.
    ///
    /// Non-empty text always yields at least one chunk; text no longer than
    /// `chunk_size` yields exactly one chunk equal to the input. Empty text
    /// yields no chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let window_end = (start + self.chunk_size).min(total);
            let end = if window_end == total {
                total
            } else {
                self.find_break(&chars, start, window_end)
            };

            chunks.push(Chunk {
                id: chunks.len() as i64,
                start,
                end,
                text: chars[start..end].iter().collect(),
            });

            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        chunks
    }

    /// Choose the end of the chunk starting at `start`.
    ///
    /// Returned position `b` satisfies `start + overlap < b <= window_end`.
    fn find_break(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        let min_break = start + self.overlap + 1;
        for tier in BOUNDARY_TIERS {
            let best = tier
                .iter()
                .filter_map(|sep| last_boundary(chars, start, min_break, window_end, sep))
                .max();
            if let Some(b) = best {
                return b;
            }
        }
        window_end
    }
}

/// Last position `b` in `[lo, hi]` where `sep` ends exactly at `b` and
/// starts at or after `start`.
fn last_boundary(chars: &[char], start: usize, lo: usize, hi: usize, sep: &str) -> Option<usize> {
    let sep: Vec<char> = sep.chars().collect();
    let lo = lo.max(start + sep.len());
    if lo > hi {
        return None;
    }
    (lo..=hi)
        .rev()
        .find(|&b| chars[b - sep.len()..b] == sep[..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    fn assert_invariants(text: &str, size: usize, overlap: usize) {
        let chunker = Chunker::new(size, overlap).unwrap();
        let chunks = chunker.split(text);
        assert!(!chunks.is_empty(), "no chunks for {:?}", text);

        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.id, i as i64);
            assert!(
                c.text.chars().count() <= size,
                "chunk {} has {} chars, max {}",
                i,
                c.text.chars().count(),
                size
            );
            assert_eq!(c.char_len(), c.text.chars().count());
        }

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(pair[1].start, pair[0].end - overlap);
            assert_eq!(prev[prev.len() - overlap..], next[..overlap]);
        }

        assert_eq!(reconstruct(&chunks, overlap), text);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::new(500, 50).unwrap();
        let chunks = chunker.split("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn test_text_exactly_chunk_size() {
        let chunker = Chunker::new(10, 2).unwrap();
        let chunks = chunker.split("abcdefghij");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "abcdefghij");
    }

    #[test]
    fn test_empty_text_no_chunks() {
        let chunker = Chunker::new(10, 2).unwrap();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        let err = Chunker::new(20, 20).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
        let err = Chunker::new(20, 25).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
        let err = Chunker::new(0, 0).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn test_sentence_boundary_keeps_sentence_whole() {
        let text = "Alpha Beta. Gamma Delta. Epsilon Zeta.";
        let chunker = Chunker::new(20, 5).unwrap();
        let chunks = chunker.split(text);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Alpha Beta. ", "eta. Gamma Delta. ", "lta. Epsilon Zeta."]
        );
        assert!(chunks.iter().any(|c| c.text.contains("Gamma Delta")));
        assert_invariants(text, 20, 5);
    }

    #[test]
    fn test_paragraph_boundary_preferred_over_sentence() {
        let text = "One. Two.\n\nThree four five six seven.";
        let chunker = Chunker::new(16, 2).unwrap();
        let chunks = chunker.split(text);
        assert_eq!(chunks[0].text, "One. Two.\n\n");
        assert_invariants(text, 16, 2);
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "a".repeat(25);
        let chunker = Chunker::new(10, 3).unwrap();
        let chunks = chunker.split(&text);
        assert_eq!(chunks[0].char_len(), 10);
        assert_eq!(chunks[1].start, 7);
        assert_invariants(&text, 10, 3);
    }

    #[test]
    fn test_invariants_hold_across_settings() {
        let text = "The quarterly report covers revenue, churn and hiring. \
                    Revenue grew twelve percent! Churn fell? Hiring was flat. \
                    Recommendations: expand sales, invest in support, and \
                    revisit pricing before the next fiscal year begins.";
        for (size, overlap) in [(20, 5), (50, 0), (64, 16), (120, 50), (7, 6), (2, 1)] {
            assert_invariants(text, size, overlap);
        }
    }

    #[test]
    fn test_multibyte_text() {
        let text = "┌──────────────────┐ │ Héllo wörld │ └──────────────────┘ ünïcödé ✓";
        assert_invariants(text, 9, 4);
        assert_invariants(text, 30, 10);
    }

    #[test]
    fn test_zero_overlap_partitions_text() {
        let text = "word ".repeat(40);
        let chunker = Chunker::new(23, 0).unwrap();
        let chunks = chunker.split(&text);
        let total: usize = chunks.iter().map(|c| c.char_len()).sum();
        assert_eq!(total, text.chars().count());
        assert_invariants(&text, 23, 0);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha. Beta. Gamma. Delta. Epsilon. Zeta. Eta. Theta.";
        let chunker = Chunker::new(15, 4).unwrap();
        assert_eq!(chunker.split(text), chunker.split(text));
    }
}
