//! Boundary-aware text chunker with overlap.
//!
//! Splits document segments into [`Chunk`]s of at most `max_chars`
//! characters. Consecutive chunks of a segment share up to
//! `overlap_chars` characters so that context straddling a cut is not lost.
//!
//! # Algorithm
//!
//! For each non-blank segment (chunks never span segments):
//!
//! 1. If the segment fits in `max_chars`, emit it whole with no overlap.
//! 2. Otherwise open a window of `max_chars` characters at `start`.
//! 3. Place the window end at the last boundary inside
//!    `(start + overlap_chars, start + max_chars]`, preferring in order a
//!    paragraph break (`\n\n`), a sentence end (`.`/`!`/`?` + whitespace),
//!    any whitespace, and finally a hard cut at `start + max_chars`.
//! 4. Start the next window `overlap_chars` before that end, moved forward
//!    to the first word start inside the overlap if there is one.
//!
//! Chunks are exact substrings of the segment (nothing is trimmed), so the
//! segment can be rebuilt by concatenating the chunks and dropping each
//! chunk's leading `overlap` characters; see [`reconstruct`].
//!
//! # Example
//!
//! ```rust
//! use quarry_core::chunk::{ChunkConfig, Chunker};
//! use quarry_core::models::{Document, DocumentKind, Segment};
//!
//! let doc = Document::new(
//!     "sky.txt",
//!     DocumentKind::Text,
//!     vec![Segment::new("The sky is blue. Grass is green.")],
//! );
//! let chunker = Chunker::new(ChunkConfig::default()).unwrap();
//! let chunks = chunker.chunk_document(&doc);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].metadata.source, "sky.txt");
//! ```

use thiserror::Error;

use crate::models::{Chunk, Document};

/// Default maximum chunk length, in characters.
pub const DEFAULT_MAX_CHARS: usize = 1000;
/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkConfigError {
    #[error("chunk max length must be > 0")]
    ZeroMax,
    #[error("chunk overlap ({overlap}) must be smaller than chunk max length ({max})")]
    OverlapTooLarge { overlap: usize, max: usize },
}

/// Chunk sizing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl ChunkConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        Self {
            max_chars,
            overlap_chars,
        }
    }

    pub fn validate(&self) -> Result<(), ChunkConfigError> {
        if self.max_chars == 0 {
            return Err(ChunkConfigError::ZeroMax);
        }
        if self.overlap_chars >= self.max_chars {
            return Err(ChunkConfigError::OverlapTooLarge {
                overlap: self.overlap_chars,
                max: self.max_chars,
            });
        }
        Ok(())
    }
}

/// A chunk window over a segment, in character positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    /// Characters shared with the previous window.
    pub overlap: usize,
}

/// Splits documents into overlapping, length-bounded chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Result<Self, ChunkConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    /// Chunk every segment of `document`.
    ///
    /// Chunk indices are contiguous across the whole document, starting at 0.
    /// Blank segments produce no chunks.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut index: u32 = 0;

        for segment in &document.segments {
            if segment.text.trim().is_empty() {
                continue;
            }
            for (text, window) in self.split(&segment.text) {
                chunks.push(Chunk::new(
                    document,
                    index,
                    text,
                    window.start,
                    window.overlap,
                    segment.page,
                ));
                index += 1;
            }
        }

        chunks
    }

    /// Split one piece of text into windows, returning each window's slice.
    pub fn split<'a>(&self, text: &'a str) -> Vec<(&'a str, Window)> {
        let chars: Vec<char> = text.chars().collect();
        let mut byte_at: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        byte_at.push(text.len());

        self.windows(&chars)
            .into_iter()
            .map(|w| (&text[byte_at[w.start]..byte_at[w.end]], w))
            .collect()
    }

    fn windows(&self, chars: &[char]) -> Vec<Window> {
        let n = chars.len();
        let max = self.config.max_chars;
        let overlap = self.config.overlap_chars;

        if n == 0 {
            return Vec::new();
        }
        if n <= max {
            return vec![Window {
                start: 0,
                end: n,
                overlap: 0,
            }];
        }

        let mut windows = Vec::new();
        let mut start = 0;
        let mut prev_end: usize = 0;

        loop {
            let hard_end = (start + max).min(n);
            let end = if hard_end == n {
                n
            } else {
                // The end must lie past start + overlap so the next window
                // starts strictly after this one.
                find_boundary(chars, start + overlap + 1, hard_end)
            };

            windows.push(Window {
                start,
                end,
                overlap: prev_end.saturating_sub(start),
            });

            if end == n {
                break;
            }

            prev_end = end;
            start = overlap_start(chars, end - overlap, end);
        }

        windows
    }
}

/// Last cut position in `lo..=hi`, by boundary preference.
fn find_boundary(chars: &[char], lo: usize, hi: usize) -> usize {
    let is_paragraph = |i: usize| i >= 2 && chars[i - 1] == '\n' && chars[i - 2] == '\n';
    let is_sentence = |i: usize| {
        i >= 2 && chars[i - 1].is_whitespace() && matches!(chars[i - 2], '.' | '!' | '?')
    };
    let is_word = |i: usize| i >= 1 && chars[i - 1].is_whitespace();

    let boundaries: [&dyn Fn(usize) -> bool; 3] = [&is_paragraph, &is_sentence, &is_word];
    for is_boundary in boundaries {
        if let Some(i) = (lo..=hi).rev().find(|&i| is_boundary(i)) {
            return i;
        }
    }
    hi
}

/// First word start in `from..end`, or `from` if the overlap is one word.
fn overlap_start(chars: &[char], from: usize, end: usize) -> usize {
    (from..end)
        .find(|&p| p > 0 && chars[p - 1].is_whitespace() && !chars[p].is_whitespace())
        .unwrap_or(from)
}

/// Rebuild a segment's text from its chunks by dropping each overlap.
///
/// `chunks` must all come from the same segment, in order.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.extend(chunk.text.chars().skip(chunk.overlap));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, Segment};

    fn doc(text: &str) -> Document {
        Document::new("test.txt", DocumentKind::Text, vec![Segment::new(text)])
    }

    fn chunk(text: &str, max: usize, overlap: usize) -> Vec<Chunk> {
        Chunker::new(ChunkConfig::new(max, overlap))
            .unwrap()
            .chunk_document(&doc(text))
    }

    /// Deterministic pseudo-random prose with paragraphs, sentences and
    /// multi-byte characters.
    fn sample_text(seed: u64, words: usize) -> String {
        let vocab = [
            "alpha", "beta", "gamma", "délta", "ε", "sky", "is", "blue", "grass", "green",
            "naïve", "🦀", "retrieval", "augmented", "generation",
        ];
        let mut state = seed;
        let mut out = String::new();
        for i in 0..words {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let word = vocab[(state >> 33) as usize % vocab.len()];
            out.push_str(word);
            let sep = (state >> 20) % 23;
            if i + 1 < words {
                match sep {
                    0 => out.push_str(".\n\n"),
                    1..=3 => out.push_str(". "),
                    4 => out.push('\n'),
                    _ => out.push(' '),
                }
            }
        }
        out
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk("The sky is blue. Grass is green.", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The sky is blue. Grass is green.");
        assert_eq!(chunks[0].overlap, 0);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_text_shorter_than_overlap() {
        let chunks = chunk("tiny", 10, 8);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_blank_text_yields_no_chunks() {
        assert!(chunk("", 100, 10).is_empty());
        assert!(chunk("  \n\n \t", 100, 10).is_empty());
    }

    #[test]
    fn test_length_bound() {
        for (seed, max, overlap) in [(1, 50, 10), (2, 100, 0), (3, 37, 36), (4, 1000, 200)] {
            let text = sample_text(seed, 600);
            for c in chunk(&text, max, overlap) {
                assert!(
                    c.text.chars().count() <= max,
                    "chunk of {} chars exceeds {}",
                    c.text.chars().count(),
                    max
                );
                assert!(c.overlap <= overlap);
            }
        }
    }

    #[test]
    fn test_round_trip_reconstructs_text() {
        for seed in 0..20u64 {
            let text = sample_text(seed, 50 + seed as usize * 40);
            for (max, overlap) in [(40, 10), (64, 0), (100, 99), (1000, 200), (13, 5)] {
                let chunks = chunk(&text, max, overlap);
                assert_eq!(
                    reconstruct(&chunks),
                    text,
                    "round trip failed for seed={} max={} overlap={}",
                    seed,
                    max,
                    overlap
                );
            }
        }
    }

    #[test]
    fn test_hard_cut_without_whitespace() {
        let text = "x".repeat(250);
        let chunks = chunk(&text, 100, 20);
        let lens: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        assert_eq!(lens, vec![100, 100, 90]);
        assert_eq!(chunks[1].offset, 80);
        assert_eq!(chunks[1].overlap, 20);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let text = format!("{} end.\n\n{}", "a".repeat(30), "b ".repeat(40));
        let chunks = chunk(&text, 60, 5);
        assert!(
            chunks[0].text.ends_with("\n\n"),
            "first chunk should end at the paragraph break: {:?}",
            chunks[0].text
        );
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let text = "One two three. Four five six seven eight nine ten eleven twelve";
        let chunks = chunk(text, 30, 0);
        assert_eq!(chunks[0].text, "One two three. ");
    }

    #[test]
    fn test_overlap_starts_at_word() {
        let text = "aaaa bbbb cccc dddd eeee ffff gggg hhhh iiii jjjj";
        let chunks = chunk(text, 20, 7);
        for c in chunks.iter().skip(1) {
            let first = c.text.chars().next().unwrap();
            assert!(!first.is_whitespace(), "chunk starts mid-gap: {:?}", c.text);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_zero_overlap_concatenates() {
        let text = sample_text(7, 300);
        let chunks = chunk(&text, 80, 0);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
        assert!(chunks.iter().all(|c| c.overlap == 0));
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text(11, 400);
        let a = chunk(&text, 90, 30);
        let b = chunk(&text, 90, 30);
        assert_eq!(a, b);
    }

    #[test]
    fn test_indices_contiguous_across_pages() {
        let document = Document::new(
            "book.pdf",
            DocumentKind::Pdf,
            vec![
                Segment::page(sample_text(1, 100), 1),
                Segment::page("   ", 2),
                Segment::page(sample_text(2, 100), 3),
            ],
        );
        let chunks = Chunker::new(ChunkConfig::new(120, 20))
            .unwrap()
            .chunk_document(&document);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as u32);
        }
        assert!(chunks.iter().all(|c| c.metadata.page != Some(2)));
        assert!(chunks.iter().any(|c| c.metadata.page == Some(1)));
        assert!(chunks.iter().any(|c| c.metadata.page == Some(3)));

        let page3: Vec<Chunk> = chunks
            .iter()
            .filter(|c| c.metadata.page == Some(3))
            .cloned()
            .collect();
        assert_eq!(reconstruct(&page3), sample_text(2, 100));
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let text = "é".repeat(30);
        let chunks = chunk(&text, 10, 2);
        assert_eq!(chunks[1].offset, 8);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 10));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            ChunkConfig::new(0, 0).validate(),
            Err(ChunkConfigError::ZeroMax)
        );
        assert!(matches!(
            ChunkConfig::new(100, 100).validate(),
            Err(ChunkConfigError::OverlapTooLarge { .. })
        ));
        assert!(ChunkConfig::default().validate().is_ok());
    }
}
