//! Overlapping character-window chunker.
//!
//! Splits loader [`Segment`]s into bounded passages for embedding. Lengths
//! and offsets are measured in characters, not bytes, so multi-byte text
//! never splits inside a code point.
//!
//! # Algorithm
//!
//! 1. Open a window of `chunk_size` characters at `start`.
//! 2. If the window reaches the end of the segment, emit it and stop.
//! 3. Otherwise look for the last paragraph break, then line break, then
//!    space inside the window but past `start + chunk_overlap`, and cut just
//!    after it. With no such separator, cut at the window edge.
//! 4. Start the next window `chunk_overlap` characters before the cut.
//!
//! A segment no longer than `chunk_size` yields exactly one chunk, and the
//! same input always produces the same boundaries.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::split_spans;
//!
//! let text = "x".repeat(2500);
//! let spans = split_spans(&text, 1000, 200);
//! let bounds: Vec<(usize, usize)> = spans.iter().map(|s| (s.start, s.end)).collect();
//! assert_eq!(bounds, vec![(0, 1000), (800, 1800), (1600, 2500)]);
//! ```

use sha2::{Digest, Sha256};

use crate::embedding::EmbeddingVector;
use crate::models::{Chunk, FileId, Metadata, Segment};

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Window length and overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Character range `[start, end)` within a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A chunk before it has been embedded and assigned to a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub chunk_index: i64,
    pub span: Span,
    pub text: String,
    pub hash: String,
    pub metadata: Metadata,
}

impl ChunkCandidate {
    /// Attach the owning document and the embedding, producing an index record.
    pub fn into_chunk(self, file_id: FileId, embedding: EmbeddingVector) -> Chunk {
        Chunk {
            file_id,
            chunk_index: self.chunk_index,
            text: self.text,
            embedding,
            hash: self.hash,
            metadata: self.metadata,
        }
    }
}

/// Compute window boundaries for one piece of text.
///
/// Returns an empty vector for empty text. `chunk_overlap` is clamped below
/// `chunk_size` so every window advances.
pub fn split_spans(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    spans_of(&chars, chunk_size, chunk_overlap)
}

fn spans_of(chars: &[char], chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let len = chars.len();
    if len == 0 || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = chunk_overlap.min(chunk_size - 1);

    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = (start + chunk_size).min(len);
        let end = if hard_end < len {
            soft_boundary(chars, start + overlap, hard_end).unwrap_or(hard_end)
        } else {
            hard_end
        };
        spans.push(Span { start, end });
        if end >= len {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
    spans
}

/// Find the preferred cut point in `(floor, hard_end]`.
///
/// The cut lands just after the separator so the separator stays with the
/// preceding chunk.
fn soft_boundary(chars: &[char], floor: usize, hard_end: usize) -> Option<usize> {
    if floor >= hard_end {
        return None;
    }
    let window = &chars[floor..hard_end];

    let paragraph = window
        .windows(2)
        .rposition(|pair| pair[0] == '\n' && pair[1] == '\n')
        .map(|i| floor + i + 2);
    if paragraph.is_some() {
        return paragraph;
    }

    for sep in ['\n', ' '] {
        if let Some(i) = window.iter().rposition(|c| *c == sep) {
            return Some(floor + i + 1);
        }
    }
    None
}

/// Split loader segments into chunk candidates.
///
/// Chunk indices are contiguous across all segments of the document.
/// Whitespace-only windows are dropped. Each candidate inherits its
/// segment's metadata plus `start_index` and `end_index`.
pub fn split_segments(segments: &[Segment], settings: &ChunkSettings) -> Vec<ChunkCandidate> {
    let mut out = Vec::new();
    let mut chunk_index: i64 = 0;

    for segment in segments {
        let chars: Vec<char> = segment.text.chars().collect();
        for span in spans_of(&chars, settings.chunk_size, settings.chunk_overlap) {
            let text: String = chars[span.start..span.end].iter().collect();
            if text.trim().is_empty() {
                continue;
            }
            let mut metadata = segment.metadata.clone();
            metadata.insert("start_index".to_string(), span.start.into());
            metadata.insert("end_index".to_string(), span.end.into());

            out.push(ChunkCandidate {
                chunk_index,
                span,
                hash: content_hash(&text),
                text,
                metadata,
            });
            chunk_index += 1;
        }
    }

    out
}

/// SHA-256 hex digest of chunk text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(spans: &[Span]) -> Vec<(usize, usize)> {
        spans.iter().map(|s| (s.start, s.end)).collect()
    }

    #[test]
    fn test_short_segment_single_chunk() {
        let spans = split_spans("Hello, world!", 1000, 200);
        assert_eq!(bounds(&spans), vec![(0, 13)]);
    }

    #[test]
    fn test_exact_size_single_chunk() {
        let text = "a".repeat(1000);
        assert_eq!(split_spans(&text, 1000, 200).len(), 1);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(split_spans("", 1000, 200).is_empty());
    }

    #[test]
    fn test_2500_chars_three_windows() {
        let text = "abcdefghij".repeat(250);
        let spans = split_spans(&text, 1000, 200);
        assert_eq!(bounds(&spans), vec![(0, 1000), (800, 1800), (1600, 2500)]);
    }

    #[test]
    fn test_overlap_and_length_invariants() {
        let text = (0..400)
            .map(|i| format!("word{} ", i))
            .collect::<String>()
            .replace("word50 ", "word50\n\n")
            .replace("word170 ", "word170\n");
        let spans = split_spans(&text, 300, 60);
        assert!(spans.len() > 1);
        for pair in spans.windows(2) {
            assert!(pair[1].start < pair[0].end, "no overlap: {:?}", pair);
            assert!(pair[1].start > pair[0].start, "no progress: {:?}", pair);
        }
        for s in &spans {
            assert!(s.len() <= 300, "chunk too long: {:?}", s);
        }
        assert_eq!(spans.last().map(|s| s.end), Some(text.chars().count()));
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(600), "b".repeat(600));
        let spans = split_spans(&text, 1000, 200);
        assert_eq!(spans[0].end, 602);
        assert_eq!(spans[1].start, 402);
    }

    #[test]
    fn test_falls_back_to_space() {
        let text = format!("{} {}", "a".repeat(700), "b".repeat(700));
        let spans = split_spans(&text, 1000, 200);
        assert_eq!(spans[0].end, 701);
    }

    #[test]
    fn test_separator_inside_overlap_is_ignored() {
        // A space before start+overlap would not let the next window advance.
        let text = format!("{} {}", "a".repeat(100), "b".repeat(1500));
        let spans = split_spans(&text, 1000, 200);
        assert_eq!(spans[0].end, 1000);
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let text = "é".repeat(1500);
        let spans = split_spans(&text, 1000, 200);
        assert_eq!(bounds(&spans), vec![(0, 1000), (800, 1500)]);
    }

    #[test]
    fn test_overlap_clamped_below_size() {
        let spans = split_spans(&"z".repeat(30), 10, 50);
        assert!(spans.windows(2).all(|p| p[1].start > p[0].start));
        assert_eq!(spans.last().map(|s| s.end), Some(30));
    }

    #[test]
    fn test_split_segments_indices_contiguous() {
        let segments = vec![
            Segment::new("x".repeat(2500)).with_meta("page", 1),
            Segment::new("   "),
            Segment::new("short page").with_meta("page", 3),
        ];
        let chunks = split_segments(&segments, &ChunkSettings::default());
        assert_eq!(chunks.len(), 4);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
        assert_eq!(chunks[3].metadata["page"], serde_json::json!(3));
        assert_eq!(chunks[1].metadata["start_index"], serde_json::json!(800));
    }

    #[test]
    fn test_deterministic() {
        let segments = vec![Segment::new("Alpha beta gamma delta. ".repeat(120))];
        let settings = ChunkSettings {
            chunk_size: 200,
            chunk_overlap: 40,
        };
        let a = split_segments(&segments, &settings);
        let b = split_segments(&segments, &settings);
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_segments_matches_split_spans() {
        let text = format!("{}\n\n{} {}", "é".repeat(700), "ß".repeat(500), "ü".repeat(900));
        let settings = ChunkSettings::default();
        let expected = split_spans(&text, settings.chunk_size, settings.chunk_overlap);
        let chunks = split_segments(&[Segment::new(text.clone())], &settings);
        let got: Vec<Span> = chunks.iter().map(|c| c.span).collect();
        assert_eq!(got, expected);
        let chars: Vec<char> = text.chars().collect();
        for c in &chunks {
            assert_eq!(c.text, chars[c.span.start..c.span.end].iter().collect::<String>());
        }
    }

    #[test]
    fn test_hash_matches_text() {
        let chunks = split_segments(&[Segment::new("hello")], &ChunkSettings::default());
        assert_eq!(chunks[0].hash, content_hash("hello"));
    }
}
