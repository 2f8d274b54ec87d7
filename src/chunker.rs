//! Boundary-aware overlapping text chunker.
//!
//! Splits a document body into chunks sized for embedding. A sliding
//! window of `max_chars` bytes prefers to cut at a natural break found in
//! the last 30% of the window: blank line, then sentence terminator, then
//! newline, then space. Consecutive windows overlap by `overlap_chars`
//! unless that would stall; then the window jumps to the previous cut so
//! the walk always advances. All offsets are snapped to UTF-8 character
//! boundaries, so a chunk never splits a multi-byte character.
//!
//! Output is fully determined by `(body, max_chars, overlap_chars)`.

/// Default chunk size (~800 tokens at ~4 chars per token).
pub const CHUNK_SIZE_CHARS: usize = 3200;
/// Default overlap (15% of the chunk size).
pub const CHUNK_OVERLAP_CHARS: usize = 480;

/// One piece of document text with its byte offset in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub pos: usize,
}

/// Split `body` into overlapping chunks. Zero arguments fall back to the
/// defaults. Bodies within `max_chars` yield exactly one chunk at offset 0.
pub fn chunk_text(body: &str, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let max_chars = if max_chars == 0 { CHUNK_SIZE_CHARS } else { max_chars };
    let overlap_chars = if overlap_chars == 0 {
        CHUNK_OVERLAP_CHARS
    } else {
        overlap_chars
    };

    if body.len() <= max_chars {
        return vec![Chunk {
            text: body.to_string(),
            pos: 0,
        }];
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut pos = 0usize;
    while pos < body.len() {
        let mut end = floor_char_boundary(body, (pos + max_chars).min(body.len()));
        if end < body.len() {
            // Prefer a break in the last 30% of the window.
            let search_start = ceil_char_boundary(body, pos + (end - pos) * 7 / 10);
            if let Some(off) = find_break(&body[search_start..end]) {
                end = search_start + off;
            }
        }
        if end <= pos {
            end = floor_char_boundary(body, (pos + max_chars).min(body.len()));
        }
        chunks.push(Chunk {
            text: body[pos..end].to_string(),
            pos,
        });
        if end >= body.len() {
            break;
        }
        pos = floor_char_boundary(body, end.saturating_sub(overlap_chars));
        if pos <= chunks[chunks.len() - 1].pos {
            pos = end;
        }
    }
    chunks
}

/// Byte offset just after the best break in `s`, or `None`.
/// Break preference: paragraph, sentence, line, word.
fn find_break(s: &str) -> Option<usize> {
    if let Some(i) = s.rfind("\n\n") {
        return Some(i + 2);
    }
    for sep in [". ", ".\n", "? ", "?\n", "! ", "!\n"] {
        if let Some(i) = s.rfind(sep) {
            return Some(i + sep.len());
        }
    }
    if let Some(i) = s.rfind('\n') {
        return Some(i + 1);
    }
    if let Some(i) = s.rfind(' ') {
        return Some(i + 1);
    }
    None
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_body_single_chunk() {
        let chunks = chunk_text("Hello, world!", 3200, 480);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].pos, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn empty_body_single_chunk() {
        let chunks = chunk_text("", 3200, 480);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn body_at_exact_limit_single_chunk() {
        let body = "a".repeat(3200);
        let chunks = chunk_text(&body, 3200, 480);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_body_splits_and_overlaps() {
        let body = "word ".repeat(2000); // 10,000 bytes
        let chunks = chunk_text(&body, 3200, 480);
        assert!(chunks.len() > 1);
        // Offsets strictly increase and each chunk starts where it claims.
        for pair in chunks.windows(2) {
            assert!(pair[1].pos > pair[0].pos);
        }
        for c in &chunks {
            assert!(body[c.pos..].starts_with(&c.text));
            assert!(c.text.len() <= 3200);
        }
        // Overlap: the next chunk starts before the previous one ends.
        for pair in chunks.windows(2) {
            assert!(pair[1].pos < pair[0].pos + pair[0].text.len());
        }
    }

    #[test]
    fn prefers_paragraph_break() {
        // Paragraph boundary inside the last 30% of the first window.
        let mut body = "x".repeat(2900);
        body.push_str("\n\n");
        body.push_str(&"y".repeat(1000));
        let chunks = chunk_text(&body, 3200, 480);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[0].text.len(), 2902);
    }

    #[test]
    fn prefers_sentence_over_word_break() {
        let mut body = "x".repeat(2800);
        body.push_str(". ");
        body.push_str(&"word ".repeat(600));
        let chunks = chunk_text(&body, 3200, 480);
        assert!(chunks[0].text.ends_with(". "));
    }

    #[test]
    fn deterministic() {
        let body = "The quick brown fox jumps over the lazy dog. ".repeat(200);
        let a = chunk_text(&body, 3200, 480);
        let b = chunk_text(&body, 3200, 480);
        assert_eq!(a, b);
    }

    #[test]
    fn never_splits_multibyte_chars() {
        // No spaces or newlines, so no natural break: forces hard cuts
        // through a run of 3-byte characters.
        let body = "日本語のテキスト".repeat(200);
        let chunks = chunk_text(&body, 100, 20);
        for c in &chunks {
            // Would panic on a non-boundary slice; also verify round-trip.
            assert!(body.is_char_boundary(c.pos));
            assert!(body[c.pos..].starts_with(&c.text));
        }
    }

    #[test]
    fn forward_progress_with_large_overlap() {
        // Overlap nearly as large as the window must not loop forever.
        let body = "ab ".repeat(500);
        let chunks = chunk_text(&body, 30, 29);
        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert!(pair[1].pos > pair[0].pos);
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.pos + last.text.len(), body.len());
    }
}
