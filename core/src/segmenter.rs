//! Sentence-level text segmentation.
//!
//! Splits raw document text into sentence-like chunks, each tagged with its
//! character offset in the source. These offsets are what the index later
//! uses to attribute a chunk to a page.

/// A minimal sentence-like unit of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Character position of this chunk in the source text
    pub offset: usize,
    /// Trimmed chunk text
    pub text: String,
}

/// Trailing sequence that suppresses a split. A sentence ending in this
/// literal is treated as an abbreviation, not a boundary ("the bill. of
/// lading" style false positives).
pub const DEFAULT_ABBREVIATION_GUARD: &str = "bill.";

fn is_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn is_boundary_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\n' | '\t')
}

/// Split text into ordered chunks using the default abbreviation guard.
pub fn segment(text: &str) -> Vec<Chunk> {
    segment_with_guard(text, DEFAULT_ABBREVIATION_GUARD)
}

/// Split text into ordered chunks.
///
/// A boundary is declared right after `.`, `!` or `?` when the next
/// character is whitespace, unless the accumulated buffer then ends with
/// `guard`. Offsets count characters, not bytes, so multi-byte text never
/// splits a code point. Any trailing non-empty buffer becomes a final
/// chunk. Pure function of its input.
pub fn segment_with_guard(text: &str, guard: &str) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut offset = 0usize;

    for i in 0..chars.len() {
        let ch = chars[i];
        buf.push(ch);
        let next = chars.get(i + 1).copied();
        if is_terminal(ch) && next.is_some_and(is_boundary_whitespace) && !buf.ends_with(guard) {
            let trimmed = buf.trim();
            if !trimmed.is_empty() {
                chunks.push(Chunk {
                    offset,
                    text: trimmed.to_string(),
                });
            }
            buf.clear();
            offset = i + 1;
        }
    }

    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        chunks.push(Chunk {
            offset,
            text: trimmed.to_string(),
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let chunks = segment("Stop. Now.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Stop.");
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[1].text, "Now.");
    }

    #[test]
    fn abbreviation_guard_suppresses_split() {
        let chunks = segment("Pay the bill. Now.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Pay the bill. Now.");
    }

    #[test]
    fn splits_on_question_and_exclamation() {
        let chunks = segment("Really? Yes! Fine.");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Really?");
        assert_eq!(chunks[1].text, "Yes!");
        assert_eq!(chunks[2].text, "Fine.");
    }

    #[test]
    fn no_split_without_following_whitespace() {
        // Sentence-terminal punctuation glued to the next character
        // (e.g. "3.14", "e.g.") must not split.
        let chunks = segment("Pi is 3.14 and that is all.");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn trailing_buffer_becomes_final_chunk() {
        let chunks = segment("First one. Second without terminator");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "Second without terminator");
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(segment("").is_empty());
        assert!(segment("   \n\t ").is_empty());
    }

    #[test]
    fn offsets_are_strictly_increasing() {
        let chunks = segment("One. Two. Three. Four.");
        for pair in chunks.windows(2) {
            assert!(pair[0].offset < pair[1].offset);
        }
    }

    #[test]
    fn reconstruction_preserves_text() {
        // Re-inserting the stripped whitespace between chunks gives back
        // the original text.
        let text = "One sentence here. Another one there. And a third.";
        let chunks = segment(text);
        let rebuilt = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let chunks = segment("Grüße aus München. Noch ein Satz.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "Noch ein Satz.");
    }
}
