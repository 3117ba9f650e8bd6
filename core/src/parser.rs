//! Marker-based extraction of structured fields from model output.
//!
//! Model output is free text that routinely echoes the prompt, and the
//! prompt itself contains the marker words as worked examples. A naive
//! first-occurrence scan therefore misparses. The extraction anchors on
//! the *last* occurrence of the final marker and walks the remaining
//! markers backward through a shrinking window, so a repeated marker word
//! inside a later field's value can never be claimed by an earlier field.

/// Marker order: the anchor field sits last; the fields are then extracted
/// front to back, each search confined to the text before the previously
/// matched marker.
pub const RESPONSE_MARKERS: [&str; 4] = ["Answer:", "Observation:", "Action:", "Thought:"];

/// Fields extracted from one model response. A `None` means the marker was
/// not found, which is a documented condition, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    pub thought: Option<String>,
    pub action: Option<String>,
    pub observation: Option<String>,
    pub answer: Option<String>,
}

impl ParsedFields {
    fn set(&mut self, marker: &str, value: String) {
        match marker.trim_end_matches(':').to_lowercase().as_str() {
            "thought" => self.thought = Some(value),
            "action" => self.action = Some(value),
            "observation" => self.observation = Some(value),
            "answer" => self.answer = Some(value),
            _ => {}
        }
    }
}

/// Parse a response with the default marker set.
pub fn parse_response(text: &str) -> ParsedFields {
    parse_with_markers(text, &RESPONSE_MARKERS)
}

/// Parse `text` against `markers`.
///
/// The last marker in `markers` is the anchor: its last occurrence opens
/// the search window, and an absent anchor yields all-`None`. Each marker
/// is then matched at its last occurrence inside the current window; the
/// field value runs from the marker to the first following newline, and
/// the window shrinks to end just before the match.
pub fn parse_with_markers(text: &str, markers: &[&str]) -> ParsedFields {
    let mut fields = ParsedFields::default();
    let Some(anchor) = markers.last() else {
        return fields;
    };
    let Some(start) = text.rfind(anchor) else {
        return fields;
    };

    let mut window = &text[start..];
    for marker in markers {
        if let Some(pos) = window.rfind(marker) {
            let rest = &window[pos + marker.len()..];
            let value = rest.split('\n').next().unwrap_or("").trim().to_string();
            fields.set(marker, value);
            window = &window[..pos];
        }
    }

    fields
}
