//! Pull JSON fragments out of free-form model output.
//!
//! Models wrap JSON in prose or markdown fences. These helpers locate the
//! first balanced `[...]` or `{...}` that is valid JSON and deserialize it
//! into a typed value, returning [`ParseError`] instead of panicking.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::ParseError;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid fence regex"));

/// Find the end (inclusive byte index) of the balanced group opening at `start`.
fn balanced_end(text: &str, start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// First balanced group in `text` that parses as JSON.
fn first_balanced<'a>(text: &'a str, open: char, close: char) -> Result<&'a str, ParseError> {
    let mut last_error = None;
    for (start, _) in text.match_indices(open) {
        let Some(end) = balanced_end(text, start, open, close) else {
            continue;
        };
        let candidate = &text[start..=end];
        match serde_json::from_str::<serde_json::Value>(candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) => last_error = Some(e),
        }
    }
    match last_error {
        Some(e) => Err(ParseError::Malformed(e)),
        None => Err(ParseError::NoJson {
            expected: if open == '[' { "array" } else { "object" },
        }),
    }
}

fn extract<'a>(text: &'a str, open: char, close: char) -> Result<&'a str, ParseError> {
    for caps in FENCED_BLOCK.captures_iter(text) {
        if let Some(inner) = caps.get(1)
            && let Ok(found) = first_balanced(inner.as_str(), open, close)
        {
            return Ok(found);
        }
    }
    first_balanced(text, open, close)
}

/// First valid JSON array in `text`.
pub fn extract_json_array(text: &str) -> Result<&str, ParseError> {
    extract(text, '[', ']')
}

/// First valid JSON object in `text`.
pub fn extract_json_object(text: &str) -> Result<&str, ParseError> {
    extract(text, '{', '}')
}

/// Extract the first JSON array and deserialize it.
pub fn parse_array<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let raw = extract_json_array(text)?;
    serde_json::from_str(raw).map_err(|e| ParseError::Schema(e.to_string()))
}

/// Extract the first JSON object and deserialize it.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let raw = extract_json_object(text)?;
    serde_json::from_str(raw).map_err(|e| ParseError::Schema(e.to_string()))
}
