//! Pull a JSON payload out of free-form model output.
//!
//! Model replies wrap the object we asked for in markdown fences, prose
//! preambles, or trailing commentary, and occasionally leave trailing commas.
//! Candidates are tried in order:
//!
//! 1. the interior of the first fenced code block that contains a `{`;
//! 2. the span from the first `{` to the last `}` of the whole text.
//!
//! Each candidate is parsed strictly, then once more after stripping trailing
//! commas before `}`/`]`. The first candidate that parses wins.

use crate::error::{ProjgenError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

static FENCE_RE: OnceLock<Regex> = OnceLock::new();
static TRAILING_COMMA_RE: OnceLock<Regex> = OnceLock::new();

fn fence_re() -> &'static Regex {
    FENCE_RE.get_or_init(|| Regex::new(r"(?s)```[\w+\-]*[ \t]*\r?\n?(.*?)```").unwrap())
}

fn trailing_comma_re() -> &'static Regex {
    TRAILING_COMMA_RE.get_or_init(|| Regex::new(r",\s*([\]}])").unwrap())
}

/// Extract and parse the JSON value embedded in `text`.
///
/// Returns [`ProjgenError::NoJsonFound`] when no candidate exists at all and
/// [`ProjgenError::MalformedJson`] when candidates exist but none parse.
pub fn extract_json(text: &str) -> Result<Value> {
    let candidates = candidates(text);
    if candidates.is_empty() {
        return Err(ProjgenError::NoJsonFound);
    }

    let mut last_err = String::new();
    for candidate in candidates {
        match parse_with_repair(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_err = e.to_string(),
        }
    }
    Err(ProjgenError::MalformedJson(last_err))
}

/// Like [`extract_json`], but the payload must be a JSON object.
pub fn extract_object(text: &str) -> Result<Map<String, Value>> {
    match extract_json(text)? {
        Value::Object(map) => Ok(map),
        _ => Err(ProjgenError::NotAnObject),
    }
}

fn candidates(text: &str) -> Vec<&str> {
    let mut out = Vec::with_capacity(2);

    let fenced = fence_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|interior| interior.contains('{'));
    if let Some(interior) = fenced {
        out.push(interior.trim());
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            let span = &text[start..=end];
            if out.first() != Some(&span) {
                out.push(span);
            }
        }
    }

    out
}

fn parse_with_repair(candidate: &str) -> std::result::Result<Value, serde_json::Error> {
    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(_) => {
            let repaired = trailing_comma_re().replace_all(candidate, "$1");
            serde_json::from_str(&repaired)
        }
    }
}
