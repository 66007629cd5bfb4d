//! Extraction of image-generation directives from assistant text.
//!
//! Grammar (one directive per response, first occurrence wins):
//!
//! ```text
//! directive := "[GENERATE_IMAGE]" "{" body "}"
//! body      := pair ("," pair)*
//! pair      := key ":" value
//! key       := prompt | negative | resolution | response_during_generation
//!              (bare or double-quoted)
//! value     := JSON string | bare word
//! ```
//!
//! The body is matched non-greedily, so a `}` inside a value ends it.
//! Bare keys and bare-word values are quoted, then the body is parsed as a
//! JSON object. Any key outside the four above rejects the whole directive.

use crate::image::preset::Resolution;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

/// Literal token that introduces a directive
pub const DIRECTIVE_MARKER: &str = "[GENERATE_IMAGE]";

const KEYS: [&str; 4] = ["prompt", "negative", "resolution", "response_during_generation"];

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[GENERATE_IMAGE\]\{([\s\S]+?)\}").expect("directive pattern is valid")
});

/// Errors for a directive marker whose body cannot be used
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectiveError {
    #[error("Directive marker is not followed by a {{...}} body")]
    MissingBody,

    #[error("Directive body is not valid after repair: {0}")]
    Malformed(String),

    #[error("Unknown directive key: {0}")]
    UnknownKey(String),

    #[error("Directive value for '{0}' must be a string")]
    InvalidValue(String),

    #[error("Directive is missing a prompt")]
    MissingPrompt,

    #[error("Unknown resolution preset: {0}")]
    InvalidResolution(String),
}

/// A validated request for one image, embedded in an assistant response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationDirective {
    pub prompt: String,
    pub negative: Option<String>,
    pub resolution: Resolution,
    /// Status line shown to the user while the job runs
    pub response_during_generation: Option<String>,
}

/// True if `text` contains the directive marker at all
pub fn contains_directive(text: &str) -> bool {
    text.contains(DIRECTIVE_MARKER)
}

/// Extract the first directive in `text`.
///
/// Returns `Ok(None)` when no marker is present. A marker with an unusable
/// body is an error; callers treat it as "no directive" and warn.
pub fn extract_directive(text: &str) -> Result<Option<GenerationDirective>, DirectiveError> {
    if !contains_directive(text) {
        return Ok(None);
    }

    let body = DIRECTIVE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .ok_or(DirectiveError::MissingBody)?
        .as_str();

    parse_body(body).map(Some)
}

/// Quote bare keys and bare-word values so the body parses as JSON.
///
/// Text inside double-quoted strings is copied untouched. `true`, `false`
/// and `null` in value position stay unquoted.
pub fn repair_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 16);
    out.push('{');

    let mut chars = body.trim().chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut last_significant: Option<char> = None;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if c == '"' {
            in_string = true;
            last_significant = Some(c);
            out.push(c);
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut word = String::from(c);
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' || next == '-' {
                    word.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let literal = last_significant == Some(':')
                && matches!(word.as_str(), "true" | "false" | "null");
            if literal {
                out.push_str(&word);
            } else {
                out.push('"');
                out.push_str(&word);
                out.push('"');
            }
            last_significant = Some('"');
            continue;
        }

        if !c.is_whitespace() {
            last_significant = Some(c);
        }
        out.push(c);
    }

    out.push('}');
    out
}

fn parse_body(body: &str) -> Result<GenerationDirective, DirectiveError> {
    let repaired = repair_body(body);
    let fields: Map<String, Value> =
        serde_json::from_str(&repaired).map_err(|e| DirectiveError::Malformed(e.to_string()))?;

    if let Some(unknown) = fields.keys().find(|k| !KEYS.contains(&k.as_str())) {
        return Err(DirectiveError::UnknownKey(unknown.clone()));
    }

    let prompt = string_field(&fields, "prompt")?
        .filter(|p| !p.trim().is_empty())
        .ok_or(DirectiveError::MissingPrompt)?;

    let resolution = match string_field(&fields, "resolution")? {
        Some(name) => name
            .trim()
            .parse::<Resolution>()
            .map_err(|_| DirectiveError::InvalidResolution(name))?,
        None => Resolution::default(),
    };

    Ok(GenerationDirective {
        prompt,
        negative: string_field(&fields, "negative")?.filter(|n| !n.is_empty()),
        resolution,
        response_during_generation: string_field(&fields, "response_during_generation")?
            .filter(|r| !r.is_empty()),
    })
}

/// `null` and absent keys are both "not provided".
fn string_field(fields: &Map<String, Value>, key: &str) -> Result<Option<String>, DirectiveError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DirectiveError::InvalidValue(key.to_string())),
    }
}
