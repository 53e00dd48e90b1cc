//! Tolerant parsing of provider responses.
//!
//! Providers are asked for JSON (or HTML for designs) but routinely wrap it in
//! prose, code fences, or leave trailing commas behind. Parsing never fails:
//! callers get either the parsed value or a caller-specific fallback, tagged so
//! they can count and report fallbacks.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::core::types::CopyArtifact;

/// Outcome of a tolerant parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Parsed(T),
    Fallback(T),
}

impl<T> Parsed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Parsed::Parsed(value) | Parsed::Fallback(value) => value,
        }
    }

    pub fn as_inner(&self) -> &T {
        match self {
            Parsed::Parsed(value) | Parsed::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Parsed::Fallback(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        match self {
            Parsed::Parsed(value) => Parsed::Parsed(f(value)),
            Parsed::Fallback(value) => Parsed::Fallback(f(value)),
        }
    }
}

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma regex should be valid"));

/// Parse a JSON object out of `raw`, trying progressively looser strategies.
///
/// 1. the whole string,
/// 2. the outermost `{...}` span,
/// 3. that span with newlines and trailing commas removed.
pub fn parse_json_lenient<T: DeserializeOwned>(raw: &str) -> Option<T> {
    if let Ok(value) = serde_json::from_str(raw.trim()) {
        return Some(value);
    }
    let span = outermost_object(raw)?;
    if let Ok(value) = serde_json::from_str(span) {
        return Some(value);
    }
    serde_json::from_str(&repair_json(span)).ok()
}

fn outermost_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn repair_json(span: &str) -> String {
    let flattened = span.replace("\r\n", " ").replace(['\n', '\r'], " ");
    TRAILING_COMMA_RE.replace_all(&flattened, "$1").into_owned()
}

/// Extract an HTML document from a design response.
///
/// A full doctype document wins, then a bare `<html>` element (a doctype is
/// prepended), then any fragment with a `<div` or `<body` gets wrapped in a
/// minimal document. Anything else is returned unchanged as a fallback.
pub fn extract_markup(raw: &str) -> Parsed<String> {
    let lower = raw.to_ascii_lowercase();

    if let Some(start) = lower.find("<!doctype html")
        && let Some(end) = lower[start..].rfind("</html>")
    {
        let end = start + end + "</html>".len();
        return Parsed::Parsed(raw[start..end].to_string());
    }

    if let Some(start) = lower.find("<html")
        && let Some(end) = lower[start..].rfind("</html>")
    {
        let end = start + end + "</html>".len();
        return Parsed::Parsed(format!("<!DOCTYPE html>\n{}", &raw[start..end]));
    }

    if lower.contains("<div") || lower.contains("<body") {
        return Parsed::Parsed(wrap_fragment(strip_code_fence(raw)));
    }

    Parsed::Fallback(raw.to_string())
}

fn wrap_fragment(fragment: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n</head>\n<body>\n{}\n</body>\n</html>",
        fragment.trim()
    )
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Clamp a provider-supplied score into `0..=100`, rounding fractions.
pub fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

fn score_from_value(value: &Value) -> u8 {
    match value {
        Value::Number(n) => n.as_f64().map_or(0, clamp_score),
        Value::String(s) => s.trim().parse::<f64>().map_or(0, clamp_score),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => 0,
    }
}

/// Accept numbers, numeric strings, or null for a score field.
pub fn de_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(score_from_value(&value))
}

/// Accept a map of category to loosely typed score; anything else becomes empty.
pub fn de_score_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<std::collections::BTreeMap<String, u8>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let Value::Object(map) = value else {
        return Ok(Default::default());
    };
    Ok(map
        .iter()
        .map(|(key, value)| (key.clone(), score_from_value(value)))
        .collect())
}

/// Accept an array of strings, a single string, or null.
pub fn de_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

/// Accept a string or null; other scalars are stringified.
pub fn de_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Accept a boolean or a `"true"`/`"false"` string; anything else is absent.
pub fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawCopy {
    #[serde(default, deserialize_with = "de_text", alias = "caption")]
    body: String,
    #[serde(default, deserialize_with = "de_string_list")]
    hashtags: Vec<String>,
    #[serde(default, deserialize_with = "de_text")]
    hook: String,
    #[serde(default, deserialize_with = "de_text")]
    cta: String,
}

/// Parse a copy response. An empty body counts as unparsable, and the raw
/// text becomes the body instead.
pub fn copy_from_response(raw: &str) -> Parsed<CopyArtifact> {
    match parse_json_lenient::<RawCopy>(raw) {
        Some(parsed) if !parsed.body.trim().is_empty() => {
            let body = parsed.body.trim().to_string();
            let hook = if parsed.hook.trim().is_empty() {
                CopyArtifact::fallback_from_text(&body).hook
            } else {
                parsed.hook.trim().to_string()
            };
            Parsed::Parsed(CopyArtifact {
                body,
                hashtags: parsed.hashtags,
                hook,
                cta: parsed.cta.trim().to_string(),
            })
        }
        _ => Parsed::Fallback(CopyArtifact::fallback_from_text(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        score: u32,
        tags: Vec<String>,
    }

    #[test]
    fn parses_plain_json() {
        let parsed: Sample = parse_json_lenient(r#"{"score": 5, "tags": ["a"]}"#).expect("parse");
        assert_eq!(
            parsed,
            Sample {
                score: 5,
                tags: vec!["a".to_string()]
            }
        );
    }

    #[test]
    fn extracts_json_embedded_in_prose() {
        let raw = "Here is my review:\n```json\n{\"score\": 7, \"tags\": []}\n```\nThanks!";
        let parsed: Sample = parse_json_lenient(raw).expect("parse");
        assert_eq!(parsed.score, 7);
    }

    #[test]
    fn repairs_trailing_commas_and_newlines() {
        let raw = "Result: {\n  \"score\": 9,\n  \"tags\": [\"x\", \"y\",],\n}";
        let parsed: Sample = parse_json_lenient(raw).expect("parse");
        assert_eq!(parsed.tags, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn unparsable_returns_none() {
        assert_eq!(parse_json_lenient::<Sample>("no json here"), None);
        assert_eq!(parse_json_lenient::<Sample>("} backwards {"), None);
    }

    #[test]
    fn clamp_score_rounds_and_bounds() {
        assert_eq!(clamp_score(79.6), 80);
        assert_eq!(clamp_score(-4.0), 0);
        assert_eq!(clamp_score(140.0), 100);
        assert_eq!(clamp_score(f64::NAN), 0);
    }

    #[test]
    fn markup_prefers_full_document() {
        let raw = "Sure!\n<!DOCTYPE html><html><body>hi</body></html>\nEnjoy";
        assert_eq!(
            extract_markup(raw),
            Parsed::Parsed("<!DOCTYPE html><html><body>hi</body></html>".to_string())
        );
    }

    #[test]
    fn markup_prepends_doctype_to_bare_html() {
        let parsed = extract_markup("```html\n<html><body>x</body></html>\n```");
        assert_eq!(
            parsed,
            Parsed::Parsed("<!DOCTYPE html>\n<html><body>x</body></html>".to_string())
        );
    }

    #[test]
    fn markup_wraps_fragments() {
        let parsed = extract_markup("```html\n<div class=\"card\">Hi</div>\n```");
        let Parsed::Parsed(doc) = parsed else {
            panic!("expected parsed markup");
        };
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<body>\n<div class=\"card\">Hi</div>\n</body>"));
    }

    #[test]
    fn markup_falls_back_to_raw_text() {
        let parsed = extract_markup("I cannot draw that");
        assert!(parsed.is_fallback());
        assert_eq!(parsed.into_inner(), "I cannot draw that");
    }

    #[test]
    fn copy_accepts_caption_and_derives_hook() {
        let parsed = copy_from_response(
            r#"{"caption": "First line\nMore", "hashtags": "morning", "cta": " Follow "}"#,
        );
        assert!(!parsed.is_fallback());
        let copy = parsed.into_inner();
        assert_eq!(copy.body, "First line\nMore");
        assert_eq!(copy.hook, "First line");
        assert_eq!(copy.hashtags, vec!["morning".to_string()]);
        assert_eq!(copy.cta, "Follow");
    }

    #[test]
    fn copy_without_json_uses_raw_text() {
        let parsed = copy_from_response("Good morning!\nStart slow.");
        assert!(parsed.is_fallback());
        let copy = parsed.into_inner();
        assert_eq!(copy.body, "Good morning!\nStart slow.");
        assert_eq!(copy.hook, "Good morning!");
    }
}
