//! Model reply post-processing
//!
//! Replies are expected as `{"regex": "..."}`, possibly wrapped in a
//! markdown code fence. Small models often forget to escape backslashes,
//! so a failed parse gets exactly one repair pass before giving up.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::TranslateError;

lazy_static! {
    /// Leading ``` or ```json fence
    static ref OPENING_FENCE: Regex = Regex::new(r"^```(?:json)?[ \t]*\r?\n?").unwrap();

    /// Trailing ``` fence
    static ref CLOSING_FENCE: Regex = Regex::new(r"\r?\n?```$").unwrap();

    /// Backslash-doubled quote escape left behind by the repair pass
    static ref DOUBLED_QUOTE_ESCAPE: Regex = Regex::new(r#"\\\\""#).unwrap();
}

#[derive(Debug, Deserialize)]
struct GeneratedRule {
    regex: String,
}

/// Trim the reply and drop surrounding code-fence markers.
pub fn strip_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    let opened = OPENING_FENCE.replace(trimmed, "");
    CLOSING_FENCE.replace(&opened, "").into_owned()
}

/// Escape every backslash, then collapse `\\"` back to `\"`.
pub fn repair(raw: &str) -> String {
    let doubled = raw.replace('\\', "\\\\");
    DOUBLED_QUOTE_ESCAPE
        .replace_all(&doubled, r#"\""#)
        .into_owned()
}

/// Recover the generated pattern from a raw model reply.
pub fn extract_pattern(reply: &str) -> Result<String, TranslateError> {
    let body = strip_fences(reply);
    match serde_json::from_str::<GeneratedRule>(&body) {
        Ok(rule) => Ok(rule.regex),
        Err(first) => {
            tracing::debug!(error = %first, "reply is not valid JSON; repairing escapes");
            serde_json::from_str::<GeneratedRule>(&repair(&body))
                .map(|rule| rule.regex)
                .map_err(|e| TranslateError::Parse {
                    reply: reply.to_string(),
                    message: e.to_string(),
                })
        }
    }
}
