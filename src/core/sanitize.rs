//! HTML entity encoding for text headed to an HTML renderer.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::input::RawInput;

// `/` may already be encoded by the time these run.
static BASE64_IMAGE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)data:image(?:/|&#x2F;)[^;]+;base64,").expect("valid base64 image regex")
});
static SCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:javascript|vbscript):").expect("valid scheme regex"));

fn encode_entities(text: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' if encode_slash => out.push_str("&#x2F;"),
            other => out.push(other),
        }
    }
    out
}

/// Encode `& < > " ' /` as HTML entities.
///
/// Characters are rewritten in a single pass, so an `&` introduced by one
/// substitution is never encoded again.
///
/// ```
/// use chatguard::core::sanitize::sanitize_html;
///
/// assert_eq!(sanitize_html("<a href='/x'>"), "&lt;a href=&#x27;&#x2F;x&#x27;&gt;");
/// ```
pub fn sanitize_html(text: &str) -> String {
    encode_entities(text, true)
}

/// Like [`sanitize_html`] but leaves `/` alone. Non-string input yields `""`.
pub fn sanitize_text<'a>(input: impl Into<RawInput<'a>>) -> String {
    input
        .into()
        .as_text()
        .map(|text| encode_entities(text, false))
        .unwrap_or_default()
}

/// Sanitize content that came back from the completion service.
///
/// Applies [`sanitize_html`], then removes base64 image data prefixes and
/// `javascript:` / `vbscript:` schemes. Scheme removal repeats until nothing
/// matches so that nested spellings such as `javajavascript:script:` do not
/// reassemble. Non-string input yields `""`.
pub fn sanitize_api_response<'a>(input: impl Into<RawInput<'a>>) -> String {
    let Some(text) = input.into().as_text() else {
        return String::new();
    };

    let encoded = sanitize_html(text);
    let mut cleaned = BASE64_IMAGE_PREFIX.replace_all(&encoded, "").into_owned();
    loop {
        match SCRIPT_SCHEME.replace_all(&cleaned, "") {
            Cow::Borrowed(_) => break,
            Cow::Owned(next) => cleaned = next,
        }
    }
    cleaned
}
