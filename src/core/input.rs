//! Untyped input as it arrives from a UI control or a decoded JSON body.
//!
//! The validators and sanitizers accept anything that converts into
//! [`RawInput`], so callers holding a `serde_json::Value` can hand it over
//! without checking its type first. Non-string values take the
//! "must be a string" branches instead of failing.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput<'a> {
    Text(&'a str),
    NotText,
}

impl<'a> RawInput<'a> {
    pub fn as_text(self) -> Option<&'a str> {
        match self {
            RawInput::Text(text) => Some(text),
            RawInput::NotText => None,
        }
    }
}

impl<'a> From<&'a str> for RawInput<'a> {
    fn from(text: &'a str) -> Self {
        RawInput::Text(text)
    }
}

impl<'a> From<&'a String> for RawInput<'a> {
    fn from(text: &'a String) -> Self {
        RawInput::Text(text.as_str())
    }
}

impl<'a> From<Option<&'a str>> for RawInput<'a> {
    fn from(text: Option<&'a str>) -> Self {
        text.map_or(RawInput::NotText, RawInput::Text)
    }
}

impl<'a> From<&'a Value> for RawInput<'a> {
    fn from(value: &'a Value) -> Self {
        value.as_str().map_or(RawInput::NotText, RawInput::Text)
    }
}
