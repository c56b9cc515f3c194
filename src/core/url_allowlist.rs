//! Gate for image URLs received from the completion service.
//!
//! A URL passes only when it parses, uses `https`, and its hostname is one of
//! the trusted domains exactly. There is no suffix or subdomain matching:
//! `evil.cdn.openai.com` is as untrusted as `example.com`.

use std::collections::HashSet;

use reqwest::Url;
use tracing::debug;

use crate::core::constants::TRUSTED_IMAGE_DOMAINS;
use crate::core::input::RawInput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlAllowlist {
    domains: HashSet<String>,
}

impl Default for UrlAllowlist {
    fn default() -> Self {
        Self::new(TRUSTED_IMAGE_DOMAINS.iter().copied())
    }
}

impl UrlAllowlist {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|domain| domain.as_ref().trim().to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        Self { domains }
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    /// Parse `raw` and return it only if it is safe to use as an image source.
    pub fn parse_trusted<'a>(&self, raw: impl Into<RawInput<'a>>) -> Option<Url> {
        let raw = raw.into().as_text()?;

        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            debug!("image url rejected: empty or contains whitespace");
            return None;
        }

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(err) => {
                debug!(error = %err, "image url rejected: does not parse");
                return None;
            }
        };

        if url.scheme() != "https" {
            debug!(scheme = url.scheme(), "image url rejected: scheme is not https");
            return None;
        }

        match url.host_str() {
            Some(host) if self.domains.contains(host) => Some(url),
            host => {
                debug!(host = ?host, "image url rejected: host not trusted");
                None
            }
        }
    }

    pub fn is_trusted<'a>(&self, raw: impl Into<RawInput<'a>>) -> bool {
        self.parse_trusted(raw).is_some()
    }
}

/// Check `raw` against the built-in list of trusted image hosts.
pub fn validate_image_url<'a>(raw: impl Into<RawInput<'a>>) -> bool {
    UrlAllowlist::default().is_trusted(raw)
}
