use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::constants::{DEFAULT_CHAT_LIMIT, DEFAULT_HISTORY_WINDOW, DEFAULT_IMAGE_LIMIT};
use crate::core::rate_limit::RateLimitRule;
use crate::core::url_allowlist::UrlAllowlist;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Admission limit for chat messages
    pub chat_limit: Option<RateLimitRule>,
    /// Admission limit for image prompts
    pub image_limit: Option<RateLimitRule>,
    /// Replaces the built-in list of hosts allowed to serve generated images.
    /// Hostnames are matched exactly; no wildcards.
    pub trusted_image_domains: Option<Vec<String>>,
    /// How many prior messages accompany a chat request
    pub history_window: Option<usize>,
}

impl Config {
    pub fn chat_limit(&self) -> RateLimitRule {
        self.chat_limit.unwrap_or(DEFAULT_CHAT_LIMIT)
    }

    pub fn image_limit(&self) -> RateLimitRule {
        self.image_limit.unwrap_or(DEFAULT_IMAGE_LIMIT)
    }

    pub fn history_window(&self) -> usize {
        self.history_window.unwrap_or(DEFAULT_HISTORY_WINDOW)
    }

    pub fn image_allowlist(&self) -> UrlAllowlist {
        match &self.trusted_image_domains {
            Some(domains) => UrlAllowlist::new(domains),
            None => UrlAllowlist::default(),
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
