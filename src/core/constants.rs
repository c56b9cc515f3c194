//! Shared constants used across the application

use crate::core::rate_limit::RateLimitRule;

/// Longest chat message accepted, in UTF-16 code units after trimming.
pub const MAX_CHAT_INPUT_UNITS: usize = 4000;

/// Longest image prompt accepted, in UTF-16 code units after trimming.
pub const MAX_IMAGE_PROMPT_UNITS: usize = 1000;

/// Hosts allowed to serve generated images.
pub const TRUSTED_IMAGE_DOMAINS: &[&str] = &[
    "oaidalleapiprodscus.blob.core.windows.net",
    "cdn.openai.com",
    "images.openai.com",
];

/// Rate limiter keys for the two outbound request kinds.
pub const CHAT_ACTION_KEY: &str = "chat";
pub const IMAGE_ACTION_KEY: &str = "image";

/// Number of prior messages forwarded with a chat request.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const DEFAULT_IMAGE_QUALITY: &str = "standard";

pub const DEFAULT_CHAT_LIMIT: RateLimitRule = RateLimitRule::new(10, 60_000);
pub const DEFAULT_IMAGE_LIMIT: RateLimitRule = RateLimitRule::new(5, 60_000);
