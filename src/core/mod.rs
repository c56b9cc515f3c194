pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod gate;
pub mod input;
pub mod message;
pub mod rate_limit;
pub mod sanitize;
pub mod url_allowlist;
pub mod validation;
