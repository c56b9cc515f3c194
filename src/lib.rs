//! Chatguard is the client-side safety and streaming layer of a chat client
//! that talks to a remote completion service.
//!
//! The crate is organized around a small set of collaborating pieces:
//! - [`core::validation`] accepts or rejects chat text and image prompts
//!   before they leave the client, using the entity encoders in
//!   [`core::sanitize`] for anything rendered as HTML.
//! - [`core::rate_limit`] applies per-action sliding-window limits.
//! - [`core::url_allowlist`] decides whether an image URL returned by the
//!   service may be displayed.
//! - [`core::chat_stream`] turns a newline-delimited JSON byte stream into
//!   ordered content deltas and a single terminal event.
//! - [`core::gate`] strings these together into request payloads defined in
//!   [`api`].
//!
//! The binary (`src/main.rs`) routes through [`cli::main`], which exposes the
//! same checks on the command line.

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
