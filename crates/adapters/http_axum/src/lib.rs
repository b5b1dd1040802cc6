//! # chathub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the JSON API: session lifecycle, sending and reading messages,
//!   automation rules, and the persisted inbox
//! - Accept provider webhooks and acknowledge them unconditionally
//! - Stream session events to browsers over SSE
//! - Map [`ChatHubError`](chathub_domain::error::ChatHubError) to HTTP status codes
//!
//! ## Dependency rule
//! Depends on `chathub-app` (for port traits and services) and `chathub-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
mod testing;
