//! # chathub-domain
//!
//! Pure domain model for the chathub multi-tenant messaging system.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Sessions** (one channel connection per organization and its
//!   lifecycle state machine)
//! - Define **Messages** (canonical inbound events, outbound send requests,
//!   contacts and message snapshots read from a channel)
//! - Define **Webhook payload shapes** and their normalization into the
//!   canonical inbound event
//! - Define **Automation rules** (keyword → auto-reply)
//! - Define **Session events** (status-change notifications)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod event;
pub mod message;
pub mod session;
pub mod webhook;
