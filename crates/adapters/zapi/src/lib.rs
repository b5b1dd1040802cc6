//! # chathub-adapter-zapi
//!
//! Channel adapter for [Z-API](https://z-api.io), a hosted WhatsApp API.
//! Each organization maps to one Z-API instance; the adapter polls the
//! instance for pairing codes and connection status and forwards them as
//! provider events. Inbound messages reach chathub through the webhook
//! route, not through this adapter.
//!
//! ## Dependency rule
//!
//! Depends on `chathub-app` (port traits) and `chathub-domain` only.

mod client;
mod config;
mod error;
mod provider;

pub use client::ZapiClient;
pub use config::{ZapiConfig, ZapiInstance};
pub use error::ZapiError;
pub use provider::{ZapiProvider, ZapiSession};
