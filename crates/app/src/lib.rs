//! # chathub-app
//!
//! Application layer: use-cases, **port definitions** (traits) and the
//! in-process machinery that keeps tenant sessions alive.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ChannelProvider` / `ChannelSession`: the third-party chat channel
//!   - `AutomationRepository`: CRUD for automation rules
//!   - `MessageStore`: append & query canonical inbound events
//!   - `EventPublisher`: session status notifications
//! - Drive tenant sessions:
//!   - `QrCodeCache`: short-lived pairing codes
//!   - `SessionRegistry`: organization → session, creation and teardown
//!   - `ConnectionWorker`: per-tenant state machine task
//! - Ingest inbound traffic:
//!   - `WebhookNormalizer`: heterogeneous payloads → canonical event, dedup
//!   - `MessageDispatcher`: concurrent fan-out to message handlers
//!   - `AutomationEngine` / `MessageLog`: the built-in handlers
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `chathub-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_engine;
pub mod dispatcher;
pub mod event_bus;
pub mod ingestion;
pub mod message_log;
pub mod normalizer;
pub mod ports;
pub mod qr_cache;
pub mod registry;
pub mod retry;
pub mod services;

mod worker;
