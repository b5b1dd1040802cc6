//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod automation_repo;
pub mod channel;
pub mod event_bus;
pub mod message_sender;
pub mod message_store;

pub use automation_repo::AutomationRepository;
pub use channel::{ChannelProvider, ChannelSession, ProviderEvent};
pub use event_bus::EventPublisher;
pub use message_sender::MessageSender;
pub use message_store::MessageStore;
