//! Support relay library: forwards private bot chats into forum topics of a
//! support group and back.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod resilience;
pub mod store;
pub mod transport;

pub use config::RelayConfig;
pub use lifecycle::Shutdown;
pub use store::MappingStore;
