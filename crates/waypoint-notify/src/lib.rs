//! Real-time notification synchronization engine: merges a best-effort push
//! channel with a pull-based REST source of truth into one client-local,
//! eventually-consistent notification list.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod rest;
pub mod store;
pub mod toast;
pub mod transport;

#[cfg(test)]
mod tests;

pub use auth::{Credentials, Session, SessionGate};
pub use config::Config;
pub use engine::{SyncEngine, SyncHandle};
pub use error::NotifyError;
pub use model::{Notification, NotificationKind};
pub use rest::{NotificationApi, NotificationsClient};
pub use store::Snapshot;
pub use toast::Toast;
pub use transport::ConnectionState;
