//! Session listener dispatch: listener traits, per-endpoint listener
//! registrations, duplicate suppression, and the delivery task.

pub mod dedup;
pub mod dispatcher;
pub mod listener;
pub mod registry;

pub use dispatcher::{Dispatcher, Notification, NotificationBatch};
pub use listener::{SessionListener, SessionPortListener};
pub use registry::ListenerRegistry;
