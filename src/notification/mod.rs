//! Notification data model.

mod types;

pub use types::Notification;
