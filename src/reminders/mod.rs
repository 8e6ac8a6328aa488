//! Reminder delivery across the foreground and background contexts.
//!
//! The foreground [`watcher`] polls the service's due-check. The background
//! [`worker`] runs as a separate task that only receives [`protocol`] messages and
//! reads its own durable record. Both deliver through a [`notify::NotificationSink`].

/// Notification shape and delivery sinks
pub mod notify;
/// Sync messages and the durable reminder record
pub mod protocol;
/// Foreground polling and rollover loop
pub mod watcher;
/// Background worker task
pub mod worker;
