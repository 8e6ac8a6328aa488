//! Core business logic - framework-agnostic habit tracking.
//!
//! Everything below [`service`] is pure and synchronous. [`service::HabitService`]
//! owns the state, pairs each mutation with a durable write, and publishes reminder
//! changes to the background worker.

/// Canonical `YYYY-MM-DD` date keys and local-time helpers
pub mod date_key;
/// Goal tables and yearly-to-monthly/daily derivation
pub mod goals;
/// Habit and category model
pub mod habit;
/// Sparse completion log
pub mod log_store;
/// Reminder settings, dedup ledger and the shared due-check
pub mod reminder;
/// Which habits are due on a date
pub mod schedule;
/// State-owning service, the only mutation surface
pub mod service;
/// The persisted application-state document
pub mod state;
/// Daily, monthly and yearly aggregation
pub mod stats;
/// Durable key-value document store
pub mod store;
