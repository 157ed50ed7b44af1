//! # Courier Core
//!
//! Shared foundation for the Courier message scheduler: the persisted
//! document model (recipients, templates, schedules, history, stats),
//! the whole-document JSON store, service configuration, error types,
//! and the `Transport` capability trait the dispatch path sends through.

pub mod config;
pub mod document;
pub mod error;
pub mod store;
pub mod traits;

pub use config::CourierConfig;
pub use document::{
    Document, HistoryEntry, Recipient, ScheduleDay, ScheduleKind, ScheduleRecord, SendStatus,
    Stats, Template,
};
pub use error::{CourierError, Result};
pub use store::ConfigStore;
pub use traits::Transport;
