//! # Courier Gateway
//! HTTP surface over the scheduler: recipient/template/schedule
//! management, bot lifecycle, immediate send, manual reconciliation,
//! and history/stats reads. Thin glue — all policy lives in the
//! scheduler crate.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, serve};
