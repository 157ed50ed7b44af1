//! # Courier Scheduler
//!
//! The scheduling and dispatch engine: turns persisted schedule records
//! into timed executions, recovers them after restarts, and records
//! every delivery outcome.
//!
//! ## Architecture
//! ```text
//! SchedulerLoop (1s tokio interval, run flag on EngineContext)
//!   ├── recurring triggers (daily / weekly / monthly day-check)
//!   │     keyed by schedule id — re-arming replaces, never duplicates
//!   ├── one-shot timers (independent spawned tasks, own fire time)
//!   └── periodic reconcile — re-derives pending jobs from the store
//!
//! fire → compose template → Transport.send (single-slot gate)
//!      → DispatchRecorder (history entry + counters)
//! ```
//!
//! All failures below the loop are absorbed and logged; a bad record or
//! a failed send never takes the loop down.

pub mod compose;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod recorder;
pub mod runner;

pub use compose::compose;
pub use context::EngineContext;
pub use dispatch::dispatch;
pub use engine::{ArmOutcome, DueSend, ReconcileSummary, SchedulerEngine, SkipReason};
pub use runner::run_loop;
