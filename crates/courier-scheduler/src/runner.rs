//! The long-lived scheduler loop. Polls recurring triggers once a
//! second, re-derives pending jobs from the store on a slower cadence,
//! and emits a periodic summary line. One-shot timers fire on their own
//! and are not bound to the tick.
//!
//! The loop is never allowed to die on a single bad tick: failures are
//! logged and followed by a short back-off. It exits only when the run
//! flag on the context is cleared, observed within one tick.

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio::sync::Mutex;

use courier_core::config::SchedulerConfig;

use crate::context::EngineContext;
use crate::dispatch::dispatch;
use crate::engine::SchedulerEngine;

/// Run the scheduler loop until the context's run flag is cleared.
/// Spawn this as a background tokio task.
pub async fn run_loop(
    engine: Arc<Mutex<SchedulerEngine>>,
    ctx: Arc<EngineContext>,
    cfg: SchedulerConfig,
) {
    tracing::info!(
        "⏰ Scheduler loop started (tick {}s, summary {}s, reconcile {}s)",
        cfg.tick_secs,
        cfg.summary_secs,
        cfg.reconcile_secs
    );

    let tick = std::time::Duration::from_secs(cfg.tick_secs.max(1));
    let mut interval = tokio::time::interval(tick);
    let mut last_summary = Instant::now();
    let mut last_reconcile = Instant::now();

    while ctx.is_running() {
        interval.tick().await;
        if !ctx.is_running() {
            break;
        }
        let now = Local::now().naive_local();

        // Fire recurring triggers whose time has elapsed.
        let due = {
            let mut engine = engine.lock().await;
            engine.collect_due(now)
        };
        for plan in due {
            tracing::info!("🔔 Executing schedule {}", plan.schedule_id);
            dispatch(&ctx, &plan.recipient, &plan.template).await;
        }

        // Periodic recovery: re-derive pending jobs from the store.
        if last_reconcile.elapsed().as_secs() >= cfg.reconcile_secs {
            last_reconcile = Instant::now();
            let result = {
                let mut engine = engine.lock().await;
                engine.reconcile_all(now).await
            };
            if let Err(e) = result {
                tracing::error!(
                    "💥 Scheduler tick failed: {e} — backing off {}s",
                    cfg.backoff_secs
                );
                tokio::time::sleep(std::time::Duration::from_secs(cfg.backoff_secs)).await;
                continue;
            }
        }

        // Observability summary.
        if last_summary.elapsed().as_secs() >= cfg.summary_secs {
            last_summary = Instant::now();
            let (pending, next) = {
                let engine = engine.lock().await;
                engine.pending_summary()
            };
            match next {
                Some(next) => tracing::info!("📋 {pending} pending trigger(s), next run {next}"),
                None => tracing::info!("📋 No pending triggers"),
            }
        }
    }

    tracing::info!("🛑 Scheduler loop stopped");
}
