//! Schedule engine — converts schedule records into armed executions.
//!
//! One-time records become one-shot tokio timers; daily/weekly/monthly
//! records become recurring triggers polled by the scheduler loop.
//! Everything is keyed by schedule id: re-arming replaces the previous
//! registration (the old one-shot task is aborted), so repeated
//! reconciliation passes never duplicate a timer or double-send.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use courier_core::{
    Recipient, Result, ScheduleDay, ScheduleKind, ScheduleRecord, Template,
};

use crate::context::EngineContext;
use crate::dispatch;

/// Outcome of arming a single schedule record.
#[derive(Debug)]
pub enum ArmOutcome {
    /// A timer or recurring trigger is installed for `target`.
    Armed { target: NaiveDateTime },
    /// A slightly-late one-time record was sent inside the arming call.
    FiredImmediately,
    Skipped(SkipReason),
}

/// Why a record was not armed. Always logged, never raised.
#[derive(Debug)]
pub enum SkipReason {
    ParseError(String),
    /// One-time target more than a minute in the past.
    TooFarPast,
    /// One-time record that already fired this process.
    AlreadyFired,
    /// Unrecognized weekday name or day-of-month out of range.
    InvalidDay(String),
}

/// A recurring fire the loop should dispatch now.
#[derive(Debug, Clone)]
pub struct DueSend {
    pub schedule_id: String,
    pub recipient: Recipient,
    pub template: Template,
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileSummary {
    pub armed: usize,
    pub fired: usize,
    pub skipped: usize,
}

/// Calendar cadence of a recurring trigger. Monthly is a daily check
/// that only sends when the day-of-month matches.
#[derive(Debug, Clone, Copy)]
enum Cadence {
    Daily,
    Weekly(Weekday),
    Monthly(u32),
}

impl Cadence {
    fn label(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly(_) => "weekly",
            Cadence::Monthly(_) => "monthly",
        }
    }

    /// Earliest occurrence at or after `now`. Used when arming.
    fn next_from(&self, now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
        self.next_occurrence(now, at, true)
    }

    /// Earliest occurrence strictly after `now`. Used after a fire so a
    /// trigger goes dormant until the next calendar slot.
    fn next_after(&self, now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
        self.next_occurrence(now, at, false)
    }

    fn next_occurrence(&self, now: NaiveDateTime, at: NaiveTime, inclusive: bool) -> NaiveDateTime {
        let due = |candidate: NaiveDateTime| {
            if inclusive {
                candidate >= now
            } else {
                candidate > now
            }
        };
        match self {
            // Monthly triggers check every day at `at`; the day-of-month
            // match happens at fire time.
            Cadence::Daily | Cadence::Monthly(_) => {
                let today = now.date().and_time(at);
                if due(today) {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
            Cadence::Weekly(weekday) => {
                let mut date = now.date();
                for _ in 0..=7 {
                    if date.weekday() == *weekday {
                        let candidate = date.and_time(at);
                        if due(candidate) {
                            return candidate;
                        }
                    }
                    date += Duration::days(1);
                }
                // Cannot happen: a weekday recurs within 8 days.
                now.date().and_time(at) + Duration::days(7)
            }
        }
    }
}

struct OneShot {
    target: NaiveDateTime,
    handle: tokio::task::JoinHandle<()>,
}

struct Recurring {
    cadence: Cadence,
    at: NaiveTime,
    next_run: NaiveDateTime,
    recipient: Recipient,
    template: Template,
}

/// The scheduler engine — owns every armed trigger and timer.
pub struct SchedulerEngine {
    ctx: Arc<EngineContext>,
    one_shots: HashMap<String, OneShot>,
    recurring: HashMap<String, Recurring>,
    /// One-time schedule ids that already fired this process. Shared
    /// with the spawned timer tasks so a fire marks itself and repeated
    /// arming stays idempotent.
    fired_once: Arc<StdMutex<HashSet<String>>>,
}

impl SchedulerEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            one_shots: HashMap::new(),
            recurring: HashMap::new(),
            fired_once: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    /// Arm one schedule record. Malformed records are skipped and
    /// logged, never raised; a one-time record within the late window
    /// is sent synchronously inside this call.
    pub async fn arm(
        &mut self,
        record: &ScheduleRecord,
        recipient: &Recipient,
        template: &Template,
        now: NaiveDateTime,
    ) -> ArmOutcome {
        let at = match NaiveTime::parse_from_str(&record.time, "%H:%M") {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Schedule {}: bad time '{}' ({e}), skipping",
                    record.id,
                    record.time
                );
                return ArmOutcome::Skipped(SkipReason::ParseError(e.to_string()));
            }
        };

        match record.kind {
            ScheduleKind::OneTime => self.arm_one_time(record, recipient, template, at, now).await,
            ScheduleKind::Daily => {
                self.install(record, Cadence::Daily, at, now, recipient, template)
            }
            ScheduleKind::Weekly => {
                let name = match &record.day {
                    Some(ScheduleDay::Weekday(name)) => name.clone(),
                    _ => {
                        tracing::warn!("⚠️ Schedule {}: weekly without a weekday, skipping", record.id);
                        return ArmOutcome::Skipped(SkipReason::InvalidDay("missing weekday".into()));
                    }
                };
                // Unknown names are rejected outright rather than
                // silently falling back to some default day.
                match name.parse::<Weekday>() {
                    Ok(weekday) => {
                        self.install(record, Cadence::Weekly(weekday), at, now, recipient, template)
                    }
                    Err(_) => {
                        tracing::warn!(
                            "⚠️ Schedule {}: unknown weekday '{name}', skipping",
                            record.id
                        );
                        ArmOutcome::Skipped(SkipReason::InvalidDay(name))
                    }
                }
            }
            ScheduleKind::Monthly => {
                let day = match &record.day {
                    Some(ScheduleDay::DayOfMonth(d)) => Some(*d),
                    // Form submissions store the day as a string.
                    Some(ScheduleDay::Weekday(s)) => s.parse::<u32>().ok(),
                    None => None,
                };
                match day {
                    Some(d) if (1..=31).contains(&d) => {
                        self.install(record, Cadence::Monthly(d), at, now, recipient, template)
                    }
                    other => {
                        tracing::warn!(
                            "⚠️ Schedule {}: invalid day-of-month {:?}, skipping",
                            record.id,
                            other
                        );
                        ArmOutcome::Skipped(SkipReason::InvalidDay(format!("{other:?}")))
                    }
                }
            }
        }
    }

    async fn arm_one_time(
        &mut self,
        record: &ScheduleRecord,
        recipient: &Recipient,
        template: &Template,
        at: NaiveTime,
        now: NaiveDateTime,
    ) -> ArmOutcome {
        let Some(date_str) = record.date.as_deref() else {
            tracing::warn!("⚠️ Schedule {}: one-time without a date, skipping", record.id);
            return ArmOutcome::Skipped(SkipReason::ParseError("missing date".into()));
        };
        let date = match NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Schedule {}: bad date '{date_str}' ({e}), skipping",
                    record.id
                );
                return ArmOutcome::Skipped(SkipReason::ParseError(e.to_string()));
            }
        };
        let target = date.and_time(at);

        if self.fired_once.lock().unwrap().contains(&record.id) {
            tracing::debug!("Schedule {} already fired, not re-arming", record.id);
            return ArmOutcome::Skipped(SkipReason::AlreadyFired);
        }

        let delta = (target - now).num_seconds();
        if delta < -60 {
            tracing::warn!(
                "⏭️ Schedule {}: target {target} is {}s past, skipping",
                record.id,
                -delta
            );
            ArmOutcome::Skipped(SkipReason::TooFarPast)
        } else if delta < 0 {
            // Discovered slightly late — still send, exactly once.
            tracing::info!(
                "📨 Schedule {}: target {target} was {}s ago, sending immediately",
                record.id,
                -delta
            );
            self.fired_once.lock().unwrap().insert(record.id.clone());
            dispatch::dispatch(&self.ctx, recipient, template).await;
            ArmOutcome::FiredImmediately
        } else {
            tracing::info!(
                "⏱️ Armed one-time schedule {} for {target} (in {delta}s)",
                record.id
            );
            let ctx = self.ctx.clone();
            let fired = self.fired_once.clone();
            let id = record.id.clone();
            let recipient = recipient.clone();
            let template = template.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_secs(delta as u64)).await;
                // The insert doubles as a fired-exactly-once guard in
                // case an aborted predecessor raced this far.
                if fired.lock().unwrap().insert(id.clone()) {
                    tracing::info!("🔔 One-time schedule {id} fired");
                    dispatch::dispatch(&ctx, &recipient, &template).await;
                }
            });
            if let Some(prev) = self.one_shots.insert(record.id.clone(), OneShot { target, handle })
            {
                prev.handle.abort();
                tracing::debug!("Replaced pending timer for schedule {}", record.id);
            }
            ArmOutcome::Armed { target }
        }
    }

    fn install(
        &mut self,
        record: &ScheduleRecord,
        cadence: Cadence,
        at: NaiveTime,
        now: NaiveDateTime,
        recipient: &Recipient,
        template: &Template,
    ) -> ArmOutcome {
        let next_run = cadence.next_from(now, at);
        let replaced = self
            .recurring
            .insert(
                record.id.clone(),
                Recurring {
                    cadence,
                    at,
                    next_run,
                    recipient: recipient.clone(),
                    template: template.clone(),
                },
            )
            .is_some();
        tracing::info!(
            "🔁 Armed {} schedule {} at {}, next run {next_run}{}",
            cadence.label(),
            record.id,
            record.time,
            if replaced { " (replaced)" } else { "" }
        );
        ArmOutcome::Armed { target: next_run }
    }

    /// Collect recurring triggers whose scheduled time has elapsed and
    /// advance each to its next calendar slot. Monthly triggers whose
    /// check day does not match today advance without a send.
    pub fn collect_due(&mut self, now: NaiveDateTime) -> Vec<DueSend> {
        let mut due = Vec::new();
        for (id, trigger) in self.recurring.iter_mut() {
            if trigger.next_run > now {
                continue;
            }
            let fire = match trigger.cadence {
                Cadence::Monthly(day) => {
                    if now.day() == day {
                        true
                    } else {
                        tracing::info!(
                            "📆 Schedule {id}: today is day {}, waiting for day {day}",
                            now.day()
                        );
                        false
                    }
                }
                _ => true,
            };
            if fire {
                tracing::info!(
                    "🔔 Schedule {id} due (scheduled {}, now {now})",
                    trigger.next_run
                );
                due.push(DueSend {
                    schedule_id: id.clone(),
                    recipient: trigger.recipient.clone(),
                    template: trigger.template.clone(),
                });
            }
            trigger.next_run = trigger.cadence.next_after(now, trigger.at);
        }
        due
    }

    /// Re-derive every pending execution from the store: arm all active
    /// records whose target is inside the recovery window, drop
    /// registrations for records that are gone or inactive, and prune
    /// finished timers. Safe to call repeatedly — arming is idempotent
    /// by schedule id.
    pub async fn reconcile_all(&mut self, now: NaiveDateTime) -> Result<ReconcileSummary> {
        let doc = self.ctx.store.load()?;
        tracing::info!(
            "🔎 Reconciling {} schedule record(s) at {now}",
            doc.schedules.len()
        );

        let mut summary = ReconcileSummary::default();
        let mut seen: HashSet<String> = HashSet::new();

        for record in &doc.schedules {
            if !record.active {
                continue;
            }
            let Some(recipient) = doc.recipient_by_id(&record.recipient_id) else {
                tracing::warn!(
                    "⚠️ Schedule {}: recipient {} not found, skipping",
                    record.id,
                    record.recipient_id
                );
                summary.skipped += 1;
                continue;
            };
            let Some(template) = doc.template_by_id(&record.template_id) else {
                tracing::warn!(
                    "⚠️ Schedule {}: template {} not found, skipping",
                    record.id,
                    record.template_id
                );
                summary.skipped += 1;
                continue;
            };

            // Recovery considers one-time records up to five minutes
            // back; whether a considered record still fires is the
            // 60-second rule inside arm.
            if record.kind == ScheduleKind::OneTime
                && let Some(target) = one_time_target(record)
                && target < now - Duration::minutes(5)
            {
                tracing::info!(
                    "⏭️ Schedule {}: target {target} outside recovery window, skipping",
                    record.id
                );
                summary.skipped += 1;
                continue;
            }

            seen.insert(record.id.clone());
            match self.arm(record, recipient, template, now).await {
                ArmOutcome::Armed { .. } => summary.armed += 1,
                ArmOutcome::FiredImmediately => summary.fired += 1,
                ArmOutcome::Skipped(_) => summary.skipped += 1,
            }
        }

        self.recurring.retain(|id, _| seen.contains(id));
        self.one_shots.retain(|id, shot| {
            let keep = seen.contains(id) && !shot.handle.is_finished();
            if !keep && !shot.handle.is_finished() {
                shot.handle.abort();
            }
            keep
        });

        tracing::info!(
            "🔎 Reconcile done: {} armed, {} fired, {} skipped",
            summary.armed,
            summary.fired,
            summary.skipped
        );
        Ok(summary)
    }

    /// (pending trigger count, earliest next-run) for the periodic
    /// summary line and live stats.
    pub fn pending_summary(&self) -> (usize, Option<NaiveDateTime>) {
        let live_one_shots: Vec<NaiveDateTime> = self
            .one_shots
            .values()
            .filter(|s| !s.handle.is_finished())
            .map(|s| s.target)
            .collect();
        let count = live_one_shots.len() + self.recurring.len();
        let earliest = live_one_shots
            .into_iter()
            .chain(self.recurring.values().map(|t| t.next_run))
            .min();
        (count, earliest)
    }
}

/// Target wall-clock instant of a one-time record, if parseable.
fn one_time_target(record: &ScheduleRecord) -> Option<NaiveDateTime> {
    let at = NaiveTime::parse_from_str(&record.time, "%H:%M").ok()?;
    let date = NaiveDate::parse_from_str(record.date.as_deref()?, "%Y-%m-%d").ok()?;
    Some(date.and_time(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier_core::{ConfigStore, Document, SendStatus, Transport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockTransport {
        sends: Arc<AtomicUsize>,
        ok: bool,
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn name(&self) -> &str {
            "mock"
        }
        async fn connect(&mut self) -> courier_core::Result<()> {
            Ok(())
        }
        async fn disconnect(&mut self) -> courier_core::Result<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
        async fn send(&self, _phone: &str, _message: &str) -> bool {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.ok
        }
    }

    fn ctx_with_mock(name: &str, ok: bool) -> (Arc<EngineContext>, Arc<AtomicUsize>) {
        let dir = std::env::temp_dir().join("courier-engine-test").join(name);
        std::fs::remove_dir_all(&dir).ok();
        let store = ConfigStore::new(&dir.join("store.json"));
        let sends = Arc::new(AtomicUsize::new(0));
        let transport = MockTransport {
            sends: sends.clone(),
            ok,
        };
        (
            Arc::new(EngineContext::new(store, Box::new(transport))),
            sends,
        )
    }

    fn ann() -> Recipient {
        Recipient {
            id: "1".into(),
            name: "Ann".into(),
            phone: "919876543210".into(),
        }
    }

    fn greeting() -> Template {
        Template {
            id: "1".into(),
            name: "Greeting".into(),
            content: "Hi {name}".into(),
        }
    }

    fn one_time(id: &str, date: &str, time: &str) -> ScheduleRecord {
        ScheduleRecord {
            id: id.into(),
            kind: ScheduleKind::OneTime,
            time: time.into(),
            date: Some(date.into()),
            day: None,
            recipient_id: "1".into(),
            template_id: "1".into(),
            active: true,
        }
    }

    fn recurring(id: &str, kind: ScheduleKind, time: &str, day: Option<ScheduleDay>) -> ScheduleRecord {
        ScheduleRecord {
            id: id.into(),
            kind,
            time: time.into(),
            date: None,
            day,
            recipient_id: "1".into(),
            template_id: "1".into(),
            active: true,
        }
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let t = NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap();
        d.and_time(t)
    }

    #[tokio::test]
    async fn test_late_one_time_fires_immediately_once() {
        let (ctx, sends) = ctx_with_mock("late-once", true);
        let mut engine = SchedulerEngine::new(ctx.clone());
        let now = at("2026-08-05", "10:00:30");

        let outcome = engine
            .arm(&one_time("1", "2026-08-05", "10:00"), &ann(), &greeting(), now)
            .await;
        assert!(matches!(outcome, ArmOutcome::FiredImmediately));
        assert_eq!(sends.load(Ordering::SeqCst), 1);

        let doc = ctx.store.load().unwrap();
        assert_eq!(doc.history.len(), 1);
        assert_eq!(doc.history[0].message, "Hi Ann");
        assert_eq!(doc.history[0].status, SendStatus::Success);
        assert_eq!(doc.stats.total, 1);
        assert_eq!(doc.stats.successful, 1);
    }

    #[tokio::test]
    async fn test_too_far_past_is_skipped_without_send() {
        let (ctx, sends) = ctx_with_mock("too-far-past", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "10:02:00");

        let outcome = engine
            .arm(&one_time("1", "2026-08-05", "10:00"), &ann(), &greeting(), now)
            .await;
        assert!(matches!(
            outcome,
            ArmOutcome::Skipped(SkipReason::TooFarPast)
        ));
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rearming_fired_one_time_does_not_double_send() {
        let (ctx, sends) = ctx_with_mock("no-double-send", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "10:00:30");
        let record = one_time("1", "2026-08-05", "10:00");

        let first = engine.arm(&record, &ann(), &greeting(), now).await;
        assert!(matches!(first, ArmOutcome::FiredImmediately));

        let second = engine.arm(&record, &ann(), &greeting(), now).await;
        assert!(matches!(
            second,
            ArmOutcome::Skipped(SkipReason::AlreadyFired)
        ));
        assert_eq!(sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconcile_twice_sends_once() {
        let (ctx, sends) = ctx_with_mock("reconcile-twice", true);
        let mut doc = Document::default();
        doc.recipients.push(ann());
        doc.templates.push(greeting());
        doc.schedules.push(one_time("1", "2026-08-05", "10:00"));
        ctx.store.save(&doc).unwrap();

        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "10:00:30");

        let first = engine.reconcile_all(now).await.unwrap();
        assert_eq!(first.fired, 1);

        let second = engine.reconcile_all(now).await.unwrap();
        assert_eq!(second.fired, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconcile_skips_stale_one_time() {
        let (ctx, sends) = ctx_with_mock("reconcile-stale", true);
        let mut doc = Document::default();
        doc.recipients.push(ann());
        doc.templates.push(greeting());
        doc.schedules.push(one_time("1", "2026-08-05", "09:00"));
        ctx.store.save(&doc).unwrap();

        let mut engine = SchedulerEngine::new(ctx);
        let summary = engine.reconcile_all(at("2026-08-05", "10:00:00")).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.fired, 0);
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reconcile_skips_missing_references() {
        let (ctx, sends) = ctx_with_mock("reconcile-missing", true);
        let mut doc = Document::default();
        // No recipients or templates at all.
        doc.schedules
            .push(recurring("1", ScheduleKind::Daily, "09:00", None));
        ctx.store.save(&doc).unwrap();

        let mut engine = SchedulerEngine::new(ctx);
        let summary = engine.reconcile_all(at("2026-08-05", "08:00:00")).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.armed, 0);
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reconcile_drops_inactive_registrations() {
        let (ctx, _sends) = ctx_with_mock("reconcile-inactive", true);
        let mut doc = Document::default();
        doc.recipients.push(ann());
        doc.templates.push(greeting());
        doc.schedules
            .push(recurring("1", ScheduleKind::Daily, "09:00", None));
        ctx.store.save(&doc).unwrap();

        let mut engine = SchedulerEngine::new(ctx.clone());
        let now = at("2026-08-05", "08:00:00");
        engine.reconcile_all(now).await.unwrap();
        assert_eq!(engine.pending_summary().0, 1);

        // Deactivate the record; the next pass must drop its trigger.
        let mut doc = ctx.store.load().unwrap();
        doc.schedules[0].active = false;
        ctx.store.save(&doc).unwrap();

        engine.reconcile_all(now).await.unwrap();
        assert_eq!(engine.pending_summary().0, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_future_one_time_fires_at_target() {
        let (ctx, sends) = ctx_with_mock("future-one-time", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "09:58:00");

        // Two minutes out.
        let outcome = engine
            .arm(&one_time("1", "2026-08-05", "10:00"), &ann(), &greeting(), now)
            .await;
        assert!(matches!(outcome, ArmOutcome::Armed { .. }));
        assert_eq!(engine.pending_summary().0, 1);

        // Let the timer task register its sleep.
        tokio::task::yield_now().await;
        assert_eq!(sends.load(Ordering::SeqCst), 0);

        tokio::time::advance(std::time::Duration::from_secs(119)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(sends.load(Ordering::SeqCst), 0, "must not fire early");

        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(sends.load(Ordering::SeqCst), 1, "fires exactly once at target");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_future_one_time_replaces_timer() {
        let (ctx, sends) = ctx_with_mock("replace-timer", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "09:58:00");
        let record = one_time("1", "2026-08-05", "10:00");

        engine.arm(&record, &ann(), &greeting(), now).await;
        engine.arm(&record, &ann(), &greeting(), now).await;
        assert_eq!(engine.pending_summary().0, 1);

        tokio::task::yield_now().await;
        tokio::time::advance(std::time::Duration::from_secs(180)).await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(sends.load(Ordering::SeqCst), 1, "replaced timer must not double-send");
    }

    #[tokio::test]
    async fn test_daily_fires_once_then_dormant_until_next_day() {
        let (ctx, _sends) = ctx_with_mock("daily-dormant", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "08:59:59");

        let outcome = engine
            .arm(
                &recurring("2", ScheduleKind::Daily, "09:00", None),
                &ann(),
                &greeting(),
                now,
            )
            .await;
        assert!(matches!(outcome, ArmOutcome::Armed { target } if target == at("2026-08-05", "09:00:00")));

        assert!(engine.collect_due(at("2026-08-05", "08:59:59")).is_empty());

        let due = engine.collect_due(at("2026-08-05", "09:00:00"));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].schedule_id, "2");

        assert!(engine.collect_due(at("2026-08-05", "09:00:01")).is_empty());
        assert!(engine.collect_due(at("2026-08-05", "23:59:59")).is_empty());

        let next_day = engine.collect_due(at("2026-08-06", "09:00:00"));
        assert_eq!(next_day.len(), 1);
    }

    #[tokio::test]
    async fn test_rearming_daily_replaces_trigger() {
        let (ctx, _sends) = ctx_with_mock("daily-replace", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "08:00:00");
        let record = recurring("2", ScheduleKind::Daily, "09:00", None);

        engine.arm(&record, &ann(), &greeting(), now).await;
        engine.arm(&record, &ann(), &greeting(), now).await;
        assert_eq!(engine.pending_summary().0, 1);

        let due = engine.collect_due(at("2026-08-05", "09:00:00"));
        assert_eq!(due.len(), 1, "replaced trigger fires once, not twice");
    }

    #[tokio::test]
    async fn test_weekly_arms_on_named_weekday() {
        let (ctx, _sends) = ctx_with_mock("weekly", true);
        let mut engine = SchedulerEngine::new(ctx);
        // 2026-08-05 is a Wednesday.
        let now = at("2026-08-05", "10:00:00");

        let outcome = engine
            .arm(
                &recurring(
                    "3",
                    ScheduleKind::Weekly,
                    "09:00",
                    Some(ScheduleDay::Weekday("friday".into())),
                ),
                &ann(),
                &greeting(),
                now,
            )
            .await;
        assert!(matches!(outcome, ArmOutcome::Armed { target } if target == at("2026-08-07", "09:00:00")));

        assert!(engine.collect_due(at("2026-08-06", "09:00:00")).is_empty());
        assert_eq!(engine.collect_due(at("2026-08-07", "09:00:00")).len(), 1);
    }

    #[tokio::test]
    async fn test_weekly_unknown_day_is_rejected() {
        let (ctx, _sends) = ctx_with_mock("weekly-bad-day", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "10:00:00");

        let outcome = engine
            .arm(
                &recurring(
                    "3",
                    ScheduleKind::Weekly,
                    "09:00",
                    Some(ScheduleDay::Weekday("someday".into())),
                ),
                &ann(),
                &greeting(),
                now,
            )
            .await;
        assert!(matches!(
            outcome,
            ArmOutcome::Skipped(SkipReason::InvalidDay(_))
        ));
        assert_eq!(engine.pending_summary().0, 0);
    }

    #[tokio::test]
    async fn test_monthly_short_month_never_fires() {
        let (ctx, _sends) = ctx_with_mock("monthly-short", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-04-29", "08:00:00");

        engine
            .arm(
                &recurring(
                    "4",
                    ScheduleKind::Monthly,
                    "09:00",
                    Some(ScheduleDay::DayOfMonth(31)),
                ),
                &ann(),
                &greeting(),
                now,
            )
            .await;

        // April has 30 days — the daily check passes through without a send.
        assert!(engine.collect_due(at("2026-04-29", "09:00:00")).is_empty());
        assert!(engine.collect_due(at("2026-04-30", "09:00:00")).is_empty());

        // Day 31 does exist in May.
        assert_eq!(engine.collect_due(at("2026-05-31", "09:00:00")).len(), 1);
    }

    #[tokio::test]
    async fn test_monthly_day_as_string_is_accepted() {
        let (ctx, _sends) = ctx_with_mock("monthly-string", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "08:00:00");

        let outcome = engine
            .arm(
                &recurring(
                    "4",
                    ScheduleKind::Monthly,
                    "09:00",
                    Some(ScheduleDay::Weekday("15".into())),
                ),
                &ann(),
                &greeting(),
                now,
            )
            .await;
        assert!(matches!(outcome, ArmOutcome::Armed { .. }));
        assert_eq!(engine.collect_due(at("2026-08-15", "09:00:00")).len(), 1);
    }

    #[tokio::test]
    async fn test_bad_time_is_parse_skip() {
        let (ctx, sends) = ctx_with_mock("bad-time", true);
        let mut engine = SchedulerEngine::new(ctx);
        let now = at("2026-08-05", "08:00:00");

        let outcome = engine
            .arm(
                &recurring("5", ScheduleKind::Daily, "9 o'clock", None),
                &ann(),
                &greeting(),
                now,
            )
            .await;
        assert!(matches!(
            outcome,
            ArmOutcome::Skipped(SkipReason::ParseError(_))
        ));
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_send_records_error() {
        let (ctx, sends) = ctx_with_mock("failed-send", false);
        let ok = dispatch::dispatch(&ctx, &ann(), &greeting()).await;
        assert!(!ok);
        assert_eq!(sends.load(Ordering::SeqCst), 1);

        let doc = ctx.store.load().unwrap();
        assert_eq!(doc.history.len(), 1);
        assert_eq!(doc.history[0].status, SendStatus::Error);
        assert_eq!(doc.stats.total, 1);
        assert_eq!(doc.stats.failed, 1);
        assert_eq!(doc.stats.successful, 0);
    }

    #[tokio::test]
    async fn test_compose_failure_is_dispatch_error() {
        let (ctx, sends) = ctx_with_mock("compose-fail", true);
        let bad = Template {
            id: "1".into(),
            name: "Bad".into(),
            content: "You are {age}".into(),
        };
        let ok = dispatch::dispatch(&ctx, &ann(), &bad).await;
        assert!(!ok);
        assert_eq!(sends.load(Ordering::SeqCst), 0, "nothing reaches the transport");

        let doc = ctx.store.load().unwrap();
        assert_eq!(doc.history.len(), 1);
        assert_eq!(doc.history[0].status, SendStatus::Error);
        assert_eq!(doc.history[0].message, "You are {age}");
        assert_eq!(doc.stats.failed, 1);
    }

    #[test]
    fn test_one_time_target_parsing() {
        let record = one_time("1", "2026-08-05", "10:00");
        assert_eq!(one_time_target(&record), Some(at("2026-08-05", "10:00:00")));

        let bad = one_time("1", "not-a-date", "10:00");
        assert_eq!(one_time_target(&bad), None);
    }
}
