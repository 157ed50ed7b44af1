//! API route handlers for the gateway.

use axum::{Json, extract::State};
use chrono::Local;
use std::sync::Arc;

use courier_core::{Document, Recipient, ScheduleDay, ScheduleKind, ScheduleRecord, Template};
use courier_scheduler::{dispatch, run_loop};

use super::server::AppState;

fn error_response(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "error", "message": message.into() }))
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "courier-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Dashboard snapshot — everything the UI needs in one call.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let doc = match state.ctx.store.load() {
        Ok(doc) => doc,
        Err(e) => return error_response(format!("Failed to load store: {e}")),
    };
    let (armed, next_run) = state.engine.lock().await.pending_summary();
    Json(serde_json::json!({
        "status": "success",
        "running": state.ctx.is_running(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "recipients": doc.recipients,
        "templates": doc.templates,
        "schedules": doc.schedules,
        "history": doc.history,
        "stats": doc.stats,
        "armed": armed,
        "next_run": next_run.map(|n| n.to_string()),
    }))
}

/// Start the bot: bring the messaging session up, recover schedules
/// from the store, and spawn the scheduler loop.
pub async fn start_bot(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    if state.ctx.is_running() {
        return Json(serde_json::json!({ "success": true, "message": "already running" }));
    }

    if let Err(e) = state.ctx.connect_transport().await {
        tracing::error!("❌ Failed to start transport: {e}");
        return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
    }

    state.ctx.start();
    let now = Local::now().naive_local();
    if let Err(e) = state.engine.lock().await.reconcile_all(now).await {
        // Store unavailable at startup is the one fatal condition.
        tracing::error!("❌ Schedule recovery failed: {e}");
        state.ctx.stop();
        state.ctx.disconnect_transport().await.ok();
        return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
    }

    let handle = tokio::spawn(run_loop(
        state.engine.clone(),
        state.ctx.clone(),
        state.config.scheduler.clone(),
    ));
    *state.loop_task.lock().await = Some(handle);

    tracing::info!("🚀 Bot started");
    Json(serde_json::json!({ "success": true }))
}

/// Stop the bot: clear the run flag and close the messaging session.
/// The loop observes the flag within one tick; in-flight one-shot
/// timers finish on their own.
pub async fn stop_bot(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.ctx.stop();
    if let Err(e) = state.ctx.disconnect_transport().await {
        tracing::warn!("⚠️ Transport disconnect: {e}");
    }
    state.loop_task.lock().await.take();
    tracing::info!("🛑 Bot stopped");
    Json(serde_json::json!({ "success": true }))
}

pub async fn list_recipients(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.ctx.store.load() {
        Ok(doc) => Json(serde_json::json!({ "status": "success", "recipients": doc.recipients })),
        Err(e) => error_response(format!("Failed to load store: {e}")),
    }
}

/// Add a new recipient.
pub async fn add_recipient(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let name = body["name"].as_str().unwrap_or("").trim().to_string();
    let phone_raw = body["phone"].as_str().unwrap_or("");
    let phone: String = phone_raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if name.is_empty() || phone.is_empty() {
        return error_response("Name and phone number are required");
    }

    let mut added: Option<Recipient> = None;
    let result = state.ctx.store.update(|doc| {
        if doc.has_phone(&phone) {
            return;
        }
        let recipient = Recipient {
            id: Document::next_id(doc.recipients.len()),
            name: name.clone(),
            phone: phone.clone(),
        };
        doc.recipients.push(recipient.clone());
        added = Some(recipient);
    });

    match (result, added) {
        (Err(e), _) => error_response(format!("Failed to add recipient: {e}")),
        (Ok(_), None) => error_response("Recipient with this phone number already exists"),
        (Ok(_), Some(recipient)) => Json(serde_json::json!({
            "status": "success",
            "message": "Recipient added successfully",
            "recipient": recipient,
        })),
    }
}

pub async fn list_templates(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.ctx.store.load() {
        Ok(doc) => Json(serde_json::json!({ "status": "success", "templates": doc.templates })),
        Err(e) => error_response(format!("Failed to load store: {e}")),
    }
}

/// Add a new message template.
pub async fn add_template(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let name = body["name"].as_str().unwrap_or("").trim().to_string();
    let content = body["content"].as_str().unwrap_or("").to_string();

    if name.is_empty() || content.is_empty() {
        return error_response("Template name and content are required");
    }

    let mut added: Option<Template> = None;
    let result = state.ctx.store.update(|doc| {
        if doc.has_template_name(&name) {
            return;
        }
        let template = Template {
            id: Document::next_id(doc.templates.len()),
            name: name.clone(),
            content: content.clone(),
        };
        doc.templates.push(template.clone());
        added = Some(template);
    });

    match (result, added) {
        (Err(e), _) => error_response(format!("Failed to add template: {e}")),
        (Ok(_), None) => error_response("A template with this name already exists"),
        (Ok(_), Some(template)) => Json(serde_json::json!({
            "status": "success",
            "message": "Template added successfully",
            "template": template,
        })),
    }
}

pub async fn list_schedules(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.ctx.store.load() {
        Ok(doc) => Json(serde_json::json!({ "status": "success", "schedules": doc.schedules })),
        Err(e) => error_response(format!("Failed to load store: {e}")),
    }
}

/// Create a new schedule record, arming it immediately when the bot is
/// already running.
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let kind = match body["type"].as_str() {
        Some("one_time") => ScheduleKind::OneTime,
        Some("daily") => ScheduleKind::Daily,
        Some("weekly") => ScheduleKind::Weekly,
        Some("monthly") => ScheduleKind::Monthly,
        _ => return error_response("Unknown schedule type"),
    };
    let time = body["time"].as_str().unwrap_or("").to_string();
    let recipient_id = body["recipient_id"].as_str().unwrap_or("").to_string();
    let template_id = body["template_id"].as_str().unwrap_or("").to_string();
    if time.is_empty() || recipient_id.is_empty() || template_id.is_empty() {
        return error_response("All fields are required");
    }

    // Per-type extras.
    let date = match kind {
        ScheduleKind::OneTime => match body["date"].as_str() {
            Some(d) => Some(d.to_string()),
            None => return error_response("Please select a date for one-time schedule"),
        },
        _ => None,
    };
    let day = match kind {
        ScheduleKind::Weekly => match body["day"].as_str() {
            Some(d) => Some(ScheduleDay::Weekday(d.to_string())),
            None => return error_response("Please select a day for weekly schedule"),
        },
        ScheduleKind::Monthly => {
            let day = match &body["day"] {
                serde_json::Value::Number(n) => {
                    n.as_u64().map(|d| ScheduleDay::DayOfMonth(d as u32))
                }
                serde_json::Value::String(s) => s.parse::<u32>().ok().map(ScheduleDay::DayOfMonth),
                _ => None,
            };
            match day {
                Some(d) => Some(d),
                None => return error_response("Please select a day of the month"),
            }
        }
        _ => None,
    };

    let doc = match state.ctx.store.load() {
        Ok(doc) => doc,
        Err(e) => return error_response(format!("Failed to load store: {e}")),
    };
    let Some(recipient) = doc.recipient_by_id(&recipient_id).cloned() else {
        return error_response("Selected recipient not found");
    };
    let Some(template) = doc.template_by_id(&template_id).cloned() else {
        return error_response("Selected template not found");
    };

    let record = ScheduleRecord {
        id: Document::next_id(doc.schedules.len()),
        kind,
        time,
        date,
        day,
        recipient_id,
        template_id,
        active: true,
    };
    tracing::info!(
        "📅 Creating schedule {} ({:?} at {})",
        record.id,
        record.kind,
        record.time
    );

    if let Err(e) = state.ctx.store.update(|doc| doc.schedules.push(record.clone())) {
        return error_response(format!("Failed to save schedule: {e}"));
    }

    // Arm right away when the loop is live; otherwise the next
    // reconciliation picks it up.
    if state.ctx.is_running() {
        let now = Local::now().naive_local();
        state
            .engine
            .lock()
            .await
            .arm(&record, &recipient, &template, now)
            .await;
    }

    Json(serde_json::json!({
        "status": "success",
        "message": "Message scheduled successfully",
        "schedule": record,
    }))
}

/// Manually trigger a reconciliation pass.
pub async fn check_schedules(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    tracing::info!("🔎 Manually triggered schedule check");
    let now = Local::now().naive_local();
    match state.engine.lock().await.reconcile_all(now).await {
        Ok(summary) => Json(serde_json::json!({
            "status": "success",
            "message": "Schedule check completed",
            "armed": summary.armed,
            "fired": summary.fired,
            "skipped": summary.skipped,
        })),
        Err(e) => error_response(format!("Schedule check failed: {e}")),
    }
}

/// Send a message immediately.
pub async fn send_now(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let recipient_id = body["recipient_id"].as_str().unwrap_or("");
    let template_id = body["template_id"].as_str().unwrap_or("");

    let doc = match state.ctx.store.load() {
        Ok(doc) => doc,
        Err(e) => {
            return Json(serde_json::json!({ "success": false, "error": format!("{e}") }));
        }
    };
    let (Some(recipient), Some(template)) = (
        doc.recipient_by_id(recipient_id).cloned(),
        doc.template_by_id(template_id).cloned(),
    ) else {
        return Json(
            serde_json::json!({ "success": false, "error": "Invalid recipient or template" }),
        );
    };

    let ok = dispatch(&state.ctx, &recipient, &template).await;
    Json(serde_json::json!({ "success": ok }))
}

pub async fn history(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.ctx.store.load() {
        Ok(doc) => Json(serde_json::json!({ "status": "success", "history": doc.history })),
        Err(e) => error_response(format!("Failed to load store: {e}")),
    }
}

/// Aggregate stats plus the live armed-trigger count from the engine.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let doc = match state.ctx.store.load() {
        Ok(doc) => doc,
        Err(e) => return error_response(format!("Failed to load store: {e}")),
    };
    let (armed, next_run) = state.engine.lock().await.pending_summary();
    Json(serde_json::json!({
        "status": "success",
        "stats": doc.stats,
        "armed": armed,
        "next_run": next_run.map(|n| n.to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier_core::{ConfigStore, CourierConfig, Transport};
    use courier_scheduler::EngineContext;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        fn name(&self) -> &str {
            "null"
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
            true
        }
    }

    fn test_state(name: &str) -> Arc<AppState> {
        let dir = std::env::temp_dir().join("courier-gateway-test").join(name);
        std::fs::remove_dir_all(&dir).ok();
        let store = ConfigStore::new(&dir.join("store.json"));
        let ctx = Arc::new(EngineContext::new(store, Box::new(NullTransport)));
        Arc::new(AppState::new(CourierConfig::default(), ctx))
    }

    #[tokio::test]
    async fn test_add_recipient_and_reject_duplicate() {
        let state = test_state("recipients");
        let body = serde_json::json!({ "name": "Ann", "phone": "+91 98765 43210" });

        let first = add_recipient(State(state.clone()), Json(body.clone())).await;
        assert_eq!(first.0["status"], "success");
        assert_eq!(first.0["recipient"]["phone"], "919876543210");

        let second = add_recipient(State(state), Json(body)).await;
        assert_eq!(second.0["status"], "error");
    }

    #[tokio::test]
    async fn test_add_template_rejects_duplicate_name_case_insensitive() {
        let state = test_state("templates");
        let first = add_template(
            State(state.clone()),
            Json(serde_json::json!({ "name": "Greeting", "content": "Hi {name}" })),
        )
        .await;
        assert_eq!(first.0["status"], "success");

        let second = add_template(
            State(state),
            Json(serde_json::json!({ "name": "GREETING", "content": "Hello {name}" })),
        )
        .await;
        assert_eq!(second.0["status"], "error");
    }

    #[tokio::test]
    async fn test_create_schedule_validates_references() {
        let state = test_state("schedules");
        let resp = create_schedule(
            State(state),
            Json(serde_json::json!({
                "type": "daily",
                "time": "09:00",
                "recipient_id": "1",
                "template_id": "1",
            })),
        )
        .await;
        assert_eq!(resp.0["status"], "error");
        assert_eq!(resp.0["message"], "Selected recipient not found");
    }

    #[tokio::test]
    async fn test_create_one_time_requires_date() {
        let state = test_state("one-time-date");
        add_recipient(
            State(state.clone()),
            Json(serde_json::json!({ "name": "Ann", "phone": "9876543210" })),
        )
        .await;
        add_template(
            State(state.clone()),
            Json(serde_json::json!({ "name": "Greeting", "content": "Hi {name}" })),
        )
        .await;

        let resp = create_schedule(
            State(state),
            Json(serde_json::json!({
                "type": "one_time",
                "time": "09:00",
                "recipient_id": "1",
                "template_id": "1",
            })),
        )
        .await;
        assert_eq!(resp.0["status"], "error");
    }

    #[tokio::test]
    async fn test_send_now_records_outcome() {
        let state = test_state("send-now");
        add_recipient(
            State(state.clone()),
            Json(serde_json::json!({ "name": "Ann", "phone": "9876543210" })),
        )
        .await;
        add_template(
            State(state.clone()),
            Json(serde_json::json!({ "name": "Greeting", "content": "Hi {name}" })),
        )
        .await;

        let resp = send_now(
            State(state.clone()),
            Json(serde_json::json!({ "recipient_id": "1", "template_id": "1" })),
        )
        .await;
        assert_eq!(resp.0["success"], true);

        let doc = state.ctx.store.load().unwrap();
        assert_eq!(doc.stats.total, 1);
        assert_eq!(doc.stats.successful, 1);
        assert_eq!(doc.history.len(), 1);
        assert_eq!(doc.history[0].message, "Hi Ann");
    }

    #[tokio::test]
    async fn test_send_now_invalid_reference() {
        let state = test_state("send-now-invalid");
        let resp = send_now(
            State(state),
            Json(serde_json::json!({ "recipient_id": "7", "template_id": "9" })),
        )
        .await;
        assert_eq!(resp.0["success"], false);
    }

    #[tokio::test]
    async fn test_health() {
        let resp = health_check().await;
        assert_eq!(resp.0["status"], "ok");
    }
}
