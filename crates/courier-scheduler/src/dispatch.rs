//! The shared dispatch path — compose, send through the transport
//! gate, record the outcome. Used by one-shot timers, recurring fires,
//! and the immediate-send handler alike. Never panics, never
//! propagates: the worst outcome is a recorded `error` entry.

use courier_core::{Recipient, SendStatus, Template};

use crate::compose::compose;
use crate::context::EngineContext;
use crate::recorder;

/// Compose and deliver one message, recording the outcome. Returns
/// whether the transport reported success.
pub async fn dispatch(ctx: &EngineContext, recipient: &Recipient, template: &Template) -> bool {
    let message = match compose(template, recipient) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("📝 Compose failed for {}: {e}", recipient.name);
            // Original template content goes into the history so the
            // operator can see what failed to render.
            if let Err(e) = recorder::record(
                &ctx.store,
                &recipient.name,
                &template.content,
                SendStatus::Error,
            ) {
                tracing::warn!("⚠️ Failed to record dispatch outcome: {e}");
            }
            return false;
        }
    };

    let preview: String = message.chars().take(50).collect();
    tracing::info!(
        "📤 Dispatching to {} ({}): {preview}",
        recipient.name,
        recipient.phone
    );

    let ok = ctx.send(&recipient.phone, &message).await;
    let status = if ok {
        SendStatus::Success
    } else {
        SendStatus::Error
    };

    if let Err(e) = recorder::record(&ctx.store, &recipient.name, &message, status) {
        tracing::warn!("⚠️ Failed to record dispatch outcome: {e}");
    }

    if ok {
        tracing::info!("✅ Message sent to {}", recipient.name);
    } else {
        tracing::warn!("❌ Message to {} failed", recipient.name);
    }
    ok
}
