//! Dispatch outcome recording — one history entry plus counter updates
//! per attempted send, through a single whole-document update.

use chrono::Local;

use courier_core::{ConfigStore, HistoryEntry, Result, SendStatus};

/// Append a history entry and bump the aggregate counters.
/// `total` always equals `successful + failed` afterwards; the store's
/// atomic save keeps the document intact even on a crash mid-update.
pub fn record(
    store: &ConfigStore,
    recipient_name: &str,
    message: &str,
    status: SendStatus,
) -> Result<()> {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    store.update(|doc| {
        doc.history.push(HistoryEntry {
            recipient: recipient_name.to_string(),
            message: message.to_string(),
            status,
            timestamp,
        });
        doc.stats.total += 1;
        match status {
            SendStatus::Success => doc.stats.successful += 1,
            SendStatus::Error => doc.stats.failed += 1,
        }
    })?;
    Ok(())
}
