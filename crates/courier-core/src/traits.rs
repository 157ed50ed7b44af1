//! The transport capability — how composed messages leave the process.

use async_trait::async_trait;

use crate::error::Result;

/// A stateful messaging transport (in practice a browser-driven
/// WhatsApp Web session). One logical instance exists per process and
/// all sends serialize through it.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Bring the session up. May block for a long time (QR scan).
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Deliver a message to a digit-only phone number. May take tens
    /// of seconds. Never errors — a failed delivery is `false`.
    async fn send(&self, phone: &str, message: &str) -> bool;
}
