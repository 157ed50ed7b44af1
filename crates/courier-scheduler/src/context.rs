//! Shared engine context — the store, the transport gate, and the run
//! flag. Owned by the service and passed by reference everywhere;
//! there is no ambient global state.

use std::sync::atomic::{AtomicBool, Ordering};

use courier_core::{ConfigStore, Result, Transport};

/// Everything the dispatch path needs, shared across the loop, one-shot
/// timers, and the request handlers.
pub struct EngineContext {
    pub store: ConfigStore,
    /// Single-slot gate: the transport is one stateful browser session,
    /// so at most one send is in flight — concurrent callers queue here.
    transport: tokio::sync::Mutex<Box<dyn Transport>>,
    running: AtomicBool,
}

impl EngineContext {
    pub fn new(store: ConfigStore, transport: Box<dyn Transport>) -> Self {
        Self {
            store,
            transport: tokio::sync::Mutex::new(transport),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Clears the run flag; the loop observes it within one tick.
    /// In-flight one-shot timers are left to finish on their own.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Serialize a send through the transport gate.
    pub async fn send(&self, phone: &str, message: &str) -> bool {
        self.transport.lock().await.send(phone, message).await
    }

    pub async fn connect_transport(&self) -> Result<()> {
        self.transport.lock().await.connect().await
    }

    pub async fn disconnect_transport(&self) -> Result<()> {
        self.transport.lock().await.disconnect().await
    }

    pub async fn transport_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }
}
