// crates/sluice-ledger/src/sink.rs
//
// Event sinks shipped with the ledger.

use std::sync::Mutex;

use tracing::info;

use sluice_core::events::LedgerEvent;
use sluice_core::traits::EventSink;

/// Keeps every published event in order. Used by the simulator and tests.
#[derive(Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn events(&self) -> Vec<LedgerEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemoryEventLog {
    fn publish(&self, event: &LedgerEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// Logs every event as structured JSON at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &LedgerEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        info!(event = event.name(), payload = %payload, "ledger event");
    }
}
