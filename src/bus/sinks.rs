use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

use super::{DiscoveryEvent, DiscoverySink};
use crate::model::TestCase;

/// Read handle onto the events a [`CollectingSink`] has received.
#[derive(Debug, Clone, Default)]
pub struct CollectedEvents {
    events: Arc<Mutex<Vec<DiscoveryEvent>>>,
    flushed: Arc<AtomicBool>,
}

impl CollectedEvents {
    pub fn events(&self) -> Vec<DiscoveryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cases(&self) -> Vec<TestCase> {
        self.events()
            .iter()
            .filter_map(|e| e.test_case().cloned())
            .collect()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::SeqCst)
    }

    fn push(&self, event: DiscoveryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Keeps every event in memory. Optionally asks to stop after a number of
/// discovered cases.
#[derive(Debug, Default)]
pub struct CollectingSink {
    collected: CollectedEvents,
    stop_after: Option<usize>,
    cases_seen: usize,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_after(cases: usize) -> Self {
        Self {
            stop_after: Some(cases),
            ..Self::default()
        }
    }

    pub fn handle(&self) -> CollectedEvents {
        self.collected.clone()
    }
}

impl DiscoverySink for CollectingSink {
    fn on_event(&mut self, event: &DiscoveryEvent) -> bool {
        if matches!(event, DiscoveryEvent::TestCaseDiscovered(_)) {
            self.cases_seen += 1;
        }
        self.collected.push(event.clone());
        self.stop_after.map_or(true, |limit| self.cases_seen < limit)
    }

    fn flush(&mut self) {
        self.collected.flushed.store(true, Ordering::SeqCst);
    }
}

/// Writes one JSON object per event and line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    stop_after: Option<usize>,
    cases_seen: usize,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stop_after: None,
            cases_seen: 0,
        }
    }

    pub fn with_stop_after(mut self, cases: Option<usize>) -> Self {
        self.stop_after = cases;
        self
    }

    fn write_event(&mut self, event: &DiscoveryEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write + Send> DiscoverySink for JsonLinesSink<W> {
    fn on_event(&mut self, event: &DiscoveryEvent) -> bool {
        if matches!(event, DiscoveryEvent::TestCaseDiscovered(_)) {
            self.cases_seen += 1;
        }
        if let Err(err) = self.write_event(event) {
            error!(event = event.as_str(), "failed to write event: {err}");
            return false;
        }
        self.stop_after.map_or(true, |limit| self.cases_seen < limit)
    }

    fn flush(&mut self) {
        if let Err(err) = self.writer.flush() {
            error!("failed to flush output: {err}");
        }
    }
}
