//! The channel discovery reports through.
//!
//! A [`ResultBus`] owns one sink behind a mutex, so concurrent reporters
//! never interleave events. The sink's return value tells the producer
//! whether to keep going; once a sink asks to stop, every later report
//! returns `false` as well.
mod event;
mod sinks;

pub use event::{DiscoveredCase, DiscoveryEvent};
pub use sinks::{CollectedEvents, CollectingSink, JsonLinesSink};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

/// Receives discovery events.
pub trait DiscoverySink: Send {
    /// Handles one event. Returns `false` to ask the producer to stop.
    fn on_event(&mut self, event: &DiscoveryEvent) -> bool;

    fn flush(&mut self) {}
}

pub struct ResultBus<S: DiscoverySink> {
    sink: Mutex<S>,
    stopped: AtomicBool,
    closed: AtomicBool,
}

impl<S: DiscoverySink> ResultBus<S> {
    /// Opens a bus over `sink` for one discovery session.
    pub fn acquire(sink: S) -> Self {
        debug!("result bus acquired");
        Self {
            sink: Mutex::new(sink),
            stopped: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers `event` and returns whether the producer should continue.
    /// Events reported after a shutdown are dropped.
    pub fn report(&self, event: &DiscoveryEvent) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            warn!(event = event.as_str(), "report after bus shutdown ignored");
            return false;
        }
        let keep_going = self.lock().on_event(event);
        if !keep_going && !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(event = event.as_str(), "sink requested stop");
        }
        trace!(event = event.as_str(), keep_going, "reported");
        !self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Flushes the sink. Only the first call has an effect.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.lock().flush();
        debug!("result bus shut down");
    }
}

impl<S: DiscoverySink> Drop for ResultBus<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn diagnostic(message: &str) -> DiscoveryEvent {
        DiscoveryEvent::Diagnostic {
            message: message.to_string(),
        }
    }

    #[test]
    fn test_report_delivers_in_order() {
        let sink = CollectingSink::new();
        let events = sink.handle();
        let bus = ResultBus::acquire(sink);
        assert!(bus.report(&diagnostic("one")));
        assert!(bus.report(&diagnostic("two")));
        let messages: Vec<_> = events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DiscoveryEvent::Diagnostic { message } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(messages, vec!["one", "two"]);
    }

    struct StopOnSecond {
        seen: usize,
    }

    impl DiscoverySink for StopOnSecond {
        fn on_event(&mut self, _event: &DiscoveryEvent) -> bool {
            self.seen += 1;
            self.seen < 2
        }
    }

    #[test]
    fn test_stop_is_sticky() {
        let bus = ResultBus::acquire(StopOnSecond { seen: 0 });
        assert!(bus.report(&diagnostic("a")));
        assert!(!bus.report(&diagnostic("b")));
        assert!(!bus.report(&diagnostic("c")));
        assert!(bus.is_stopped());
    }

    #[test]
    fn test_shutdown_flushes_once_and_on_drop() {
        let sink = CollectingSink::new();
        let events = sink.handle();
        {
            let bus = ResultBus::acquire(sink);
            bus.report(&diagnostic("a"));
        }
        assert!(events.is_flushed());

        let sink = CollectingSink::new();
        let events = sink.handle();
        let bus = ResultBus::acquire(sink);
        bus.shutdown();
        bus.shutdown();
        assert!(events.is_flushed());
        assert!(!bus.report(&diagnostic("late")));
        assert!(events.events().is_empty());
    }

    #[test]
    fn test_concurrent_reports_are_serialized() {
        let sink = CollectingSink::new();
        let events = sink.handle();
        let bus = Arc::new(ResultBus::acquire(sink));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        bus.report(&diagnostic(&format!("{i}-{j}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(events.events().len(), 100);
    }
}
