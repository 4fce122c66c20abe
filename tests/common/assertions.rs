//! Event collection helpers for integration tests

use agc_stream::Event;
use tokio::sync::broadcast;

/// Everything currently buffered on an event subscription
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Number of `Finished` events in `events`
pub fn count_finished(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::Finished { .. }))
        .count()
}

/// Whether any event is a receive or write failure
pub fn has_failure(events: &[Event]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, Event::ReceiveFailed { .. } | Event::WriteFailed { .. }))
}
