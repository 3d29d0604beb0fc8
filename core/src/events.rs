//! Change notifications for layers built on top of the store.
//!
//! Every successful mutation emits a `ChangeEvent` on an mpsc channel so
//! that permission caches can be invalidated. Sending never blocks and a
//! dropped receiver is ignored.

use std::sync::mpsc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;


/// What part of an entity changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    Permissions,
    Options,
    Parents,
    /// A virtual entity was materialized by an explicit save.
    Saved,
    /// The entity was deleted, explicitly or by an emptiness cascade.
    Removed,
    Renamed { from: String },
}


/// One attribute change of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub namespace: String,
    pub entity: String,
    /// `None` for the common context.
    pub context: Option<String>,
    pub change: ChangeKind,
}


/// Sending half of the change channel. Cloning shares the channel.
#[derive(Debug, Default)]
pub struct EventSink {
    sender: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
}

impl EventSink {
    /// A sink plus the receiver its events arrive on.
    pub fn channel() -> (EventSink, mpsc::Receiver<ChangeEvent>) {
        let (sender, receiver) = mpsc::channel();
        let sink = EventSink {
            sender: Mutex::new(Some(sender)),
        };
        (sink, receiver)
    }

    /// A sink that drops every event.
    pub fn disabled() -> EventSink {
        EventSink::default()
    }

    pub(crate) fn emit(&self, event: ChangeEvent) {
        let mut sender = self.sender.lock();
        if let Some(tx) = sender.as_ref() {
            if tx.send(event).is_err() {
                trace!("change receiver dropped; disabling notifications");
                *sender = None;
            }
        }
    }
}

impl Clone for EventSink {
    fn clone(&self) -> Self {
        EventSink {
            sender: Mutex::new(self.sender.lock().clone()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn event(entity: &str) -> ChangeEvent {
        ChangeEvent {
            namespace: "users".into(),
            entity: entity.into(),
            context: None,
            change: ChangeKind::Permissions,
        }
    }

    #[test]
    fn emitted_events_arrive_in_order() {
        let (sink, rx) = EventSink::channel();
        sink.emit(event("a"));
        sink.clone().emit(event("b"));
        let got: Vec<String> = rx.try_iter().map(|e| e.entity).collect();
        assert_eq!(got, vec!["a", "b"]);
    }

    #[test]
    fn disabled_sink_drops_silently() {
        EventSink::disabled().emit(event("a"));
    }

    #[test]
    fn dropped_receiver_does_not_fail() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(event("a"));
        sink.emit(event("b"));
        assert!(sink.sender.lock().is_none());
    }

    #[test]
    fn change_kind_wire_format() {
        let json = serde_json::to_value(ChangeKind::Renamed { from: "old".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "renamed", "from": "old"}));
    }
}
