//! Change notification for collections
//!
//! Listeners are called synchronously, in subscription order, for every
//! change. Nothing is buffered: a listener only sees changes made after it
//! subscribed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::collection::Record;

/// Kind of change applied to a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Updated,
    Removed,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::Added => "added",
            ChangeType::Updated => "updated",
            ChangeType::Removed => "removed",
        };
        write!(f, "{}", s)
    }
}

/// A change applied to a collection, with the affected record(s)
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<R> {
    Added { item: R },
    Updated { previous: R, item: R },
    Removed { item: R },
}

impl<R: Record> ChangeEvent<R> {
    pub fn change_type(&self) -> ChangeType {
        match self {
            ChangeEvent::Added { .. } => ChangeType::Added,
            ChangeEvent::Updated { .. } => ChangeType::Updated,
            ChangeEvent::Removed { .. } => ChangeType::Removed,
        }
    }

    /// The record as it is after the change (or as it was, for removals)
    pub fn item(&self) -> &R {
        match self {
            ChangeEvent::Added { item }
            | ChangeEvent::Updated { item, .. }
            | ChangeEvent::Removed { item } => item,
        }
    }

    pub fn item_id(&self) -> &str {
        self.item().id()
    }

    pub fn into_item(self) -> R {
        match self {
            ChangeEvent::Added { item }
            | ChangeEvent::Updated { item, .. }
            | ChangeEvent::Removed { item } => item,
        }
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<R> = Arc<dyn Fn(&ChangeEvent<R>) + Send + Sync>;

/// Fan-out of change events to registered listeners
pub struct ChangeNotifier<R> {
    listeners: Mutex<Vec<(SubscriptionId, Listener<R>)>>,
    next_id: AtomicU64,
}

impl<R> Default for ChangeNotifier<R> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<R> ChangeNotifier<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all future changes
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent<R>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every listener registered right now
    ///
    /// The listener list is snapshotted before delivery, so listeners may
    /// subscribe or unsubscribe from inside a callback.
    pub fn notify(&self, event: &ChangeEvent<R>) {
        let snapshot: Vec<Listener<R>> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Listener<R>)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
    }

    impl Record for Item {
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn added(id: &str) -> ChangeEvent<Item> {
        ChangeEvent::Added {
            item: Item { id: id.to_string() },
        }
    }

    #[test]
    fn test_delivers_in_subscription_order() {
        let notifier = ChangeNotifier::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            notifier.subscribe(move |event: &ChangeEvent<Item>| {
                log.lock().unwrap().push(format!("{}:{}", name, event.item_id()));
            });
        }

        notifier.notify(&added("a"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:a", "second:a", "third:a"]
        );
    }

    #[test]
    fn test_late_subscriber_misses_past_events() {
        let notifier = ChangeNotifier::new();
        notifier.notify(&added("early"));

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        notifier.subscribe(move |event: &ChangeEvent<Item>| {
            sink.lock().unwrap().push(event.item_id().to_string());
        });

        notifier.notify(&added("late"));
        assert_eq!(*seen.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&count);
        let id = notifier.subscribe(move |_: &ChangeEvent<Item>| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify(&added("a"));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.notify(&added("b"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_inside_callback_keeps_inflight_delivery() {
        let notifier: Arc<ChangeNotifier<Item>> = Arc::new(ChangeNotifier::new());
        let log = Arc::new(StdMutex::new(Vec::new()));

        // The first listener removes the second while the event is in flight
        let second_id = Arc::new(StdMutex::new(None::<SubscriptionId>));
        {
            let notifier_ref = Arc::clone(&notifier);
            let second_id = Arc::clone(&second_id);
            let log = Arc::clone(&log);
            notifier.subscribe(move |event: &ChangeEvent<Item>| {
                log.lock().unwrap().push(format!("first:{}", event.item_id()));
                if let Some(id) = second_id.lock().unwrap().take() {
                    notifier_ref.unsubscribe(id);
                }
            });
        }
        {
            let log = Arc::clone(&log);
            let id = notifier.subscribe(move |event: &ChangeEvent<Item>| {
                log.lock().unwrap().push(format!("second:{}", event.item_id()));
            });
            *second_id.lock().unwrap() = Some(id);
        }

        notifier.notify(&added("a"));
        notifier.notify(&added("b"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:a", "second:a", "first:b"]
        );
    }

    #[test]
    fn test_change_type_and_item() {
        let event = ChangeEvent::Updated {
            previous: Item { id: "x".into() },
            item: Item { id: "x".into() },
        };
        assert_eq!(event.change_type(), ChangeType::Updated);
        assert_eq!(event.change_type().to_string(), "updated");
        assert_eq!(event.into_item().id, "x");
    }
}
