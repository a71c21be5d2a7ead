//! Message Bus
//!
//! In-process pub/sub with exact-topic and prefix-wildcard subscriptions.
//! Topics use dot notation; a topic ending in `.*` subscribes to every topic
//! that starts with the prefix before the `.*`.
//!
//! Dispatch is synchronous and single-threaded: exact-match handlers first
//! (in subscription order), then each matching prefix's handlers. Publish
//! iterates over a snapshot of the handler lists, so handlers may subscribe
//! or unsubscribe during dispatch. A panicking handler is logged and skipped
//! so one faulty subscriber cannot abort the run.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::error;

use crate::data::{Bar, OrderBookDelta, QuoteTick, TradeTick};
use crate::events::{OrderEventAny, PositionEventAny};

/// Message payload delivered through the bus.
#[derive(Debug, Clone)]
pub enum BusMessage {
    Bar(Bar),
    Quote(QuoteTick),
    Trade(TradeTick),
    BookDelta(OrderBookDelta),
    OrderEvent(OrderEventAny),
    PositionEvent(PositionEventAny),
}

/// Subscriber callback.
pub type Handler = Rc<dyn Fn(&BusMessage)>;

/// Handle for a single subscription, usable for unsubscribing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub sub_id: u64,
}

struct Entry {
    sub_id: u64,
    handler: Handler,
}

/// Central message bus for engine-wide event distribution.
pub struct MessageBus {
    /// exact topic -> handlers, in subscription order
    exact: RefCell<IndexMap<String, Vec<Entry>>>,
    /// prefix (without trailing `.*`) -> handlers, in subscription order
    prefix: RefCell<IndexMap<String, Vec<Entry>>>,
    next_sub_id: RefCell<u64>,
    sent_count: RefCell<u64>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            exact: RefCell::new(IndexMap::new()),
            prefix: RefCell::new(IndexMap::new()),
            next_sub_id: RefCell::new(0),
            sent_count: RefCell::new(0),
        }
    }

    /// Subscribe `handler` to `topic` (exact match, or prefix wildcard when
    /// the topic ends with `.*`).
    pub fn subscribe(&self, topic: impl Into<String>, handler: Handler) -> Subscription {
        let topic = topic.into();
        let sub_id = {
            let mut n = self.next_sub_id.borrow_mut();
            *n += 1;
            *n
        };
        let entry = Entry {
            sub_id,
            handler,
        };

        if let Some(prefix) = topic.strip_suffix(".*") {
            self.prefix
                .borrow_mut()
                .entry(prefix.to_string())
                .or_default()
                .push(entry);
        } else {
            self.exact
                .borrow_mut()
                .entry(topic.clone())
                .or_default()
                .push(entry);
        }

        Subscription { topic, sub_id }
    }

    /// Remove a subscription by its handle.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        if let Some(prefix) = subscription.topic.strip_suffix(".*") {
            if let Some(entries) = self.prefix.borrow_mut().get_mut(prefix) {
                entries.retain(|e| e.sub_id != subscription.sub_id);
            }
        } else if let Some(entries) = self.exact.borrow_mut().get_mut(&subscription.topic) {
            entries.retain(|e| e.sub_id != subscription.sub_id);
        }
    }

    /// Publish `message` to all handlers subscribed to `topic`:
    /// exact-match handlers first, then every prefix whose prefix the topic
    /// starts with.
    pub fn publish(&self, topic: &str, message: &BusMessage) {
        *self.sent_count.borrow_mut() += 1;

        // Snapshot handlers so subscription changes during dispatch are safe.
        let mut handlers: Vec<Handler> = Vec::new();
        {
            let exact = self.exact.borrow();
            if let Some(entries) = exact.get(topic) {
                handlers.extend(entries.iter().map(|e| Rc::clone(&e.handler)));
            }
            let prefix = self.prefix.borrow();
            for (prefix, entries) in prefix.iter() {
                if topic.starts_with(prefix.as_str()) {
                    handlers.extend(entries.iter().map(|e| Rc::clone(&e.handler)));
                }
            }
        }

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                error!(topic, "message handler panicked; continuing run");
            }
        }
    }

    /// True if any handler would receive a publish on `topic`.
    pub fn has_subscribers(&self, topic: &str) -> bool {
        if self
            .exact
            .borrow()
            .get(topic)
            .is_some_and(|e| !e.is_empty())
        {
            return true;
        }
        self.prefix
            .borrow()
            .iter()
            .any(|(prefix, entries)| topic.starts_with(prefix.as_str()) && !entries.is_empty())
    }

    pub fn sent_count(&self) -> u64 {
        *self.sent_count.borrow()
    }

    /// Drop all subscriptions and counters.
    pub fn reset(&self) {
        self.exact.borrow_mut().clear();
        self.prefix.borrow_mut().clear();
        *self.sent_count.borrow_mut() = 0;
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
