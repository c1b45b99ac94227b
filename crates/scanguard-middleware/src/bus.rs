//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Scan`] | Raw range scans at sensor frame rate |
//! | [`Topic::Tuning`] | Operator window-size deltas |
//! | [`Topic::Collision`] | One collision vector per aggregation cycle |
//! | [`Topic::Diagnostics`] | Adaptive window changes |

use scanguard_types::{Event, EventPayload, ScanError};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Inbound range scans.
    Scan,
    /// Inbound window tuning requests.
    Tuning,
    /// Outbound per-sector collision flags.
    Collision,
    /// Window adaptation reports.
    Diagnostics,
}

impl Topic {
    /// The lane a payload belongs on.
    pub fn for_payload(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::Scan(_) => Topic::Scan,
            EventPayload::WindowTuning(_) => Topic::Tuning,
            EventPayload::Collision(_) => Topic::Collision,
            EventPayload::WindowAdapted(_) => Topic::Diagnostics,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    scan: broadcast::Sender<Event>,
    tuning: broadcast::Sender<Event>,
    collision: broadcast::Sender<Event>,
    diagnostics: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (scan, _) = broadcast::channel(capacity);
        let (tuning, _) = broadcast::channel(capacity);
        let (collision, _) = broadcast::channel(capacity);
        let (diagnostics, _) = broadcast::channel(capacity);
        Self {
            scan,
            tuning,
            collision,
            diagnostics,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`ScanError::Channel`] when nobody is listening on the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, ScanError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| ScanError::Channel(format!("No subscribers for topic {:?}", topic)))
    }

    /// Publish `event` on the lane matching its payload.
    pub fn publish(&self, event: Event) -> Result<usize, ScanError> {
        let topic = Topic::for_payload(&event.payload);
        self.publish_to(topic, event)
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Scan => &self.scan,
            Topic::Tuning => &self.tuning,
            Topic::Collision => &self.collision,
            Topic::Diagnostics => &self.diagnostics,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking poll for an already-buffered event.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
