//! `scanguard-middleware` – message plumbing.
//!
//! Routes data between the ROS graph and the scan pipeline without caring
//! about its meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`rosbridge`] – JSON codec for `rosbridge_server` frames: scan and
//!   tuning ingest, collision publish.
//! - [`client`] – [`RosbridgeClient`]: WebSocket session that connects the
//!   bus to a live rosbridge endpoint.

pub mod bus;
pub mod client;
pub mod rosbridge;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use client::RosbridgeClient;
pub use rosbridge::{Inbound, RosTopics};
