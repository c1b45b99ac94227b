//! WebSocket client for a `rosbridge_server`.
//!
//! [`RosbridgeClient`] is the node's only link to the ROS graph:
//!
//! 1. **Connects** to the rosbridge endpoint, subscribes to the scan and
//!    tuning topics, and advertises the collision topic.
//! 2. **Ingests** inbound publish frames, decodes them with
//!    [`rosbridge::parse_inbound`], and publishes them on the internal
//!    [`EventBus`].
//! 3. **Forwards** every [`EventPayload::Collision`] event from the bus back
//!    to rosbridge as an `Int16MultiArray` publish.
//!
//! Malformed inbound frames are logged and dropped; they never end the
//! session.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use scanguard_types::{Event, EventPayload, ScanError};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic};
use crate::rosbridge::{self, Inbound, RosTopics};

/// Bus source tag for scans ingested from rosbridge.
pub const SCAN_SOURCE: &str = "scanguard-middleware::rosbridge/scan";
/// Bus source tag for tuning requests ingested from rosbridge.
pub const TUNING_SOURCE: &str = "scanguard-middleware::rosbridge/tuning";

/// Bridge between a rosbridge WebSocket and the internal [`EventBus`].
#[derive(Clone)]
pub struct RosbridgeClient {
    bus: Arc<EventBus>,
    url: String,
    topics: RosTopics,
}

impl RosbridgeClient {
    /// Create a client for the rosbridge endpoint at `url`
    /// (e.g. `"ws://localhost:9090"`).
    pub fn new(bus: Arc<EventBus>, url: impl Into<String>, topics: RosTopics) -> Self {
        Self {
            bus,
            url: url.into(),
            topics,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn topics(&self) -> &RosTopics {
        &self.topics
    }

    /// Connect and pump messages until `shutdown` flips to `true`, the server
    /// closes the socket, or the bus shuts down.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Transport`] if the connection cannot be opened or
    /// a frame cannot be sent.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ScanError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ScanError::Transport(format!("rosbridge connect to {}: {e}", self.url)))?;
        info!(url = %self.url, "connected to rosbridge");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        for frame in rosbridge::handshake_frames(&self.topics) {
            ws_tx
                .send(Message::Text(frame.into()))
                .await
                .map_err(|e| ScanError::Transport(format!("rosbridge handshake: {e}")))?;
        }

        let mut collisions = self.bus.subscribe_to(Topic::Collision);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender also means shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                // Forward collision vectors from the bus to rosbridge.
                result = collisions.recv() => {
                    match result {
                        Ok(Event { payload: EventPayload::Collision(vector), .. }) => {
                            let frame = rosbridge::collision_frame(&self.topics.collision, &vector);
                            ws_tx
                                .send(Message::Text(frame.into()))
                                .await
                                .map_err(|e| ScanError::Transport(format!("rosbridge publish: {e}")))?;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(lagged_by = n, "collision forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                // Handle incoming rosbridge frames.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_inbound(text.as_str()),
                        Some(Ok(Message::Close(_))) | None => {
                            info!("rosbridge closed the connection");
                            break;
                        }
                        Some(Err(e)) => {
                            return Err(ScanError::Transport(format!("rosbridge receive: {e}")));
                        }
                        _ => {}
                    }
                }
            }
        }

        let _ = ws_tx.send(Message::Close(None)).await;
        Ok(())
    }

    /// Decode one inbound frame and publish it on the bus.
    ///
    /// Frames for other topics are ignored; malformed frames are logged.
    pub fn handle_inbound(&self, text: &str) {
        let event = match rosbridge::parse_inbound(text, &self.topics) {
            Ok(Some(Inbound::Scan(frame))) => Event::new(SCAN_SOURCE, EventPayload::Scan(frame)),
            Ok(Some(Inbound::Tuning(delta))) => Event::new(TUNING_SOURCE, EventPayload::WindowTuning(delta)),
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "dropping malformed rosbridge frame");
                return;
            }
        };
        if let Err(e) = self.bus.publish(event) {
            debug!(error = %e, "inbound frame had no listener");
        }
    }
}
