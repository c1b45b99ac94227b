//! [`AvoidanceNode`] – bus-driven wrapper around the [`SharedPipeline`].
//!
//! Listens on [`Topic::Scan`] and [`Topic::Tuning`], feeds the pipeline, and
//! publishes results back onto the bus:
//!
//! * one [`EventPayload::Collision`] per completed aggregation cycle,
//! * one [`EventPayload::WindowAdapted`] whenever the smoothing window moves.
//!
//! Subscriptions are taken in [`AvoidanceNode::new`], so events published
//! after construction are never missed even if [`AvoidanceNode::run`] is
//! spawned later.

use std::sync::Arc;

use scanguard_middleware::{EventBus, Topic, TopicReceiver};
use scanguard_types::{Event, EventPayload, ScanError, WindowAdaptation};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::pipeline::{CycleOutput, SharedPipeline};

/// Bus source tag for everything the node publishes.
pub const NODE_SOURCE: &str = "scanguard-runtime::avoidance";

pub struct AvoidanceNode {
    bus: Arc<EventBus>,
    pipeline: SharedPipeline,
    scans: TopicReceiver,
    tuning: TopicReceiver,
}

impl AvoidanceNode {
    pub fn new(bus: Arc<EventBus>, pipeline: SharedPipeline) -> Self {
        let scans = bus.subscribe_to(Topic::Scan);
        let tuning = bus.subscribe_to(Topic::Tuning);
        Self {
            bus,
            pipeline,
            scans,
            tuning,
        }
    }

    pub fn pipeline(&self) -> &SharedPipeline {
        &self.pipeline
    }

    /// Process bus events until `shutdown` flips to `true` or the bus closes.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Poisoned`] if the pipeline lock was poisoned by a
    /// panicking holder.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ScanError> {
        info!("avoidance node started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender also means shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                result = self.tuning.recv() => {
                    match result {
                        Ok(event) => self.handle_event(event)?,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(lagged_by = n, "tuning subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                result = self.scans.recv() => {
                    match result {
                        Ok(event) => self.handle_event(event)?,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(lagged_by = n, "scan subscriber lagged; dropping stale scans");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        info!(cycles = self.pipeline.cycles()?, "avoidance node stopped");
        Ok(())
    }

    /// Drive the pipeline with one bus event and publish any result.
    ///
    /// A rejected tuning request is not an error here; it is logged by the
    /// pipeline and the window is left unchanged.
    pub fn handle_event(&self, event: Event) -> Result<(), ScanError> {
        match event.payload {
            EventPayload::Scan(scan) => {
                if let Some(CycleOutput { collision, window }) = self.pipeline.process_scan(&scan)? {
                    self.emit(EventPayload::Collision(collision));
                    if window.current != window.previous {
                        self.emit(EventPayload::WindowAdapted(window));
                    }
                }
            }
            EventPayload::WindowTuning(delta) => {
                let previous = self.pipeline.window_size()?;
                match self.pipeline.apply_tuning(delta) {
                    Ok(current) if current != previous => {
                        self.emit(EventPayload::WindowAdapted(WindowAdaptation {
                            previous,
                            current,
                            instability: 0.0,
                        }));
                    }
                    Ok(_) | Err(ScanError::TuningRejected { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            other => debug!(?other, "ignoring event"),
        }
        Ok(())
    }

    fn emit(&self, payload: EventPayload) {
        if let Err(e) = self.bus.publish(Event::new(NODE_SOURCE, payload)) {
            debug!(error = %e, "node output had no listener");
        }
    }
}
