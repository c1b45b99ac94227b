//! [`Pipeline`] – the per-scan processing cycle.
//!
//! Each scan is driven through the same stages in order:
//!
//! 1. **Smooth** – [`SpatialSmoother`] with the current window width.
//! 2. **Buffer** – push the smoothed frame into the [`TemporalAggregator`].
//! 3. **Aggregate** – once five frames are buffered, combine them and retune
//!    the window from the instability score.
//! 4. **Detect** – run the [`CollisionDetector`] over the combined frame.
//!
//! Steps 1–2 are [`Pipeline::push_scan`], steps 3–4 are
//! [`Pipeline::run_cycle`]; [`Pipeline::process_scan`] runs both.  Scans that
//! only fill the history produce no output.  Operator tuning
//! requests go through [`Pipeline::apply_tuning`]; the new width takes effect
//! from the next scan.
//!
//! [`SharedPipeline`] wraps a pipeline in an `Arc<Mutex<_>>` so that scans and
//! tuning requests arriving from different tasks are serialised: each call
//! holds the lock for exactly one operation.
//!
//! # Example
//!
//! ```rust
//! use scanguard_runtime::pipeline::Pipeline;
//! use scanguard_types::{ScanFrame, Sector};
//!
//! let mut pipeline = Pipeline::default();
//! let scan = ScanFrame::uniform(5.0);
//! for _ in 0..4 {
//!     assert!(pipeline.process_scan(&scan).is_none());
//! }
//! let out = pipeline.process_scan(&scan).unwrap();
//! assert!(out.collision.is_clear(Sector::Top));
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use scanguard_perception::{CollisionDetector, DetectionThresholds, SectorMap, SpatialSmoother, TemporalAggregator};
use scanguard_types::{CollisionVector, ScanError, ScanFrame, WindowAdaptation, WindowSize, WindowTuning};
use tracing::{debug, info, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Where the pipeline is in its fill/aggregate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Fewer than five smoothed frames are buffered.
    Filling,
    /// The history is full; the next cycle combines it.
    Aggregating,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineEvent {
    /// A smoothed frame was appended to the history.
    FrameBuffered,
    /// The history was combined and its oldest frame evicted.
    CycleCompleted,
}

/// Result of one aggregation cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutput {
    pub collision: CollisionVector,
    pub window: WindowAdaptation,
}

/// Single-owner scan pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    sectors: SectorMap,
    smoother: SpatialSmoother,
    aggregator: TemporalAggregator,
    detector: CollisionDetector,
    window: WindowSize,
    state: PipelineState,
    cycles: u64,
    last_collision: Option<CollisionVector>,
}

impl Pipeline {
    /// Build a pipeline with the given per-sector thresholds and the minimum
    /// window width.
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self {
            sectors: SectorMap::new(),
            smoother: SpatialSmoother,
            aggregator: TemporalAggregator::new(),
            detector: CollisionDetector::new(thresholds),
            window: WindowSize::DEFAULT,
            state: PipelineState::Filling,
            cycles: 0,
            last_collision: None,
        }
    }

    /// Smoothing window used for the next scan.
    pub fn window_size(&self) -> WindowSize {
        self.window
    }

    /// Number of smoothed frames currently buffered.
    pub fn history_len(&self) -> usize {
        self.aggregator.len()
    }

    /// Number of completed aggregation cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Vector produced by the most recent cycle.
    pub fn last_collision(&self) -> Option<CollisionVector> {
        self.last_collision
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn thresholds(&self) -> &DetectionThresholds {
        self.detector.thresholds()
    }

    /// Run one scan through the pipeline.
    ///
    /// Returns `None` while the history is still filling, otherwise the
    /// collision vector for the combined frame and the window step taken.
    pub fn process_scan(&mut self, scan: &ScanFrame) -> Option<CycleOutput> {
        match self.push_scan(scan) {
            PipelineState::Filling => None,
            PipelineState::Aggregating => self.run_cycle(),
        }
    }

    /// Smooth `scan` with the current window and buffer it.
    ///
    /// Returns the state after buffering: [`PipelineState::Aggregating`] once
    /// the history is full.
    pub fn push_scan(&mut self, scan: &ScanFrame) -> PipelineState {
        let smoothed = self.smoother.smooth(scan, self.window);
        self.aggregator.push(smoothed);
        let state = self.transition(PipelineEvent::FrameBuffered);
        if state == PipelineState::Filling {
            debug!(buffered = self.aggregator.len(), "history filling");
        }
        state
    }

    /// Combine the buffered history, retune the window and detect.
    ///
    /// Returns `None` without touching anything unless the pipeline is
    /// [`PipelineState::Aggregating`].
    pub fn run_cycle(&mut self) -> Option<CycleOutput> {
        if self.state != PipelineState::Aggregating {
            return None;
        }
        let (combined, window) = self.aggregator.aggregate(self.window)?;
        self.transition(PipelineEvent::CycleCompleted);

        let collision = self.detector.detect_frame(&self.sectors, &combined);
        self.window = window.current;
        self.cycles += 1;

        if window.current != window.previous {
            info!(
                previous = %window.previous,
                current = %window.current,
                instability = window.instability,
                "smoothing window adapted"
            );
        }
        let blocked = collision.blocked_sectors();
        if self.last_collision != Some(collision) {
            info!(cycle = self.cycles, ?blocked, "collision vector changed");
        } else {
            debug!(cycle = self.cycles, ?blocked, "collision vector unchanged");
        }
        self.last_collision = Some(collision);

        Some(CycleOutput { collision, window })
    }

    fn transition(&mut self, event: PipelineEvent) -> PipelineState {
        self.state = match (self.state, event) {
            (PipelineState::Filling, PipelineEvent::FrameBuffered) if self.aggregator.ready() => {
                PipelineState::Aggregating
            }
            (PipelineState::Filling, PipelineEvent::FrameBuffered) => PipelineState::Filling,
            // Buffering again before a cycle only replaces the oldest frame.
            (PipelineState::Aggregating, PipelineEvent::FrameBuffered) => PipelineState::Aggregating,
            (PipelineState::Aggregating, PipelineEvent::CycleCompleted) => PipelineState::Filling,
            (PipelineState::Filling, PipelineEvent::CycleCompleted) => {
                warn!("cycle completed while still filling");
                PipelineState::Filling
            }
        };
        self.state
    }

    /// Apply an operator window delta.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::TuningRejected`] and keeps the current width when
    /// the request would make the width negative.
    pub fn apply_tuning(&mut self, tuning: WindowTuning) -> Result<WindowSize, ScanError> {
        match self.window.apply_tuning(tuning) {
            Ok(window) => {
                info!(delta = tuning.0, previous = %self.window, current = %window, "window tuned");
                self.window = window;
                Ok(window)
            }
            Err(e) => {
                warn!(delta = tuning.0, error = %e, "window tuning rejected");
                Err(e)
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DetectionThresholds::default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SharedPipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable, lock-guarded handle to a [`Pipeline`].
#[derive(Debug, Clone, Default)]
pub struct SharedPipeline {
    inner: Arc<Mutex<Pipeline>>,
}

impl SharedPipeline {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// [`Pipeline::process_scan`] under the lock.
    pub fn process_scan(&self, scan: &ScanFrame) -> Result<Option<CycleOutput>, ScanError> {
        Ok(self.lock()?.process_scan(scan))
    }

    /// [`Pipeline::apply_tuning`] under the lock.
    pub fn apply_tuning(&self, tuning: WindowTuning) -> Result<WindowSize, ScanError> {
        self.lock()?.apply_tuning(tuning)
    }

    pub fn window_size(&self) -> Result<WindowSize, ScanError> {
        Ok(self.lock()?.window_size())
    }

    pub fn cycles(&self) -> Result<u64, ScanError> {
        Ok(self.lock()?.cycles())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Pipeline>, ScanError> {
        self.inner.lock().map_err(|e| ScanError::Poisoned(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
