//! Temporal aggregation and adaptive window control.
//!
//! The [`TemporalAggregator`] keeps the last [`HISTORY_DEPTH`] smoothed frames.
//! Once the history is full, [`TemporalAggregator::aggregate`] performs two
//! independent passes over it:
//!
//! 1. **Weighted combination** – frames are weighted `[1, 2, 3, 4, 8]` from
//!    oldest to newest and the per-bearing sum is divided by the weight total
//!    (`18`).
//! 2. **Instability** – at each bearing, count how often the five samples
//!    flip between "no return" (`0.0`) and a valid reading, then average the
//!    count over all bearings.  The score lies in `[0, 4]`.
//!
//! The score drives the window width used for the *next* scans: a flickering
//! scene (score above [`INSTABILITY_THRESHOLD`]) widens the window by
//! [`WIDEN_STEP`], a clean one narrows it by [`NARROW_STEP`].  The window is
//! owned by the caller and threaded through, which closes the loop between
//! the spatial and temporal stages.
//!
//! # Example
//!
//! ```rust
//! use scanguard_perception::aggregator::TemporalAggregator;
//! use scanguard_types::{SmoothedFrame, WindowSize};
//!
//! let mut agg = TemporalAggregator::new();
//! for _ in 0..5 {
//!     agg.push(SmoothedFrame::uniform(1.5));
//! }
//! assert!(agg.ready());
//!
//! let (combined, step) = agg.aggregate(WindowSize::clamped(51)).unwrap();
//! assert!((combined.values()[0] - 1.5).abs() < 1e-9);
//! assert_eq!(step.instability, 0.0);
//! assert_eq!(step.current.get(), 41);
//! assert_eq!(agg.len(), 4);
//! ```

use std::collections::VecDeque;

use scanguard_types::{AngularIndex, SmoothedFrame, WindowAdaptation, WindowSize};
use tracing::debug;

/// Number of frames combined per aggregation cycle.
pub const HISTORY_DEPTH: usize = 5;

/// Per-frame weights, oldest first.
pub const FRAME_WEIGHTS: [f64; HISTORY_DEPTH] = [1.0, 2.0, 3.0, 4.0, 8.0];

/// Sum of [`FRAME_WEIGHTS`].
pub const WEIGHT_TOTAL: f64 = 18.0;

/// Instability score above which the window is widened.
pub const INSTABILITY_THRESHOLD: f64 = 0.08;

/// Samples added to the window when the scene flickers.
pub const WIDEN_STEP: i64 = 20;

/// Samples removed from the window when the scene is clean.
pub const NARROW_STEP: i64 = 10;

/// Rolling history of smoothed frames with a weighted-average read-out.
#[derive(Debug, Clone, Default)]
pub struct TemporalAggregator {
    history: VecDeque<SmoothedFrame>,
}

impl TemporalAggregator {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_DEPTH),
        }
    }

    /// Append the newest frame.
    ///
    /// Callers aggregate as soon as [`ready`][Self::ready] turns true, so the
    /// history never grows past [`HISTORY_DEPTH`]; if it would, the oldest
    /// frame is dropped.
    pub fn push(&mut self, frame: SmoothedFrame) {
        if self.history.len() == HISTORY_DEPTH {
            self.history.pop_front();
        }
        self.history.push_back(frame);
    }

    /// `true` when the history holds [`HISTORY_DEPTH`] frames.
    pub fn ready(&self) -> bool {
        self.history.len() == HISTORY_DEPTH
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drop every buffered frame.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Combine the full history and retune `window`.
    ///
    /// Returns `None` (and leaves the history untouched) unless
    /// [`ready`][Self::ready].  On success the oldest frame is evicted, so the
    /// history holds `HISTORY_DEPTH - 1` frames afterwards.
    pub fn aggregate(&mut self, window: WindowSize) -> Option<(SmoothedFrame, WindowAdaptation)> {
        if !self.ready() {
            return None;
        }

        let combined = self.weighted_average();
        let instability = self.instability();
        let current = if instability > INSTABILITY_THRESHOLD {
            window.adjusted(WIDEN_STEP)
        } else {
            window.adjusted(-NARROW_STEP)
        };
        debug!(instability, previous = %window, current = %current, "window retuned");

        self.history.pop_front();
        Some((
            combined,
            WindowAdaptation {
                previous: window,
                current,
                instability,
            },
        ))
    }

    /// Per-bearing weighted mean of the history, normalised by
    /// [`WEIGHT_TOTAL`].
    pub fn weighted_average(&self) -> SmoothedFrame {
        SmoothedFrame::from_fn(|i| {
            let sum: f64 = self
                .history
                .iter()
                .zip(FRAME_WEIGHTS)
                .map(|(frame, w)| frame[i] * w)
                .sum();
            sum / WEIGHT_TOTAL
        })
    }

    /// Mean number of valid/invalid transitions per bearing across the
    /// history.
    pub fn instability(&self) -> f64 {
        let total: usize = AngularIndex::all().map(|i| self.flicker_count(i)).sum();
        total as f64 / AngularIndex::all().count() as f64
    }

    fn flicker_count(&self, index: AngularIndex) -> usize {
        self.history
            .iter()
            .zip(self.history.iter().skip(1))
            .filter(|(a, b)| (a[index] == 0.0) != (b[index] == 0.0))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanguard_types::SCAN_SAMPLES;

    fn frame_with(f: impl Fn(usize) -> f64) -> SmoothedFrame {
        SmoothedFrame::from_fn(|i| f(i.get()))
    }

    fn filled(frames: &[SmoothedFrame]) -> TemporalAggregator {
        let mut agg = TemporalAggregator::new();
        for f in frames {
            agg.push(f.clone());
        }
        agg
    }

    #[test]
    fn not_ready_until_full() {
        let mut agg = TemporalAggregator::new();
        for n in 1..HISTORY_DEPTH {
            agg.push(SmoothedFrame::uniform(1.0));
            assert_eq!(agg.len(), n);
            assert!(!agg.ready());
            assert!(agg.aggregate(WindowSize::DEFAULT).is_none());
        }
        agg.push(SmoothedFrame::uniform(1.0));
        assert!(agg.ready());
    }

    #[test]
    fn aggregate_evicts_oldest_frame() {
        let frames: Vec<SmoothedFrame> = (1..=5).map(|k| SmoothedFrame::uniform(k as f64)).collect();
        let mut agg = filled(&frames);
        agg.aggregate(WindowSize::DEFAULT).unwrap();
        assert_eq!(agg.len(), HISTORY_DEPTH - 1);

        // Refill with 6.0: the history is now 2, 3, 4, 5, 6.
        agg.push(SmoothedFrame::uniform(6.0));
        let (combined, _) = agg.aggregate(WindowSize::DEFAULT).unwrap();
        let expected = (2.0 + 2.0 * 3.0 + 3.0 * 4.0 + 4.0 * 5.0 + 8.0 * 6.0) / 18.0;
        assert!((combined.values()[100] - expected).abs() < 1e-9);
    }

    #[test]
    fn weights_favour_newest_frame() {
        let frames: Vec<SmoothedFrame> = (0..5)
            .map(|k| SmoothedFrame::uniform(if k == 4 { 18.0 } else { 0.0 }))
            .collect();
        let agg = filled(&frames);
        let combined = agg.weighted_average();
        // 8 * 18 / 18
        assert!((combined.values()[0] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn identical_frames_average_to_themselves() {
        let frame = frame_with(|i| 0.5 + (i % 13) as f64 * 0.25);
        let agg = filled(&vec![frame.clone(); 5]);
        let combined = agg.weighted_average();
        for (a, b) in combined.values().iter().zip(frame.values()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn identical_frames_have_zero_instability() {
        let frame = frame_with(|i| if i % 3 == 0 { 0.0 } else { 2.0 });
        let mut agg = filled(&vec![frame; 5]);
        assert_eq!(agg.instability(), 0.0);

        let (_, step) = agg.aggregate(WindowSize::DEFAULT).unwrap();
        assert_eq!(step.current, WindowSize::DEFAULT);
        assert_eq!(step.previous, WindowSize::DEFAULT);
    }

    #[test]
    fn flicker_everywhere_scores_four() {
        let valid = SmoothedFrame::uniform(1.0);
        let invalid = SmoothedFrame::uniform(0.0);
        let agg = filled(&[
            valid.clone(),
            invalid.clone(),
            valid.clone(),
            invalid,
            valid,
        ]);
        assert!((agg.instability() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn value_changes_without_dropout_are_not_flicker() {
        let frames: Vec<SmoothedFrame> = (1..=5).map(|k| SmoothedFrame::uniform(k as f64)).collect();
        assert_eq!(filled(&frames).instability(), 0.0);
    }

    #[test]
    fn unstable_scene_widens_window() {
        // One dropout transition on 60 of 720 bearings: 60 / 720 ≈ 0.083 > 0.08.
        let steady = SmoothedFrame::uniform(1.0);
        let dropout = frame_with(|i| if i < 60 { 0.0 } else { 1.0 });
        let mut agg = filled(&[steady.clone(), steady.clone(), steady.clone(), steady, dropout]);
        let (_, step) = agg.aggregate(WindowSize::clamped(41)).unwrap();
        assert!(step.instability > INSTABILITY_THRESHOLD);
        assert_eq!(step.current.get(), 61);
    }

    #[test]
    fn mild_flicker_below_threshold_narrows_window() {
        // 57 / 720 ≈ 0.079 stays under the threshold.
        let steady = SmoothedFrame::uniform(1.0);
        let dropout = frame_with(|i| if i < 57 { 0.0 } else { 1.0 });
        let mut agg = filled(&[steady.clone(), steady.clone(), steady.clone(), steady, dropout]);
        let (_, step) = agg.aggregate(WindowSize::clamped(61)).unwrap();
        assert!(step.instability < INSTABILITY_THRESHOLD);
        assert_eq!(step.current.get(), 51);
    }

    #[test]
    fn widening_clamps_at_maximum() {
        let valid = SmoothedFrame::uniform(1.0);
        let invalid = SmoothedFrame::uniform(0.0);
        let mut agg = filled(&[valid.clone(), invalid.clone(), valid.clone(), invalid, valid]);
        let (_, step) = agg.aggregate(WindowSize::clamped(WindowSize::MAX as i64)).unwrap();
        assert_eq!(step.current.get(), WindowSize::MAX);
    }

    #[test]
    fn combined_frame_has_full_length() {
        let agg = filled(&vec![SmoothedFrame::uniform(3.0); 5]);
        assert_eq!(agg.weighted_average().values().len(), SCAN_SAMPLES);
    }

    #[test]
    fn clear_empties_history() {
        let mut agg = filled(&vec![SmoothedFrame::uniform(3.0); 3]);
        agg.clear();
        assert!(agg.is_empty());
    }
}
