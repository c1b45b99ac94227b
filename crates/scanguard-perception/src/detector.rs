//! Sector-wise collision detection.
//!
//! A single close reading may be sensor noise, so a sector is only flagged
//! when a *contiguous run* of [`OBSTACLE_RUN_LENGTH`] averaged samples lies at
//! or under the sector's threshold.  Runs are looked for in sector walk order,
//! so a sector that wraps through bearing 0 is still one contiguous strip.
//!
//! Stop sectors (`top`, `bottom`, corners) use a short stop distance; the
//! `*_slow` sectors use the longer slow-down distance and give an early
//! warning before the stop flag trips.
//!
//! # Example
//!
//! ```rust
//! use scanguard_perception::detector::{detect, is_blocked_window};
//! use scanguard_types::CollisionVector;
//!
//! let values = [1.0, 0.1, 0.1, 0.1, 0.1, 0.1, 1.0];
//! assert!(is_blocked_window(&values, 1, 5, 0.2));
//! assert!(!is_blocked_window(&values, 2, 5, 0.2));
//! assert_eq!(detect(&values, 0.2), CollisionVector::BLOCKED);
//! assert_eq!(detect(&values[..5], 0.2), CollisionVector::CLEAR);
//! ```

use scanguard_types::{CollisionVector, Sector, SmoothedFrame};
use serde::{Deserialize, Serialize};

use crate::sector::SectorMap;

/// Consecutive close samples needed to confirm an obstacle.
pub const OBSTACLE_RUN_LENGTH: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Thresholds
// ────────────────────────────────────────────────────────────────────────────

/// Per-sector trigger distances in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionThresholds {
    /// Hard stop ahead (`top`).
    #[serde(default = "default_top_stop")]
    pub top_stop: f64,
    /// Slow-down ahead (`top_slow`).
    #[serde(default = "default_slow")]
    pub top_slow: f64,
    /// Hard stop behind (`bottom`).
    #[serde(default = "default_bottom_stop")]
    pub bottom_stop: f64,
    /// Slow-down behind (`bottom_slow`).
    #[serde(default = "default_slow")]
    pub bottom_slow: f64,
    /// `top_L` and `top_R`.
    #[serde(default = "default_corner_stop")]
    pub top_corner_stop: f64,
    /// `bottom_L` and `bottom_R`.
    #[serde(default = "default_corner_stop")]
    pub bottom_corner_stop: f64,
}

fn default_top_stop() -> f64 {
    0.20
}
fn default_bottom_stop() -> f64 {
    0.25
}
fn default_slow() -> f64 {
    0.80
}
fn default_corner_stop() -> f64 {
    0.20
}

impl DetectionThresholds {
    /// The trigger distance applied to `sector`.
    pub fn for_sector(&self, sector: Sector) -> f64 {
        match sector {
            Sector::Top => self.top_stop,
            Sector::TopSlow => self.top_slow,
            Sector::Bottom => self.bottom_stop,
            Sector::BottomSlow => self.bottom_slow,
            Sector::TopLeft | Sector::TopRight => self.top_corner_stop,
            Sector::BottomLeft | Sector::BottomRight => self.bottom_corner_stop,
        }
    }
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            top_stop: default_top_stop(),
            top_slow: default_slow(),
            bottom_stop: default_bottom_stop(),
            bottom_slow: default_slow(),
            top_corner_stop: default_corner_stop(),
            bottom_corner_stop: default_corner_stop(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Run detection
// ────────────────────────────────────────────────────────────────────────────

/// `true` when the `run_length` samples starting at `start` are all at or
/// under `threshold`.
///
/// A run that would extend past the end of `values` never matches.
pub fn is_blocked_window(values: &[f64], start: usize, run_length: usize, threshold: f64) -> bool {
    match values.get(start..start.saturating_add(run_length)) {
        Some(run) => run.iter().all(|&v| v <= threshold),
        None => false,
    }
}

/// [`CollisionVector::BLOCKED`] on the first matching run, otherwise
/// [`CollisionVector::CLEAR`].
pub fn detect(values: &[f64], threshold: f64) -> u8 {
    let blocked = (0..values.len()).any(|start| is_blocked_window(values, start, OBSTACLE_RUN_LENGTH, threshold));
    if blocked {
        CollisionVector::BLOCKED
    } else {
        CollisionVector::CLEAR
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CollisionDetector
// ────────────────────────────────────────────────────────────────────────────

/// Splits a combined frame into sectors and flags each one.
#[derive(Debug, Clone, Default)]
pub struct CollisionDetector {
    thresholds: DetectionThresholds,
}

impl CollisionDetector {
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DetectionThresholds {
        &self.thresholds
    }

    /// Build the collision vector for one combined frame.
    pub fn detect_frame(&self, sectors: &SectorMap, frame: &SmoothedFrame) -> CollisionVector {
        let mut out = CollisionVector::all_clear();
        for sector in Sector::ALL {
            let values = sectors.sector_values(sector, frame);
            out.set(sector, detect(&values, self.thresholds.for_sector(sector)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_must_be_complete() {
        let values = [0.1; 4];
        assert!(!is_blocked_window(&values, 0, 5, 0.2));
        assert_eq!(detect(&values, 0.2), CollisionVector::CLEAR);
    }

    #[test]
    fn threshold_is_inclusive() {
        let values = [0.2; 5];
        assert!(is_blocked_window(&values, 0, 5, 0.2));
    }

    #[test]
    fn one_far_sample_breaks_the_run() {
        let values = [0.1, 0.1, 0.3, 0.1, 0.1, 0.1, 0.1];
        assert_eq!(detect(&values, 0.2), CollisionVector::CLEAR);
    }

    #[test]
    fn run_at_end_of_slice_matches() {
        let mut values = vec![5.0; 20];
        values[15..].fill(0.05);
        assert!(is_blocked_window(&values, 15, 5, 0.2));
        assert!(!is_blocked_window(&values, 16, 5, 0.2));
        assert_eq!(detect(&values, 0.2), CollisionVector::BLOCKED);
    }

    #[test]
    fn start_past_end_is_not_a_match() {
        assert!(!is_blocked_window(&[0.0; 3], 10, 5, 1.0));
        assert!(!is_blocked_window(&[0.0; 3], usize::MAX, 5, 1.0));
    }

    #[test]
    fn empty_slice_is_clear() {
        assert_eq!(detect(&[], 0.2), CollisionVector::CLEAR);
    }

    #[test]
    fn default_thresholds_per_sector() {
        let t = DetectionThresholds::default();
        assert_eq!(t.for_sector(Sector::Top), 0.20);
        assert_eq!(t.for_sector(Sector::Bottom), 0.25);
        assert_eq!(t.for_sector(Sector::TopSlow), 0.80);
        assert_eq!(t.for_sector(Sector::BottomSlow), 0.80);
        assert_eq!(t.for_sector(Sector::TopLeft), 0.20);
        assert_eq!(t.for_sector(Sector::BottomRight), 0.20);
    }

    #[test]
    fn thresholds_fill_missing_fields_from_defaults() {
        let t: DetectionThresholds = toml::from_str("bottom_stop = 0.4").unwrap();
        assert_eq!(t.bottom_stop, 0.4);
        assert_eq!(t.top_stop, 0.20);
        assert_eq!(t.top_slow, 0.80);
    }

    #[test]
    fn detect_frame_flags_only_sectors_with_a_run() {
        let map = SectorMap::new();
        // Bearings 340..360 sit in both `bottom` and `bottom_slow`.
        let frame = SmoothedFrame::from_fn(|i| if (340..360).contains(&i.get()) { 0.5 } else { 4.0 });
        let v = CollisionDetector::default().detect_frame(&map, &frame);
        // 0.5 m trips the 0.8 m slow-down but not the 0.25 m stop.
        assert!(v.is_clear(Sector::Bottom));
        assert!(!v.is_clear(Sector::BottomSlow));
        assert_eq!(v.blocked_sectors(), vec![Sector::BottomSlow]);
    }

    #[test]
    fn run_across_the_seam_is_detected() {
        let map = SectorMap::new();
        // 718, 719, 0, 1, 2 are adjacent in `top_slow` walk order.
        let frame = SmoothedFrame::from_fn(|i| if matches!(i.get(), 718 | 719 | 0 | 1 | 2) { 0.1 } else { 4.0 });
        let v = CollisionDetector::default().detect_frame(&map, &frame);
        assert!(!v.is_clear(Sector::Top));
        assert!(!v.is_clear(Sector::TopSlow));
        assert!(v.is_clear(Sector::TopLeft));
        assert!(v.is_clear(Sector::TopRight));
    }
}
