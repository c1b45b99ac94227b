//! Spatial moving-average filter.
//!
//! For every bearing the filter averages the readings inside a circular
//! window centred on it, skipping "no return" (`0.0`) readings in both the
//! sum and the count.  A window with no valid reading at all produces `0.0`.
//!
//! The window width is not part of the filter: the caller passes the current
//! [`WindowSize`] on every call, because the temporal stage retunes it between
//! cycles.
//!
//! # Example
//!
//! ```rust
//! use scanguard_perception::smoother::SpatialSmoother;
//! use scanguard_types::{ScanFrame, WindowSize};
//!
//! let scan = ScanFrame::uniform(2.0);
//! let smoothed = SpatialSmoother.smooth(&scan, WindowSize::DEFAULT);
//! assert!(smoothed.values().iter().all(|v| (v - 2.0).abs() < 1e-9));
//! ```

use scanguard_types::{ScanFrame, SmoothedFrame, WindowSize};

/// Circular moving-average filter over valid readings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialSmoother;

impl SpatialSmoother {
    /// Smooth one scan with the given window width.
    pub fn smooth(&self, scan: &ScanFrame, window: WindowSize) -> SmoothedFrame {
        let half = window.half_width();
        SmoothedFrame::from_fn(|centre| {
            let (total, valid) = centre
                .window(half)
                .map(|i| scan[i])
                .filter(|&r| r > 0.0)
                .fold((0.0, 0usize), |(sum, n), r| (sum + r, n + 1));
            if valid == 0 { 0.0 } else { total / valid as f64 }
        })
    }
}
