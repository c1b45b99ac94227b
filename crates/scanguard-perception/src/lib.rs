//! `scanguard-perception` – scan processing core.
//!
//! Turns a raw 720-sample range scan into per-sector collision flags.  All
//! types here are plain synchronous values; ownership of the mutable state
//! (history and window width) is left to the caller.
//!
//! # Modules
//!
//! - [`sector`] – [`SectorMap`][sector::SectorMap]: the fixed, possibly
//!   overlapping partition of the scan circle into eight named sectors.
//! - [`smoother`] – [`SpatialSmoother`][smoother::SpatialSmoother]: circular
//!   moving average that ignores "no return" readings.
//! - [`aggregator`] – [`TemporalAggregator`][aggregator::TemporalAggregator]:
//!   rolling five-frame history, weighted combination, and the instability
//!   score that retunes the smoothing window.
//! - [`detector`] – [`CollisionDetector`][detector::CollisionDetector]:
//!   run-length obstacle confirmation against per-sector thresholds.

pub mod aggregator;
pub mod detector;
pub mod sector;
pub mod smoother;

pub use aggregator::TemporalAggregator;
pub use detector::{CollisionDetector, DetectionThresholds};
pub use sector::SectorMap;
pub use smoother::SpatialSmoother;
