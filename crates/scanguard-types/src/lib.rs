//! `scanguard-types` – shared data model for the scan-guard stack.
//!
//! Every crate in the workspace speaks in these types: raw [`ScanFrame`]s
//! coming off the range finder, [`SmoothedFrame`]s produced by the spatial
//! filter, the fixed [`Sector`] layout, the per-cycle [`CollisionVector`], the
//! adaptive [`WindowSize`], and the [`Event`] envelope routed over the bus.

use std::fmt;
use std::ops::Index;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Number of angular samples in one full revolution of the range finder.
pub const SCAN_SAMPLES: usize = 720;

// ────────────────────────────────────────────────────────────────────────────
// AngularIndex
// ────────────────────────────────────────────────────────────────────────────

/// A position on the 720-sample circle.
///
/// All wrap-around arithmetic in the workspace goes through this type, so an
/// `AngularIndex` is always in `[0, SCAN_SAMPLES)` and can index any frame
/// without a bounds check failing.
///
/// ```
/// use scanguard_types::{AngularIndex, SCAN_SAMPLES};
///
/// let last = AngularIndex::new(SCAN_SAMPLES - 1);
/// assert_eq!(last.next().get(), 0);
/// assert_eq!(AngularIndex::new(3).offset(-5).get(), 718);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AngularIndex(usize);

impl AngularIndex {
    /// Wrap any raw index onto the circle.
    pub fn new(raw: usize) -> Self {
        Self(raw % SCAN_SAMPLES)
    }

    /// The raw position in `[0, SCAN_SAMPLES)`.
    pub fn get(self) -> usize {
        self.0
    }

    /// The index `delta` steps away, wrapping in either direction.
    pub fn offset(self, delta: isize) -> Self {
        let n = SCAN_SAMPLES as isize;
        Self((self.0 as isize + delta).rem_euclid(n) as usize)
    }

    /// The next index clockwise, wrapping `719 → 0`.
    pub fn next(self) -> Self {
        self.offset(1)
    }

    /// Every index on the circle in ascending order.
    pub fn all() -> impl Iterator<Item = AngularIndex> {
        (0..SCAN_SAMPLES).map(AngularIndex)
    }

    /// Walk the half-open circular range `[start, end)`.
    ///
    /// When `start > end` the walk passes through index 0.  When
    /// `start == end` the range is empty.
    pub fn circular_range(start: AngularIndex, end: AngularIndex) -> impl Iterator<Item = AngularIndex> {
        let len = (end.0 + SCAN_SAMPLES - start.0) % SCAN_SAMPLES;
        (0..len).map(move |step| start.offset(step as isize))
    }

    /// The closed window `[self - half, self + half]`, wrapped.
    pub fn window(self, half: usize) -> impl Iterator<Item = AngularIndex> {
        let half = half as isize;
        (-half..=half).map(move |delta| self.offset(delta))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frames
// ────────────────────────────────────────────────────────────────────────────

/// One revolution of raw distance readings in metres.
///
/// `0.0` means "no return" and is never a real zero-distance obstacle.
/// Construction is the only place the sample count is checked.  Readings are
/// cleaned on the way in:
///
/// * NaN and negative values become `0.0` ("no return"),
/// * `+inf` and anything beyond the sensor's maximum range become that
///   maximum, so open space reads as far away rather than blocked.
///
/// Downstream code therefore sees exactly [`SCAN_SAMPLES`] finite,
/// non-negative values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ScanFrame {
    ranges: Vec<f64>,
}

impl ScanFrame {
    /// Far value used when the sensor does not report its own `range_max`.
    pub const DEFAULT_MAX_RANGE: f64 = 30.0;

    /// Build a frame from exactly [`SCAN_SAMPLES`] readings, capped at
    /// [`ScanFrame::DEFAULT_MAX_RANGE`].
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ScanLength`] when `ranges` has the wrong length.
    pub fn new(ranges: Vec<f64>) -> Result<Self, ScanError> {
        Self::with_max_range(ranges, Self::DEFAULT_MAX_RANGE)
    }

    /// Build a frame, mapping `+inf` and out-of-range readings to
    /// `max_range`.
    ///
    /// A `max_range` that is not a positive finite number falls back to
    /// [`ScanFrame::DEFAULT_MAX_RANGE`].
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ScanLength`] when `ranges` has the wrong length.
    pub fn with_max_range(mut ranges: Vec<f64>, max_range: f64) -> Result<Self, ScanError> {
        if ranges.len() != SCAN_SAMPLES {
            return Err(ScanError::ScanLength {
                expected: SCAN_SAMPLES,
                actual: ranges.len(),
            });
        }
        let max_range = usable_max_range(max_range);
        for r in ranges.iter_mut() {
            *r = clean_range(*r, max_range);
        }
        Ok(Self { ranges })
    }

    /// Build a frame from single-precision LaserScan ranges.
    pub fn from_ranges(ranges: &[f32], max_range: f32) -> Result<Self, ScanError> {
        Self::with_max_range(ranges.iter().map(|&r| f64::from(r)).collect(), f64::from(max_range))
    }

    /// A frame where every bearing reads `distance`.
    pub fn uniform(distance: f64) -> Self {
        Self {
            ranges: vec![clean_range(distance, Self::DEFAULT_MAX_RANGE); SCAN_SAMPLES],
        }
    }

    /// The readings in angular order.
    pub fn ranges(&self) -> &[f64] {
        &self.ranges
    }

    /// `true` when the reading at `index` is a real return.
    pub fn is_valid(&self, index: AngularIndex) -> bool {
        self[index] > 0.0
    }
}

fn usable_max_range(max_range: f64) -> f64 {
    if max_range.is_finite() && max_range > 0.0 {
        max_range
    } else {
        ScanFrame::DEFAULT_MAX_RANGE
    }
}

fn clean_range(r: f64, max_range: f64) -> f64 {
    if r.is_nan() || r < 0.0 {
        0.0
    } else if r > max_range {
        max_range
    } else {
        r
    }
}

impl TryFrom<Vec<f64>> for ScanFrame {
    type Error = ScanError;

    fn try_from(ranges: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(ranges)
    }
}

impl From<ScanFrame> for Vec<f64> {
    fn from(frame: ScanFrame) -> Self {
        frame.ranges
    }
}

impl Index<AngularIndex> for ScanFrame {
    type Output = f64;

    fn index(&self, index: AngularIndex) -> &f64 {
        &self.ranges[index.get()]
    }
}

/// One revolution of spatially averaged distances.
///
/// Same layout as [`ScanFrame`]; `0.0` still means "unknown" (no valid reading
/// anywhere in the averaging window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct SmoothedFrame {
    values: Vec<f64>,
}

impl SmoothedFrame {
    /// Wrap exactly [`SCAN_SAMPLES`] averaged values.
    pub fn new(values: Vec<f64>) -> Result<Self, ScanError> {
        if values.len() != SCAN_SAMPLES {
            return Err(ScanError::ScanLength {
                expected: SCAN_SAMPLES,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    /// Build a frame by evaluating `f` at every bearing in order.
    pub fn from_fn(f: impl FnMut(AngularIndex) -> f64) -> Self {
        Self {
            values: AngularIndex::all().map(f).collect(),
        }
    }

    /// A frame with every value set to `value`.
    pub fn uniform(value: f64) -> Self {
        Self {
            values: vec![value; SCAN_SAMPLES],
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl TryFrom<Vec<f64>> for SmoothedFrame {
    type Error = ScanError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<SmoothedFrame> for Vec<f64> {
    fn from(frame: SmoothedFrame) -> Self {
        frame.values
    }
}

impl Index<AngularIndex> for SmoothedFrame {
    type Output = f64;

    fn index(&self, index: AngularIndex) -> &f64 {
        &self.values[index.get()]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sectors and collision output
// ────────────────────────────────────────────────────────────────────────────

/// Named region of the scan circle.
///
/// The discriminant is the slot of the sector in a [`CollisionVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    #[serde(rename = "top")]
    Top = 0,
    #[serde(rename = "top_R")]
    TopRight = 1,
    #[serde(rename = "top_L")]
    TopLeft = 2,
    #[serde(rename = "bottom")]
    Bottom = 3,
    #[serde(rename = "bottom_R")]
    BottomRight = 4,
    #[serde(rename = "bottom_L")]
    BottomLeft = 5,
    /// Wide early-warning region ahead, checked against the slow threshold.
    #[serde(rename = "top_slow")]
    TopSlow = 6,
    /// Wide early-warning region behind, checked against the slow threshold.
    #[serde(rename = "bottom_slow")]
    BottomSlow = 7,
}

impl Sector {
    /// Number of sectors, and length of a [`CollisionVector`].
    pub const COUNT: usize = 8;

    /// All sectors in output order.
    pub const ALL: [Sector; Sector::COUNT] = [
        Sector::Top,
        Sector::TopRight,
        Sector::TopLeft,
        Sector::Bottom,
        Sector::BottomRight,
        Sector::BottomLeft,
        Sector::TopSlow,
        Sector::BottomSlow,
    ];

    /// Slot of this sector in a [`CollisionVector`].
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Sector::Top => "top",
            Sector::TopRight => "top_R",
            Sector::TopLeft => "top_L",
            Sector::Bottom => "bottom",
            Sector::BottomRight => "bottom_R",
            Sector::BottomLeft => "bottom_L",
            Sector::TopSlow => "top_slow",
            Sector::BottomSlow => "bottom_slow",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One flag per [`Sector`]: `0` means an obstacle is confirmed (stop or slow
/// down), `1` means the sector is clear.
///
/// ```
/// use scanguard_types::{CollisionVector, Sector};
///
/// let mut v = CollisionVector::all_clear();
/// v.set_blocked(Sector::Bottom);
/// assert_eq!(v.as_i16_array(), [1, 1, 1, 0, 1, 1, 1, 1]);
/// assert_eq!(v.blocked_sectors(), vec![Sector::Bottom]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u8; 8]", into = "[u8; 8]")]
pub struct CollisionVector([u8; Sector::COUNT]);

impl CollisionVector {
    pub const BLOCKED: u8 = 0;
    pub const CLEAR: u8 = 1;

    /// A vector with every sector clear.
    pub fn all_clear() -> Self {
        Self([Self::CLEAR; Sector::COUNT])
    }

    pub fn get(&self, sector: Sector) -> u8 {
        self.0[sector.slot()]
    }

    pub fn is_clear(&self, sector: Sector) -> bool {
        self.get(sector) == Self::CLEAR
    }

    pub fn set(&mut self, sector: Sector, flag: u8) {
        self.0[sector.slot()] = if flag == Self::BLOCKED { Self::BLOCKED } else { Self::CLEAR };
    }

    pub fn set_blocked(&mut self, sector: Sector) {
        self.set(sector, Self::BLOCKED);
    }

    /// Sectors flagged as blocked, in output order.
    pub fn blocked_sectors(&self) -> Vec<Sector> {
        Sector::ALL
            .into_iter()
            .filter(|s| !self.is_clear(*s))
            .collect()
    }

    /// Wire form used by `std_msgs/Int16MultiArray`.
    pub fn as_i16_array(&self) -> [i16; Sector::COUNT] {
        self.0.map(i16::from)
    }
}

impl Default for CollisionVector {
    fn default() -> Self {
        Self::all_clear()
    }
}

impl TryFrom<[u8; Sector::COUNT]> for CollisionVector {
    type Error = ScanError;

    fn try_from(flags: [u8; Sector::COUNT]) -> Result<Self, Self::Error> {
        if let Some((slot, flag)) = flags
            .iter()
            .enumerate()
            .find(|&(_, &f)| f != Self::BLOCKED && f != Self::CLEAR)
        {
            return Err(ScanError::Parsing(format!(
                "collision flag for {} must be 0 or 1, got {flag}",
                Sector::ALL[slot]
            )));
        }
        Ok(Self(flags))
    }
}

impl From<CollisionVector> for [u8; Sector::COUNT] {
    fn from(vector: CollisionVector) -> Self {
        vector.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Window size
// ────────────────────────────────────────────────────────────────────────────

/// Signed delta received on the tuning topic.  One unit moves the window by
/// [`WindowTuning::STEP`] samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowTuning(pub i8);

impl WindowTuning {
    pub const STEP: i64 = 100;
}

/// Width, in samples, of the spatial moving-average window.
///
/// Always within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct WindowSize(usize);

impl WindowSize {
    pub const MIN: usize = 31;
    pub const MAX: usize = 101;
    pub const DEFAULT: WindowSize = WindowSize(Self::MIN);

    /// Clamp any raw width into `[MIN, MAX]`.
    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(Self::MIN as i64, Self::MAX as i64) as usize)
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Samples on each side of the centre: `floor(width / 2)`.
    pub fn half_width(self) -> usize {
        self.0 / 2
    }

    /// Width moved by `delta` samples, clamped.
    pub fn adjusted(self, delta: i64) -> Self {
        Self::clamped(self.0 as i64 + delta)
    }

    /// Apply an operator tuning delta of `tuning * STEP` samples.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::TuningRejected`] when the result would be
    /// negative; the caller keeps its previous width.
    pub fn apply_tuning(self, tuning: WindowTuning) -> Result<Self, ScanError> {
        let requested = self.0 as i64 + i64::from(tuning.0) * WindowTuning::STEP;
        if requested < 0 {
            return Err(ScanError::TuningRejected {
                current: self.0,
                requested,
            });
        }
        Ok(Self::clamped(requested))
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for WindowSize {
    type Error = ScanError;

    fn try_from(raw: usize) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(ScanError::Parsing(format!(
                "window size {raw} outside [{}, {}]",
                Self::MIN,
                Self::MAX
            )))
        }
    }
}

impl From<WindowSize> for usize {
    fn from(window: WindowSize) -> Self {
        window.0
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one adaptive-window step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowAdaptation {
    pub previous: WindowSize,
    pub current: WindowSize,
    /// Mean valid/invalid flicker count per bearing, in `[0, 4]`.
    pub instability: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "scanguard-middleware::rosbridge/scan"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Scan(ScanFrame),
    WindowTuning(WindowTuning),
    Collision(CollisionVector),
    WindowAdapted(WindowAdaptation),
}

/// Error type shared by every crate in the workspace.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ScanError {
    #[error("Malformed scan: expected {expected} samples, got {actual}")]
    ScanLength { expected: usize, actual: usize },

    #[error("Window tuning rejected: {current} would become {requested}")]
    TuningRejected { current: usize, requested: i64 },

    #[error("Parsing Error: {0}")]
    Parsing(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Pipeline lock poisoned: {0}")]
    Poisoned(String),
}
