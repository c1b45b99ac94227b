//! Static partition of the scan circle into named [`Sector`]s.
//!
//! Each sector is a half-open circular range `[start, end)` of angular
//! indices.  Ranges may wrap through index 0 and sectors may overlap: the
//! corner sectors share bearings with `top`/`bottom`, and the `*_slow`
//! early-warning sectors sit on the same heading as their stop sectors.
//!
//! The map is computed once and shared read-only by everything that needs to
//! split a frame into sectors.
//!
//! # Example
//!
//! ```rust
//! use scanguard_perception::sector::{build_sector, SectorMap};
//! use scanguard_types::{AngularIndex, Sector};
//!
//! let wrapped = build_sector(AngularIndex::new(718), AngularIndex::new(2));
//! assert_eq!(wrapped.len(), 4);
//!
//! let map = SectorMap::new();
//! assert_eq!(map.indices(Sector::Top).first().map(|i| i.get()), Some(635));
//! assert_eq!(map.indices(Sector::Top).len(), 169);
//! ```

use scanguard_types::{AngularIndex, Sector, SmoothedFrame};

/// `(sector, start, end)` in angular index units, end exclusive.
pub const SECTOR_RANGES: [(Sector, usize, usize); Sector::COUNT] = [
    (Sector::Top, 635, 84),
    (Sector::TopRight, 540, 659),
    (Sector::TopLeft, 60, 179),
    (Sector::Bottom, 300, 419),
    (Sector::BottomRight, 435, 524),
    (Sector::BottomLeft, 195, 284),
    (Sector::TopSlow, 674, 45),
    (Sector::BottomSlow, 315, 405),
];

/// Walk forward from `start` until `end` is reached, excluding `end`.
pub fn build_sector(start: AngularIndex, end: AngularIndex) -> Vec<AngularIndex> {
    AngularIndex::circular_range(start, end).collect()
}

/// Ordered angular indices for every [`Sector`].
#[derive(Debug, Clone)]
pub struct SectorMap {
    groups: [Vec<AngularIndex>; Sector::COUNT],
}

impl SectorMap {
    /// Build the fixed sector layout.
    pub fn new() -> Self {
        let mut groups: [Vec<AngularIndex>; Sector::COUNT] = Default::default();
        for (sector, start, end) in SECTOR_RANGES {
            groups[sector.slot()] = build_sector(AngularIndex::new(start), AngularIndex::new(end));
        }
        Self { groups }
    }

    /// Indices belonging to `sector`, in walk order.
    pub fn indices(&self, sector: Sector) -> &[AngularIndex] {
        &self.groups[sector.slot()]
    }

    /// The values of `frame` that fall inside `sector`, in walk order.
    ///
    /// A sector that wraps through index 0 yields a contiguous slice
    /// (`..., 718, 719, 0, 1, ...`), so runs across the seam stay adjacent.
    pub fn sector_values(&self, sector: Sector, frame: &SmoothedFrame) -> Vec<f64> {
        self.indices(sector).iter().map(|&i| frame[i]).collect()
    }
}

impl Default for SectorMap {
    fn default() -> Self {
        Self::new()
    }
}
