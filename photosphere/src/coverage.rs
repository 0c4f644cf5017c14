//! Visible-disk coverage by surface class
//!
//! The aggregator turns the live features at one instant into the fraction of
//! the projected stellar disk occupied by each surface class. Overlaps are
//! resolved by class priority so every patch of the disk is counted once, and
//! whatever no feature claims is photosphere. Spot coverage is further split
//! into umbra and penumbra, with the umbra of any spot winning over penumbra
//! wherever spots hold the cell.
//!
//! Two integration methods are available:
//! - [`CoverageMethod::Raster`] samples the unit disk on a fixed grid of equal
//!   projected-area cells and assigns each cell to the highest-priority
//!   feature covering it. Exact at grid scale for overlaps, limb clipping and
//!   foreshortening.
//! - [`CoverageMethod::SmallAngle`] sums `r²·μ` per feature and subtracts
//!   planar lens overlaps. Cheap, accurate for small features away from the
//!   limb.

use crate::config::ConfigError;
use crate::feature::{FeatureClass, FeatureId};
use crate::geometry::ObserverFrame;
use crate::surface::LiveFeature;
use log::{error, trace, warn};
use nalgebra::Vector3;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use thiserror::Error;

/// Allowed deviation of the fraction sum from one
pub const FRACTION_TOLERANCE: f64 = 1e-9;

/// Internal consistency failures; any of these is a bug, not a user error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoverageError {
    #[error("{class} fraction {value} is negative beyond tolerance")]
    NegativeFraction { class: SurfaceClass, value: f64 },

    #[error("coverage fractions sum to {sum}, expected 1 within 1e-9")]
    InvariantViolated { sum: f64 },

    #[error("umbra fraction {umbra} does not fit inside spot fraction {spot}")]
    InvalidUmbra { umbra: f64, spot: f64 },
}

/// Classes reported in a coverage breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceClass {
    Photosphere,
    Spot,
    Facula,
    /// Dark core of a spot; part of [`SurfaceClass::Spot`]
    Umbra,
    /// Spot area outside any umbra; part of [`SurfaceClass::Spot`]
    Penumbra,
}

impl SurfaceClass {
    /// Classes that partition the disk
    pub const ALL: [SurfaceClass; 3] = [
        SurfaceClass::Photosphere,
        SurfaceClass::Spot,
        SurfaceClass::Facula,
    ];

    /// Components the spot fraction splits into
    pub const SPOT_COMPONENTS: [SurfaceClass; 2] = [SurfaceClass::Umbra, SurfaceClass::Penumbra];

    pub fn name(&self) -> &'static str {
        match self {
            SurfaceClass::Photosphere => "photosphere",
            SurfaceClass::Spot => "spot",
            SurfaceClass::Facula => "facula",
            SurfaceClass::Umbra => "umbra",
            SurfaceClass::Penumbra => "penumbra",
        }
    }
}

impl From<FeatureClass> for SurfaceClass {
    fn from(class: FeatureClass) -> Self {
        match class {
            FeatureClass::Spot => SurfaceClass::Spot,
            FeatureClass::Facula => SurfaceClass::Facula,
        }
    }
}

impl fmt::Display for SurfaceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fraction of the visible disk per surface class.
///
/// Always contains the photosphere; feature classes with no visible area are
/// left out and read back as zero. The partition classes sum to one within
/// [`FRACTION_TOLERANCE`]. When spots are visible the umbra and penumbra
/// components are stored as well and sum to the spot fraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverage {
    fractions: BTreeMap<SurfaceClass, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    components: BTreeMap<SurfaceClass, f64>,
}

impl Coverage {
    /// A disk with nothing on it
    pub fn photosphere_only() -> Self {
        let mut fractions = BTreeMap::new();
        fractions.insert(SurfaceClass::Photosphere, 1.0);
        Self {
            fractions,
            components: BTreeMap::new(),
        }
    }

    /// Build from raw per-class feature fractions, enforcing the conservation invariants.
    ///
    /// Negative fractions within tolerance are clamped to zero; anything
    /// larger, or a feature total exceeding the disk beyond tolerance, is an
    /// internal error.
    pub fn from_feature_fractions(
        raw: &BTreeMap<FeatureClass, f64>,
    ) -> Result<Self, CoverageError> {
        let mut features = BTreeMap::new();
        for (&class, &value) in raw {
            if !value.is_finite() || value < -FRACTION_TOLERANCE {
                error!("Coverage for {class} is {value}, refusing to normalise");
                return Err(CoverageError::NegativeFraction {
                    class: class.into(),
                    value,
                });
            }
            if value > 0.0 {
                features.insert(SurfaceClass::from(class), value);
            }
        }

        let mut covered: f64 = features.values().sum();
        if covered > 1.0 + FRACTION_TOLERANCE {
            error!("Feature fractions sum to {covered}, more than the whole disk");
            return Err(CoverageError::InvariantViolated { sum: covered });
        }
        if covered > 1.0 {
            for value in features.values_mut() {
                *value /= covered;
            }
            covered = features.values().sum();
        }

        let mut fractions = features;
        fractions.insert(SurfaceClass::Photosphere, (1.0 - covered).max(0.0));

        let coverage = Self {
            fractions,
            components: BTreeMap::new(),
        };
        let total = coverage.total();
        if (total - 1.0).abs() > FRACTION_TOLERANCE {
            error!("Coverage fractions sum to {total} after normalisation");
            return Err(CoverageError::InvariantViolated { sum: total });
        }
        Ok(coverage)
    }

    /// Split the spot fraction, given the share of the disk that is umbra
    pub fn with_umbra(mut self, umbra: f64) -> Result<Self, CoverageError> {
        let spot = self.fraction(SurfaceClass::Spot);
        if !umbra.is_finite() || umbra < -FRACTION_TOLERANCE || umbra > spot + FRACTION_TOLERANCE {
            error!("Umbra fraction {umbra} exceeds spot fraction {spot}");
            return Err(CoverageError::InvalidUmbra { umbra, spot });
        }
        self.components.clear();
        if spot > 0.0 {
            let umbra = umbra.clamp(0.0, spot);
            self.components.insert(SurfaceClass::Umbra, umbra);
            self.components.insert(SurfaceClass::Penumbra, spot - umbra);
        }
        Ok(self)
    }

    /// Fraction for one class or spot component, zero when absent
    pub fn fraction(&self, class: SurfaceClass) -> f64 {
        self.fractions
            .get(&class)
            .or_else(|| self.components.get(&class))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn photosphere(&self) -> f64 {
        self.fraction(SurfaceClass::Photosphere)
    }

    /// Combined fraction of all feature classes
    pub fn feature_fraction(&self) -> f64 {
        self.fractions
            .iter()
            .filter(|(class, _)| **class != SurfaceClass::Photosphere)
            .map(|(_, value)| value)
            .sum()
    }

    pub fn total(&self) -> f64 {
        self.fractions.values().sum()
    }

    /// Partition classes with a stored fraction, in class order
    pub fn iter(&self) -> impl Iterator<Item = (SurfaceClass, f64)> + '_ {
        self.fractions.iter().map(|(class, value)| (*class, *value))
    }

    /// Umbra and penumbra fractions, empty when no spot is visible
    pub fn components(&self) -> impl Iterator<Item = (SurfaceClass, f64)> + '_ {
        self.components.iter().map(|(class, value)| (*class, *value))
    }
}

/// Overlap precedence between feature classes, highest first.
///
/// Must name every feature class exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeatureClass>", into = "Vec<FeatureClass>")]
pub struct ClassPriority(Vec<FeatureClass>);

impl ClassPriority {
    pub fn new(order: Vec<FeatureClass>) -> Result<Self, ConfigError> {
        for class in FeatureClass::ALL {
            let count = order.iter().filter(|c| **c == class).count();
            if count != 1 {
                return Err(ConfigError::InvalidPriority(format!(
                    "{class} appears {count} times in {order:?}"
                )));
            }
        }
        if order.len() != FeatureClass::ALL.len() {
            return Err(ConfigError::InvalidPriority(format!(
                "expected {} classes, got {order:?}",
                FeatureClass::ALL.len()
            )));
        }
        Ok(Self(order))
    }

    /// Position in the order, 0 being the highest priority
    pub fn rank(&self, class: FeatureClass) -> usize {
        self.0
            .iter()
            .position(|c| *c == class)
            .unwrap_or(self.0.len())
    }

    pub fn order(&self) -> &[FeatureClass] {
        &self.0
    }
}

impl Default for ClassPriority {
    /// Bright faculae drawn over spots
    fn default() -> Self {
        Self(vec![FeatureClass::Facula, FeatureClass::Spot])
    }
}

impl TryFrom<Vec<FeatureClass>> for ClassPriority {
    type Error = ConfigError;

    fn try_from(order: Vec<FeatureClass>) -> Result<Self, Self::Error> {
        Self::new(order)
    }
}

impl From<ClassPriority> for Vec<FeatureClass> {
    fn from(priority: ClassPriority) -> Self {
        priority.0
    }
}

/// Disk integration method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageMethod {
    /// Regular `resolution × resolution` grid over the projected disk
    Raster { resolution: usize },
    /// Per-feature `r²·μ` with lens-overlap clipping
    SmallAngle,
}

impl Default for CoverageMethod {
    fn default() -> Self {
        CoverageMethod::Raster { resolution: 400 }
    }
}

impl CoverageMethod {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            CoverageMethod::Raster { resolution } if resolution < 2 => {
                Err(ConfigError::InvalidResolution(resolution))
            }
            _ => Ok(()),
        }
    }
}

/// Cell-centre depths of the unit disk in observer coordinates.
///
/// `depth[[row, col]]` is the z coordinate of the visible surface behind the
/// cell centre, NaN outside the disk. Independent of the star, so one grid
/// serves every query.
#[derive(Debug, Clone)]
struct DiskGrid {
    step: f64,
    depth: Array2<f64>,
    inside: u64,
}

impl DiskGrid {
    fn new(resolution: usize) -> Self {
        let step = 2.0 / resolution as f64;
        let centre = |i: usize| -1.0 + (i as f64 + 0.5) * step;
        let depth = Array2::from_shape_fn((resolution, resolution), |(row, col)| {
            let (x, y) = (centre(col), centre(row));
            let rho2 = x * x + y * y;
            if rho2 <= 1.0 {
                (1.0 - rho2).sqrt()
            } else {
                f64::NAN
            }
        });
        let inside = depth.iter().filter(|z| !z.is_nan()).count() as u64;
        Self {
            step,
            depth,
            inside,
        }
    }

    fn centre(&self, i: usize) -> f64 {
        -1.0 + (i as f64 + 0.5) * self.step
    }
}

/// One feature's cap in observer coordinates, ready for cell tests
#[derive(Debug, Clone)]
struct Footprint {
    rank: usize,
    id: FeatureId,
    class: FeatureClass,
    centre: Vector3<f64>,
    radius: f64,
    cos_radius: f64,
    /// Half-width of the projected bounding box (chord length)
    reach: f64,
    /// Share of the cap area that is umbra, zero for faculae
    umbra_share: f64,
    /// Cosine of the umbra cap radius; equal-area on the sphere
    cos_umbra: Option<f64>,
}

impl Footprint {
    fn covers(&self, x: f64, y: f64, z: f64) -> bool {
        (x - self.centre.x).abs() <= self.reach
            && x * self.centre.x + y * self.centre.y + z * self.centre.z >= self.cos_radius
    }

    fn umbra_covers(&self, x: f64, y: f64, z: f64) -> bool {
        self.cos_umbra.is_some_and(|cos_umbra| {
            (x - self.centre.x).abs() <= self.reach
                && x * self.centre.x + y * self.centre.y + z * self.centre.z >= cos_umbra
        })
    }

    fn spans_row(&self, y: f64) -> bool {
        (y - self.centre.y).abs() <= self.reach
    }
}

/// Stateless per-instant disk integrator
#[derive(Debug, Clone)]
pub struct CoverageAggregator {
    method: CoverageMethod,
    priority: ClassPriority,
    grid: Option<DiskGrid>,
}

impl CoverageAggregator {
    /// Build an aggregator, precomputing the disk grid for raster integration
    pub fn new(method: CoverageMethod, priority: ClassPriority) -> Result<Self, ConfigError> {
        method.validate()?;
        let grid = match method {
            CoverageMethod::Raster { resolution } => Some(DiskGrid::new(resolution)),
            CoverageMethod::SmallAngle => None,
        };
        Ok(Self {
            method,
            priority,
            grid,
        })
    }

    pub fn method(&self) -> CoverageMethod {
        self.method
    }

    pub fn priority(&self) -> &ClassPriority {
        &self.priority
    }

    /// Coverage breakdown of the disk seen through `frame`.
    ///
    /// Features must carry their observer-frame longitudes and radii for the
    /// query instant, as returned by [`crate::SurfaceMap::live_features_at`].
    pub fn aggregate(
        &self,
        features: &[LiveFeature<'_>],
        frame: &ObserverFrame,
    ) -> Result<Coverage, CoverageError> {
        let footprints = self.footprints(features, frame);
        if footprints.is_empty() {
            return Ok(Coverage::photosphere_only());
        }

        let (raw, umbra) = match &self.grid {
            Some(grid) => self.rasterise(grid, &footprints),
            None => self.small_angle(&footprints),
        };
        trace!(
            "{} visible footprints of {} live features: {raw:?}, umbra {umbra}",
            footprints.len(),
            features.len()
        );
        Coverage::from_feature_fractions(&raw)?.with_umbra(umbra)
    }

    /// Visible footprints ordered by (priority rank, id)
    fn footprints(&self, features: &[LiveFeature<'_>], frame: &ObserverFrame) -> Vec<Footprint> {
        let mut footprints: Vec<Footprint> = features
            .iter()
            .filter(|live| live.radius > 0.0)
            .filter_map(|live| {
                let centre = frame.to_observer(&live.location());
                let radius = live.radius.min(PI);
                // Entirely behind the limb
                if radius < FRAC_PI_2 && centre.z <= -radius.sin() {
                    return None;
                }
                let cos_radius = radius.cos();
                let umbra_share = live.feature.contrast().umbra_area_fraction();
                Some(Footprint {
                    rank: self.priority.rank(live.feature.class()),
                    id: live.feature.id(),
                    class: live.feature.class(),
                    centre,
                    radius,
                    cos_radius,
                    reach: 2.0 * (0.5 * radius).sin(),
                    umbra_share: umbra_share.unwrap_or(0.0),
                    cos_umbra: umbra_share.map(|share| 1.0 - share * (1.0 - cos_radius)),
                })
            })
            .collect();
        footprints.sort_by_key(|fp| (fp.rank, fp.id));
        footprints
    }

    /// Per-class fractions plus the umbra fraction, counted cell by cell
    fn rasterise(&self, grid: &DiskGrid, footprints: &[Footprint]) -> (BTreeMap<FeatureClass, f64>, f64) {
        let classes = self.priority.order();
        let rows = grid.depth.nrows();
        let umbra_slot = classes.len();

        let counts = (0..rows)
            .into_par_iter()
            .map(|row| {
                let mut counts = vec![0u64; umbra_slot + 1];
                let y = grid.centre(row);
                let active: Vec<&Footprint> =
                    footprints.iter().filter(|fp| fp.spans_row(y)).collect();
                if active.is_empty() {
                    return counts;
                }
                for (col, &z) in grid.depth.row(row).iter().enumerate() {
                    if z.is_nan() {
                        continue;
                    }
                    let x = grid.centre(col);
                    if let Some(fp) = active.iter().find(|fp| fp.covers(x, y, z)) {
                        counts[fp.rank] += 1;
                        if fp.class == FeatureClass::Spot
                            && active.iter().any(|spot| spot.umbra_covers(x, y, z))
                        {
                            counts[umbra_slot] += 1;
                        }
                    }
                }
                counts
            })
            .reduce(
                || vec![0u64; umbra_slot + 1],
                |mut a, b| {
                    for (total, count) in a.iter_mut().zip(b) {
                        *total += count;
                    }
                    a
                },
            );

        let inside = grid.inside as f64;
        let umbra = counts[umbra_slot] as f64 / inside;
        let fractions = classes
            .iter()
            .zip(counts)
            .map(|(class, count)| (*class, count as f64 / inside))
            .collect();
        (fractions, umbra)
    }

    /// Per-class fractions plus the umbra fraction; each spot's umbra is its
    /// share of whatever area the spot keeps after overlap clipping
    fn small_angle(&self, footprints: &[Footprint]) -> (BTreeMap<FeatureClass, f64>, f64) {
        let classes = self.priority.order();
        let mut totals = vec![0.0; classes.len()];
        let mut umbra = 0.0;

        for (i, fp) in footprints.iter().enumerate() {
            let mu = fp.centre.z.max(0.0);
            let mut area = fp.radius * fp.radius * mu;
            for claimed in &footprints[..i] {
                let separation = fp
                    .centre
                    .cross(&claimed.centre)
                    .norm()
                    .atan2(fp.centre.dot(&claimed.centre));
                let mean_mu = 0.5 * (mu + claimed.centre.z.max(0.0));
                area -= lens_area_over_pi(fp.radius, claimed.radius, separation) * mean_mu;
            }
            let area = area.max(0.0);
            totals[fp.rank] += area;
            umbra += area * fp.umbra_share;
        }

        // Large or crowded features can overfill the disk under this approximation
        let covered: f64 = totals.iter().sum();
        if covered > 1.0 {
            warn!("Small-angle coverage {covered} saturates the disk, rescaling to 1");
            for total in totals.iter_mut() {
                *total /= covered;
            }
            umbra /= covered;
        }

        (classes.iter().copied().zip(totals).collect(), umbra)
    }
}

/// Intersection area of two planar circles with radii `r1`, `r2` and centre
/// distance `d`, divided by π so a contained circle gives exactly `r²`
fn lens_area_over_pi(r1: f64, r2: f64, d: f64) -> f64 {
    if d >= r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        let r = r1.min(r2);
        return r * r;
    }
    let a1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0).acos();
    let a2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0).acos();
    let kite = (-d + r1 + r2) * (d + r1 - r2) * (d - r1 + r2) * (d + r1 + r2);
    (r1 * r1 * a1 + r2 * r2 * a2 - 0.5 * kite.max(0.0).sqrt()) / PI
}
