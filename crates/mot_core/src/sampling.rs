//! Grid sampling of an acceleration field for heatmap and quiver rendering.
//!
//! These samplers only produce data; drawing is left to external plotting
//! collaborators. Each sampler issues a single vectorized field call over
//! the whole grid.

use crate::traits::{AccelerationField, Ensemble};
use anyhow::{bail, Result};
use nalgebra::DMatrix;

/// A coordinate axis label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn from_label(label: char) -> Result<Self> {
        match label {
            'x' => Ok(Axis::X),
            'y' => Ok(Axis::Y),
            'z' => Ok(Axis::Z),
            other => bail!("Unknown axis label '{other}'; expected x, y, or z."),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// An ordered pair of distinct axes selecting a sampling plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    pub first: Axis,
    pub second: Axis,
}

impl Plane {
    pub fn new(first: Axis, second: Axis) -> Result<Self> {
        if first == second {
            bail!("Plane axes must be distinct, got {first:?} twice.");
        }
        Ok(Self { first, second })
    }

    /// Parses a two-letter label such as "xy" or "yz".
    pub fn from_label(label: &str) -> Result<Self> {
        let mut chars = label.chars();
        let (Some(a), Some(b), None) = (chars.next(), chars.next(), chars.next()) else {
            bail!("Plane label must be two axis letters, got {label:?}.");
        };
        Plane::new(Axis::from_label(a)?, Axis::from_label(b)?)
    }

    /// Index of the axis orthogonal to the plane.
    fn orthogonal_index(self) -> usize {
        3 - self.first.index() - self.second.index()
    }
}

/// Acceleration field sampled over a 2D spatial grid at zero velocity.
#[derive(Debug, Clone)]
pub struct FieldSample {
    /// Grid coordinates along the plane's first axis.
    pub first_coords: Vec<f64>,
    /// Grid coordinates along the plane's second axis.
    pub second_coords: Vec<f64>,
    /// All sampled positions, (numpoints^2, 3); the out-of-plane component
    /// is zero. Row a * numpoints + b holds (first_coords[a],
    /// second_coords[b]) in the plane columns.
    pub points: Ensemble,
    /// Raw acceleration vectors at each point, same row order as `points`.
    pub vectors: Ensemble,
    /// Acceleration magnitude grid, (numpoints, numpoints);
    /// `magnitude[(p, q)]` is the norm at first_coords[q], second_coords[p].
    pub magnitude: DMatrix<f64>,
}

/// Samples the acceleration magnitude and vectors of `field` over a square
/// grid in the given plane, with zero velocity everywhere.
pub fn sample_plane<F: AccelerationField + ?Sized>(
    field: &F,
    plane: Plane,
    limits: [(f64, f64); 2],
    numpoints: usize,
) -> Result<FieldSample> {
    validate_grid(limits, numpoints)?;

    let first_coords = linspace(limits[0].0, limits[0].1, numpoints);
    let second_coords = linspace(limits[1].0, limits[1].1, numpoints);

    // The in-plane columns, in ascending axis order, receive the first and
    // second grid coordinates; the orthogonal column stays zero.
    let k = plane.orthogonal_index();
    let (col_a, col_b) = match k {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };

    let total = numpoints * numpoints;
    let mut points: Ensemble = DMatrix::zeros(total, 3);
    for (a, &fa) in first_coords.iter().enumerate() {
        for (b, &sb) in second_coords.iter().enumerate() {
            let row = a * numpoints + b;
            points[(row, col_a)] = fa;
            points[(row, col_b)] = sb;
        }
    }

    let velocities: Ensemble = DMatrix::zeros(total, 3);
    let vectors = field.eval(&points, &velocities);
    if vectors.shape() != (total, 3) {
        bail!(
            "Acceleration field returned shape {:?}, expected ({}, 3).",
            vectors.shape(),
            total
        );
    }

    // Row-major reshape of the per-point norms into (n, n), then transpose.
    let mut magnitude = DMatrix::zeros(numpoints, numpoints);
    for a in 0..numpoints {
        for b in 0..numpoints {
            magnitude[(b, a)] = vectors.row(a * numpoints + b).norm();
        }
    }

    Ok(FieldSample {
        first_coords,
        second_coords,
        points,
        vectors,
        magnitude,
    })
}

/// Acceleration along one axis sampled over a (position, velocity) grid.
#[derive(Debug, Clone)]
pub struct PhaseSpaceSample {
    /// Position grid coordinates along the chosen axis.
    pub positions: Vec<f64>,
    /// Velocity grid coordinates along the chosen axis.
    pub velocities: Vec<f64>,
    /// Axis component of the acceleration, (numpoints, numpoints);
    /// `acceleration[(p, q)]` corresponds to positions[q], velocities[p].
    pub acceleration: DMatrix<f64>,
}

/// Samples the axis component of `field` over a position/velocity grid
/// along a single axis, with all other components zero.
pub fn sample_phase_space<F: AccelerationField + ?Sized>(
    field: &F,
    axis: Axis,
    limits: [(f64, f64); 2],
    numpoints: usize,
) -> Result<PhaseSpaceSample> {
    validate_grid(limits, numpoints)?;

    let i = axis.index();
    let positions = linspace(limits[0].0, limits[0].1, numpoints);
    let velocities = linspace(limits[1].0, limits[1].1, numpoints);

    let total = numpoints * numpoints;
    let mut x: Ensemble = DMatrix::zeros(total, 3);
    let mut v: Ensemble = DMatrix::zeros(total, 3);
    for (a, &pa) in positions.iter().enumerate() {
        for (b, &vb) in velocities.iter().enumerate() {
            let row = a * numpoints + b;
            x[(row, i)] = pa;
            v[(row, i)] = vb;
        }
    }

    let a = field.eval(&x, &v);
    if a.shape() != (total, 3) {
        bail!(
            "Acceleration field returned shape {:?}, expected ({}, 3).",
            a.shape(),
            total
        );
    }

    let mut acceleration = DMatrix::zeros(numpoints, numpoints);
    for p in 0..numpoints {
        for q in 0..numpoints {
            acceleration[(q, p)] = a[(p * numpoints + q, i)];
        }
    }

    Ok(PhaseSpaceSample {
        positions,
        velocities,
        acceleration,
    })
}

fn validate_grid(limits: [(f64, f64); 2], numpoints: usize) -> Result<()> {
    if numpoints < 2 {
        bail!("Grid needs at least 2 points per axis, got {numpoints}.");
    }
    for (lo, hi) in limits {
        if !lo.is_finite() || !hi.is_finite() {
            bail!("Grid limits must be finite, got ({lo}, {hi}).");
        }
        if lo >= hi {
            bail!("Grid limits must be increasing, got ({lo}, {hi}).");
        }
    }
    Ok(())
}

fn linspace(lo: f64, hi: f64, numpoints: usize) -> Vec<f64> {
    let step = (hi - lo) / (numpoints - 1) as f64;
    (0..numpoints).map(|i| lo + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::{sample_phase_space, sample_plane, Axis, Plane};
    use crate::traits::Ensemble;
    use nalgebra::DMatrix;

    fn zero_field(x: &Ensemble, _v: &Ensemble) -> Ensemble {
        DMatrix::zeros(x.nrows(), 3)
    }

    /// a = -X, a pure restoring force.
    fn restoring(x: &Ensemble, _v: &Ensemble) -> Ensemble {
        -x.clone()
    }

    #[test]
    fn plane_labels_parse_and_validate() {
        let plane = Plane::from_label("xy").unwrap();
        assert_eq!(plane.first, Axis::X);
        assert_eq!(plane.second, Axis::Y);
        assert!(Plane::from_label("xx").is_err());
        assert!(Plane::from_label("xw").is_err());
        assert!(Plane::from_label("xyz").is_err());
    }

    #[test]
    fn zero_field_samples_to_zero_magnitude() {
        let plane = Plane::from_label("xy").unwrap();
        let sample = sample_plane(&zero_field, plane, [(-1.0, 1.0), (-1.0, 1.0)], 5).unwrap();
        assert_eq!(sample.points.nrows(), 25);
        assert_eq!(sample.magnitude.shape(), (5, 5));
        assert!(sample.magnitude.iter().all(|&m| m == 0.0));
        // xy plane leaves the z column untouched.
        for r in 0..25 {
            assert_eq!(sample.points[(r, 2)], 0.0);
        }
    }

    #[test]
    fn restoring_field_magnitude_matches_grid_geometry() {
        let plane = Plane::from_label("xy").unwrap();
        let sample = sample_plane(&restoring, plane, [(-1.0, 1.0), (-1.0, 1.0)], 3).unwrap();
        // first_coords = second_coords = [-1, 0, 1].
        // magnitude[(p, q)] = |(-first[q], -second[p])|.
        assert!((sample.magnitude[(0, 2)] - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((sample.magnitude[(1, 1)] - 0.0).abs() < 1e-12);
        assert!((sample.magnitude[(1, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn yz_plane_zeroes_the_x_column() {
        let plane = Plane::from_label("yz").unwrap();
        let sample = sample_plane(&restoring, plane, [(-2.0, 2.0), (0.0, 1.0)], 3).unwrap();
        for r in 0..9 {
            assert_eq!(sample.points[(r, 0)], 0.0);
        }
        // Row a * n + b holds (first[a], second[b]) in columns (y, z).
        assert_eq!(sample.points[(0, 1)], -2.0);
        assert_eq!(sample.points[(5, 1)], 0.0);
        assert_eq!(sample.points[(5, 2)], 1.0);
    }

    #[test]
    fn phase_space_sampler_reads_the_axis_component() {
        // a_x = -x - 2 v_x.
        fn damped(x: &Ensemble, v: &Ensemble) -> Ensemble {
            let mut a = DMatrix::zeros(x.nrows(), 3);
            for i in 0..x.nrows() {
                a[(i, 0)] = -x[(i, 0)] - 2.0 * v[(i, 0)];
            }
            a
        }

        let sample =
            sample_phase_space(&damped, Axis::X, [(-1.0, 1.0), (-1.0, 1.0)], 3).unwrap();
        // positions = velocities = [-1, 0, 1];
        // acceleration[(p, q)] = -positions[q] - 2 velocities[p].
        assert!((sample.acceleration[(0, 0)] - (1.0 + 2.0)).abs() < 1e-12);
        assert!((sample.acceleration[(2, 2)] - (-1.0 - 2.0)).abs() < 1e-12);
        assert!((sample.acceleration[(1, 1)]).abs() < 1e-12);
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        let plane = Plane::from_label("xy").unwrap();
        assert!(sample_plane(&zero_field, plane, [(-1.0, 1.0), (-1.0, 1.0)], 1).is_err());
        assert!(sample_plane(&zero_field, plane, [(1.0, -1.0), (-1.0, 1.0)], 4).is_err());
        assert!(sample_plane(&zero_field, plane, [(f64::NAN, 1.0), (-1.0, 1.0)], 4).is_err());
    }
}
