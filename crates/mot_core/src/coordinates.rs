//! Initial-condition generation.
//!
//! Positions and velocities are laid out along the z axis, then rotated to
//! the spherical direction (theta, phi): first by theta about the x axis,
//! then by phi about the z axis, both applied as right-multiplications of
//! the (N, 3) ensemble matrix. The rotation order is significant and is part
//! of the contract.

use crate::traits::Ensemble;
use anyhow::{bail, Result};
use nalgebra::DMatrix;

/// A scalar-or-vector initial value for one coordinate axis.
///
/// A scalar broadcasts across the whole ensemble; a vector fixes the
/// ensemble size.
#[derive(Debug, Clone)]
pub enum AxisValues {
    Scalar(f64),
    Values(Vec<f64>),
}

impl AxisValues {
    fn len(&self) -> usize {
        match self {
            AxisValues::Scalar(_) => 0,
            AxisValues::Values(v) => v.len(),
        }
    }

    fn fill_column(&self, out: &mut Ensemble, col: usize) {
        match self {
            AxisValues::Scalar(s) => {
                for i in 0..out.nrows() {
                    out[(i, col)] = *s;
                }
            }
            AxisValues::Values(v) => {
                for (i, value) in v.iter().enumerate() {
                    out[(i, col)] = *value;
                }
            }
        }
    }
}

impl From<f64> for AxisValues {
    fn from(value: f64) -> Self {
        AxisValues::Scalar(value)
    }
}

impl From<Vec<f64>> for AxisValues {
    fn from(values: Vec<f64>) -> Self {
        AxisValues::Values(values)
    }
}

impl From<&[f64]> for AxisValues {
    fn from(values: &[f64]) -> Self {
        AxisValues::Values(values.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for AxisValues {
    fn from(values: [f64; N]) -> Self {
        AxisValues::Values(values.to_vec())
    }
}

/// Generates atomic positions and velocities along the z axis, then rotates
/// them to the spherical coordinates theta and phi (both in degrees).
///
/// The ensemble size is the larger of the two input lengths, with scalars
/// broadcast; two scalars produce a single particle. Two vectors of
/// differing lengths are rejected.
pub fn generate_initial_conditions(
    x0: impl Into<AxisValues>,
    v0: impl Into<AxisValues>,
    theta_deg: f64,
    phi_deg: f64,
) -> Result<(Ensemble, Ensemble)> {
    let x0 = x0.into();
    let v0 = v0.into();

    if matches!(x0, AxisValues::Values(ref v) if v.is_empty()) {
        bail!("Initial position vector must not be empty.");
    }
    if matches!(v0, AxisValues::Values(ref v) if v.is_empty()) {
        bail!("Initial velocity vector must not be empty.");
    }

    let lenx = x0.len();
    let lenv = v0.len();
    if lenx > 0 && lenv > 0 && lenx != lenv {
        bail!(
            "Initial position and velocity lengths differ: {} vs {}.",
            lenx,
            lenv
        );
    }
    // A pair of scalars still describes one particle, not an empty ensemble.
    let n = lenx.max(lenv).max(1);

    let mut x = DMatrix::zeros(n, 3);
    x0.fill_column(&mut x, 2);

    let mut v = DMatrix::zeros(n, 3);
    v0.fill_column(&mut v, 2);

    let theta = theta_deg.to_radians();
    let phi = phi_deg.to_radians();
    let rx = rotation_x(theta);
    let rz = rotation_z(phi);

    // Row vectors, so the rotations post-multiply: X . Rx . Rz.
    let x = (&x * &rx) * &rz;
    let v = (&v * &rx) * &rz;
    Ok((x, v))
}

fn rotation_x(theta: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(
        3,
        3,
        &[
            1.0,
            0.0,
            0.0,
            0.0,
            theta.cos(),
            -theta.sin(),
            0.0,
            theta.sin(),
            theta.cos(),
        ],
    )
}

fn rotation_z(phi: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(
        3,
        3,
        &[
            phi.cos(),
            -phi.sin(),
            0.0,
            phi.sin(),
            phi.cos(),
            0.0,
            0.0,
            0.0,
            1.0,
        ],
    )
}
