//! Conversion between per-particle ensembles and the flat state vector the
//! ODE solver works on.
//!
//! Layout of the flat vector for N particles: the first 3N entries are all
//! positions (particle-major, component-minor), the last 3N all velocities.
//! `pack` and `unpack` are mutually inverse under this layout.

use crate::traits::Ensemble;
use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector};

/// Flattens position and velocity ensembles of shape (N, 3) into one state
/// vector of length 6N.
pub fn pack(x: &Ensemble, v: &Ensemble) -> Result<DVector<f64>> {
    validate_pair(x, v)?;
    let n = x.nrows();
    let mut y = DVector::zeros(6 * n);
    for i in 0..n {
        for c in 0..3 {
            y[3 * i + c] = x[(i, c)];
            y[3 * n + 3 * i + c] = v[(i, c)];
        }
    }
    Ok(y)
}

/// Reconstructs (N, 3) position and velocity ensembles from a flat state
/// vector of length 6N.
pub fn unpack(y: &[f64], n: usize) -> Result<(Ensemble, Ensemble)> {
    if n == 0 {
        bail!("Particle count must be at least 1.");
    }
    if y.len() != 6 * n {
        bail!(
            "State vector length mismatch: expected {} for {} particles, got {}.",
            6 * n,
            n,
            y.len()
        );
    }
    let mut x = DMatrix::zeros(n, 3);
    let mut v = DMatrix::zeros(n, 3);
    for i in 0..n {
        for c in 0..3 {
            x[(i, c)] = y[3 * i + c];
            v[(i, c)] = y[3 * n + 3 * i + c];
        }
    }
    Ok((x, v))
}

/// Infers the particle count from a flat state vector length.
pub fn particle_count(state_len: usize) -> Result<usize> {
    if state_len == 0 || state_len % 6 != 0 {
        bail!(
            "State vector length {} is not a positive multiple of 6.",
            state_len
        );
    }
    Ok(state_len / 6)
}

/// Batched unpack of a raw solver matrix (6N x T, one column per time
/// sample) into time-major position and velocity series.
pub fn unpack_series(raw: &DMatrix<f64>, n: usize) -> Result<(Vec<Ensemble>, Vec<Ensemble>)> {
    if raw.nrows() != 6 * n {
        bail!(
            "Raw solver matrix has {} rows, expected {} for {} particles.",
            raw.nrows(),
            6 * n,
            n
        );
    }
    let mut positions = Vec::with_capacity(raw.ncols());
    let mut velocities = Vec::with_capacity(raw.ncols());
    let mut column = vec![0.0; raw.nrows()];
    for k in 0..raw.ncols() {
        for r in 0..raw.nrows() {
            column[r] = raw[(r, k)];
        }
        let (x, v) = unpack(&column, n)?;
        positions.push(x);
        velocities.push(v);
    }
    Ok((positions, velocities))
}

/// Result of one integration run: time samples plus the position and
/// velocity history of every particle. Immutable once created; owned by the
/// caller that requested the run.
#[derive(Debug, Clone)]
pub struct Trajectory {
    /// Time samples, strictly increasing, length T.
    pub t: Vec<f64>,
    /// Raw solver state matrix, 6N x T.
    pub raw: DMatrix<f64>,
    /// Position ensembles per time sample, T entries of shape (N, 3).
    pub positions: Vec<Ensemble>,
    /// Velocity ensembles per time sample, T entries of shape (N, 3).
    pub velocities: Vec<Ensemble>,
}

impl Trajectory {
    /// Number of time samples.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Number of particles in the ensemble.
    pub fn particle_count(&self) -> usize {
        self.raw.nrows() / 6
    }
}

fn validate_pair(x: &Ensemble, v: &Ensemble) -> Result<()> {
    if x.ncols() != 3 || v.ncols() != 3 {
        bail!(
            "Ensembles must have 3 columns, got {} and {}.",
            x.ncols(),
            v.ncols()
        );
    }
    if x.nrows() == 0 {
        bail!("Ensembles must contain at least one particle.");
    }
    if x.nrows() != v.nrows() {
        bail!(
            "Position and velocity ensembles have different particle counts: {} vs {}.",
            x.nrows(),
            v.nrows()
        );
    }
    Ok(())
}
