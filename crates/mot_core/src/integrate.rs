//! Trajectory integration.
//!
//! Converts an acceleration field a(X, V) into the first-order system
//! dX/dt = V, dV/dt = a(X, V) over the flattened 6N state vector, drives the
//! adaptive Tsit5 stepper across it, and reshapes the accepted samples into
//! per-particle position and velocity time series.

use crate::solvers::{StepController, Tsit5};
use crate::state::{pack, unpack_series, Trajectory};
use crate::traits::{AccelerationField, Ensemble, OdeSystem};
use anyhow::{bail, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes of one integration run. All are fatal: no partial
/// trajectory is reconstructed.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("step size {h} underflowed at t = {t}; the system may be too stiff for the requested tolerance")]
    StepSizeTooSmall { t: f64, h: f64 },
    #[error("integration exceeded the budget of {max_steps} step attempts")]
    MaxStepsExceeded { max_steps: usize },
    #[error("non-finite state encountered at t = {t}")]
    NonFiniteState { t: f64 },
}

/// Tolerances and step limits for the adaptive integration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolveSettings {
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
    pub min_step: f64,
    /// Initial step size; when absent, duration / 1000 is used.
    pub initial_step: Option<f64>,
}

impl Default for SolveSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            max_steps: 1_000_000,
            min_step: 1e-14,
            initial_step: None,
        }
    }
}

/// The first-order reduction of Newton's second law over a particle
/// ensemble: the derivative of position is velocity, the derivative of
/// velocity is the supplied acceleration.
///
/// The right-hand side is vectorized: [`NewtonianSystem::apply_batch`]
/// evaluates K probe states with a single call to the acceleration field by
/// stacking them into one (N * K, 3) ensemble pair. The single-state
/// [`OdeSystem::apply`] is a batch of width one.
pub struct NewtonianSystem<'a, F: AccelerationField + ?Sized> {
    field: &'a F,
    particles: usize,
}

impl<'a, F: AccelerationField + ?Sized> NewtonianSystem<'a, F> {
    pub fn new(field: &'a F, particles: usize) -> Self {
        Self { field, particles }
    }

    /// Evaluates dy/dt for a batch of state vectors. `states` and `out` are
    /// 6N x K matrices, one probe state per column.
    pub fn apply_batch(&self, states: &DMatrix<f64>, out: &mut DMatrix<f64>) {
        let n = self.particles;
        let cols = states.ncols();
        debug_assert_eq!(states.nrows(), 6 * n);
        debug_assert_eq!(out.nrows(), 6 * n);
        debug_assert_eq!(out.ncols(), cols);

        // Stack every column's particles into one tall ensemble so the
        // field sees a single (N * K, 3) call.
        let mut x: Ensemble = DMatrix::zeros(n * cols, 3);
        let mut v: Ensemble = DMatrix::zeros(n * cols, 3);
        for k in 0..cols {
            for i in 0..n {
                for c in 0..3 {
                    x[(k * n + i, c)] = states[(3 * i + c, k)];
                    v[(k * n + i, c)] = states[(3 * n + 3 * i + c, k)];
                }
            }
        }

        let a = self.field.eval(&x, &v);

        for k in 0..cols {
            for i in 0..n {
                for c in 0..3 {
                    out[(3 * i + c, k)] = v[(k * n + i, c)];
                    out[(3 * n + 3 * i + c, k)] = a[(k * n + i, c)];
                }
            }
        }
    }
}

impl<F: AccelerationField + ?Sized> OdeSystem<f64> for NewtonianSystem<'_, F> {
    fn dimension(&self) -> usize {
        6 * self.particles
    }

    fn apply(&self, _t: f64, y: &[f64], out: &mut [f64]) {
        let states = DMatrix::from_column_slice(y.len(), 1, y);
        let mut derivative = DMatrix::zeros(y.len(), 1);
        self.apply_batch(&states, &mut derivative);
        out.copy_from_slice(derivative.as_slice());
    }
}

/// Integrates the equations of motion given by the acceleration field,
/// starting from the given initial conditions, with default settings.
///
/// Integration runs from t = 0 to t = `duration`. When `dt` is given, the
/// returned samples lie on the uniform grid 0, dt, 2 dt, ... strictly below
/// `duration` (the endpoint itself is never a sample). When `dt` is absent,
/// every accepted solver step is a sample and the series ends exactly at
/// `duration`.
pub fn solve<F: AccelerationField + ?Sized>(
    field: &F,
    x0: &Ensemble,
    v0: &Ensemble,
    duration: f64,
    dt: Option<f64>,
) -> Result<Trajectory> {
    solve_with(field, x0, v0, duration, dt, SolveSettings::default())
}

/// [`solve`] with explicit tolerances and step limits.
pub fn solve_with<F: AccelerationField + ?Sized>(
    field: &F,
    x0: &Ensemble,
    v0: &Ensemble,
    duration: f64,
    dt: Option<f64>,
    settings: SolveSettings,
) -> Result<Trajectory> {
    if !duration.is_finite() || duration <= 0.0 {
        bail!("Integration duration must be positive and finite, got {duration}.");
    }
    if let Some(d) = dt {
        if !d.is_finite() || d <= 0.0 {
            bail!("Sample spacing dt must be positive and finite, got {d}.");
        }
    }
    let y0 = pack(x0, v0)?;
    if y0.iter().any(|v| !v.is_finite()) {
        bail!("Initial conditions contain non-finite values.");
    }
    let n = x0.nrows();

    let system = NewtonianSystem::new(field, n);
    let mut driver = Driver::new(&system, duration, settings);
    let mut t = 0.0;
    let mut y = y0.as_slice().to_vec();

    let mut times = vec![0.0];
    let mut states = vec![y.clone()];

    match dt {
        Some(spacing) => {
            // Sample grid 0, dt, 2dt, ... strictly below duration; step
            // endpoints are clamped so each grid point is hit exactly.
            let mut k = 1usize;
            loop {
                let target = spacing * k as f64;
                if target >= duration {
                    break;
                }
                driver.advance_to(&system, &mut t, &mut y, target)?;
                times.push(t);
                states.push(y.clone());
                k += 1;
            }
        }
        None => {
            while t < duration {
                driver.advance_one(&system, &mut t, &mut y, duration)?;
                times.push(t);
                states.push(y.clone());
            }
        }
    }

    let mut raw = DMatrix::zeros(6 * n, times.len());
    for (k, state) in states.iter().enumerate() {
        for (r, &value) in state.iter().enumerate() {
            raw[(r, k)] = value;
        }
    }
    let (positions, velocities) = unpack_series(&raw, n)?;

    Ok(Trajectory {
        t: times,
        raw,
        positions,
        velocities,
    })
}

/// Adaptive stepping loop shared by both sampling modes.
struct Driver {
    stepper: Tsit5<f64>,
    controller: StepController,
    settings: SolveSettings,
    y_next: Vec<f64>,
    h: f64,
    attempts: usize,
}

impl Driver {
    fn new<F: AccelerationField + ?Sized>(
        system: &NewtonianSystem<'_, F>,
        duration: f64,
        settings: SolveSettings,
    ) -> Self {
        let dim = system.dimension();
        let h = settings
            .initial_step
            .unwrap_or(duration * 1e-3)
            .min(duration)
            .max(settings.min_step);
        Self {
            stepper: Tsit5::new(dim),
            controller: StepController::default(),
            settings,
            y_next: vec![0.0; dim],
            h,
            attempts: 0,
        }
    }

    /// Advances exactly to `target`, taking as many adaptive steps as the
    /// error control demands.
    fn advance_to<F: AccelerationField + ?Sized>(
        &mut self,
        system: &NewtonianSystem<'_, F>,
        t: &mut f64,
        y: &mut [f64],
        target: f64,
    ) -> Result<(), SolveError> {
        while *t < target {
            self.advance_one(system, t, y, target)?;
        }
        Ok(())
    }

    /// Takes one accepted step, clamped so it cannot overshoot `limit`.
    /// Rejected attempts shrink the step and retry internally.
    fn advance_one<F: AccelerationField + ?Sized>(
        &mut self,
        system: &NewtonianSystem<'_, F>,
        t: &mut f64,
        y: &mut [f64],
        limit: f64,
    ) -> Result<(), SolveError> {
        loop {
            let remaining = limit - *t;
            let clamped = self.h >= remaining;
            let h_attempt = if clamped { remaining } else { self.h };

            let err = self.stepper.step(
                system,
                *t,
                y,
                h_attempt,
                &mut self.y_next,
                self.settings.atol,
                self.settings.rtol,
            );
            let accepted = err.is_finite() && err <= 1.0;

            self.attempts += 1;
            if self.attempts > self.settings.max_steps {
                return Err(SolveError::MaxStepsExceeded {
                    max_steps: self.settings.max_steps,
                });
            }

            if accepted {
                *t = if clamped { limit } else { *t + h_attempt };
                y.copy_from_slice(&self.y_next);
                if y.iter().any(|v| !v.is_finite()) {
                    return Err(SolveError::NonFiniteState { t: *t });
                }
                // A step shortened only to land on a sample point says
                // nothing about the error; keep the controller's h.
                if !clamped {
                    self.h = (h_attempt * self.controller.factor(err)).max(self.settings.min_step);
                }
                return Ok(());
            }

            let factor = if err.is_finite() {
                self.controller.factor(err)
            } else {
                self.controller.min_factor
            };
            self.h = (h_attempt * factor).max(self.settings.min_step);
            if self.h <= self.settings.min_step {
                return Err(SolveError::StepSizeTooSmall { t: *t, h: self.h });
            }
        }
    }
}
