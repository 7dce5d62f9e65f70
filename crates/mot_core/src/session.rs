//! Stateful convenience wrapper around [`crate::integrate::solve`].
//!
//! The integrator itself returns an immutable [`Trajectory`]; the session
//! exists for the run-then-inspect workflow, holding the field, the initial
//! conditions, and the most recent result.

use crate::integrate::{solve_with, SolveSettings};
use crate::state::Trajectory;
use crate::traits::{AccelerationField, Ensemble};
use anyhow::Result;
use nalgebra::{DMatrix, Vector3};

pub struct Session<F: AccelerationField> {
    field: F,
    x0: Ensemble,
    v0: Ensemble,
    settings: SolveSettings,
    last_run: Option<Trajectory>,
}

impl<F: AccelerationField> Session<F> {
    /// Creates a session over an ensemble of initial conditions.
    pub fn new(field: F, x0: Ensemble, v0: Ensemble) -> Self {
        Self {
            field,
            x0,
            v0,
            settings: SolveSettings::default(),
            last_run: None,
        }
    }

    /// Creates a single-particle session from flat 3-vectors, lifting them
    /// to 1 x 3 ensembles.
    pub fn single(field: F, x0: Vector3<f64>, v0: Vector3<f64>) -> Self {
        let x = DMatrix::from_row_slice(1, 3, x0.as_slice());
        let v = DMatrix::from_row_slice(1, 3, v0.as_slice());
        Self::new(field, x, v)
    }

    pub fn with_settings(mut self, settings: SolveSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn acceleration(&self) -> &F {
        &self.field
    }

    /// Integrates the equations of motion and stores the result on the
    /// session, fully replacing any previous run.
    pub fn run(&mut self, duration: f64, dt: Option<f64>) -> Result<&Trajectory> {
        let trajectory = solve_with(&self.field, &self.x0, &self.v0, duration, dt, self.settings)?;
        Ok(self.last_run.insert(trajectory))
    }

    /// The most recent run, if any.
    pub fn last_run(&self) -> Option<&Trajectory> {
        self.last_run.as_ref()
    }

    /// Takes ownership of the most recent run, leaving the session empty.
    pub fn take_run(&mut self) -> Option<Trajectory> {
        self.last_run.take()
    }
}
