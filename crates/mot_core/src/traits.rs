use nalgebra::DMatrix;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the integrator.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A collection of N particles' position or velocity vectors, shape (N, 3).
/// Row i holds the x, y, z components of particle i.
pub type Ensemble = DMatrix<f64>;

/// Represents a first-order ODE system dy/dt = f(t, y).
pub trait OdeSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// y: current state
    /// out: buffer to write dy/dt
    fn apply(&self, t: T, y: &[T], out: &mut [T]);
}

/// An acceleration field a(X, V) over a particle ensemble.
///
/// Must be pure and stateless: the adaptive solver evaluates it repeatedly,
/// with speculative states and with no temporal ordering guarantee. It must
/// accept any ensemble size N >= 1 and return an (N, 3) matrix of the same
/// shape as its inputs.
pub trait AccelerationField {
    fn eval(&self, x: &Ensemble, v: &Ensemble) -> Ensemble;
}

impl<F> AccelerationField for F
where
    F: Fn(&Ensemble, &Ensemble) -> Ensemble,
{
    fn eval(&self, x: &Ensemble, v: &Ensemble) -> Ensemble {
        self(x, v)
    }
}
