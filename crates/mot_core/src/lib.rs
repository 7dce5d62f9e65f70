pub mod coordinates;
pub mod integrate;
pub mod sampling;
pub mod session;
pub mod solvers;
pub mod state;
/// The `mot_core` crate simulates the motion of neutral atoms in a velocity-
/// and position-dependent trap force field by integrating Newton's equations
/// of motion over a particle ensemble.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `OdeSystem` (flattened
///   first-order systems), `AccelerationField` (the caller-supplied force
///   model).
/// - **Coordinates**: initial-condition generation with spherical rotation.
/// - **State**: packing between (N, 3) ensembles and the flat 6N state
///   vector, and the `Trajectory` result.
/// - **Solvers**: adaptive Tsitouras 5(4) stepper with embedded error
///   control.
/// - **Integrate**: the vectorized Newtonian right-hand side and the
///   trajectory driver.
/// - **Sampling**: acceleration-field grids for heatmap/quiver rendering.
pub mod traits;
