use crate::traits::{OdeSystem, Scalar};
use serde::{Deserialize, Serialize};

/// Tsitouras 5(4) embedded Runge-Kutta stepper.
///
/// Produces the 5th-order solution and a scaled estimate of the local error
/// from the embedded 4th-order solution; the caller accepts the step when the
/// returned error norm is <= 1 and resizes dt through a [`StepController`].
pub struct Tsit5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::from_f64(0.0).unwrap();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
        }
    }

    /// Attempts one step of size dt from (t0, y), writing the 5th-order
    /// solution into y_next. Returns the infinity norm of the local error
    /// scaled by `atol + rtol * max(|y_i|, |y_next_i|)`; a value <= 1 means
    /// the step meets the requested tolerance.
    pub fn step(
        &mut self,
        system: &impl OdeSystem<T>,
        t0: T,
        y: &[T],
        dt: T,
        y_next: &mut [T],
        atol: T,
        rtol: T,
    ) -> T {
        // Tsit5 Coefficients
        let c2 = T::from_f64(0.161).unwrap();
        let c3 = T::from_f64(0.327).unwrap();
        let c4 = T::from_f64(0.9).unwrap();
        let c5 = T::from_f64(0.9800255409045097).unwrap();
        let c6 = T::from_f64(1.0).unwrap();

        let a21 = T::from_f64(0.161).unwrap();

        let a31 = T::from_f64(-0.008480655492356989).unwrap();
        let a32 = T::from_f64(0.335480655492357).unwrap();

        let a41 = T::from_f64(2.898).unwrap();
        let a42 = T::from_f64(-6.359447987781783).unwrap();
        let a43 = T::from_f64(4.361447987781783).unwrap();

        let a51 = T::from_f64(5.325864858437957).unwrap();
        let a52 = T::from_f64(-11.748883564062828).unwrap();
        let a53 = T::from_f64(7.495539342889693).unwrap();
        let a54 = T::from_f64(-0.09249506636030195).unwrap();

        let a61 = T::from_f64(5.86145544294642).unwrap();
        let a62 = T::from_f64(-12.92096931784711).unwrap();
        let a63 = T::from_f64(8.159367898576159).unwrap();
        let a64 = T::from_f64(-0.071584973281401).unwrap();
        let a65 = T::from_f64(-0.02826857949054663).unwrap();

        // b coefficients (5th order); identical to the seventh stage row.
        let b1 = T::from_f64(0.09646076681806523).unwrap();
        let b2 = T::from_f64(0.01).unwrap();
        let b3 = T::from_f64(0.4798896504144996).unwrap();
        let b4 = T::from_f64(1.379008574103742).unwrap();
        let b5 = T::from_f64(-3.290069515436099).unwrap();
        let b6 = T::from_f64(2.324710524099774).unwrap();

        // b - bhat: weights of the embedded 4th-order error estimate.
        let e1 = T::from_f64(-0.001780011052226).unwrap();
        let e2 = T::from_f64(-0.000816434459657).unwrap();
        let e3 = T::from_f64(0.007880878010262).unwrap();
        let e4 = T::from_f64(-0.144711007173263).unwrap();
        let e5 = T::from_f64(0.582357165452555).unwrap();
        let e6 = T::from_f64(-0.458082105929187).unwrap();
        let e7 = T::from_f64(0.015151515151515152).unwrap();

        // k1
        system.apply(t0, y, &mut self.k1);

        // k2
        for i in 0..y.len() {
            self.tmp[i] = y[i] + dt * (a21 * self.k1[i]);
        }
        system.apply(t0 + c2 * dt, &self.tmp, &mut self.k2);

        // k3
        for i in 0..y.len() {
            self.tmp[i] = y[i] + dt * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t0 + c3 * dt, &self.tmp, &mut self.k3);

        // k4
        for i in 0..y.len() {
            self.tmp[i] = y[i] + dt * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t0 + c4 * dt, &self.tmp, &mut self.k4);

        // k5
        for i in 0..y.len() {
            self.tmp[i] = y[i]
                + dt * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t0 + c5 * dt, &self.tmp, &mut self.k5);

        // k6
        for i in 0..y.len() {
            self.tmp[i] = y[i]
                + dt * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t0 + c6 * dt, &self.tmp, &mut self.k6);

        // 5th-order solution
        for i in 0..y.len() {
            y_next[i] = y[i]
                + dt * (b1 * self.k1[i]
                    + b2 * self.k2[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }

        // k7 = f(t + dt, y_next); only enters the error estimate.
        system.apply(t0 + dt, y_next, &mut self.k7);

        let mut err_norm = T::from_f64(0.0).unwrap();
        for i in 0..y.len() {
            let err = dt
                * (e1 * self.k1[i]
                    + e2 * self.k2[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
            let scale = atol + rtol * y[i].abs().max(y_next[i].abs());
            err_norm = err_norm.max(err.abs() / scale);
        }
        err_norm
    }
}

/// I-controller for the adaptive step size:
/// factor = safety * error^(-1/5), clamped to [min_factor, max_factor].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepController {
    pub safety: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 5.0,
        }
    }
}

impl StepController {
    pub fn factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        let factor = self.safety * error.powf(-0.2);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::{StepController, Tsit5};
    use crate::traits::OdeSystem;

    /// dy/dt = -y, exact solution e^{-t}.
    struct ExpDecay;

    impl OdeSystem<f64> for ExpDecay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, y: &[f64], out: &mut [f64]) {
            out[0] = -y[0];
        }
    }

    #[test]
    fn tsit5_single_step_accuracy() {
        let mut stepper = Tsit5::new(1);
        let y = [1.0];
        let mut y_next = [0.0];
        let dt = 0.1;
        let err = stepper.step(&ExpDecay, 0.0, &y, dt, &mut y_next, 1e-12, 1e-12);
        let exact = (-dt).exp();
        assert!(
            (y_next[0] - exact).abs() < 1e-8,
            "y(0.1) = {}, exact = {}",
            y_next[0],
            exact
        );
        assert!(err.is_finite());
    }

    #[test]
    fn tsit5_error_estimate_shrinks_with_dt() {
        let mut stepper = Tsit5::new(1);
        let y = [1.0];
        let mut y_next = [0.0];
        let err_large = stepper.step(&ExpDecay, 0.0, &y, 0.4, &mut y_next, 1e-9, 1e-9);
        let err_small = stepper.step(&ExpDecay, 0.0, &y, 0.05, &mut y_next, 1e-9, 1e-9);
        assert!(
            err_small < err_large,
            "error should shrink with dt: {} vs {}",
            err_small,
            err_large
        );
    }

    #[test]
    fn controller_clamps_growth_and_shrink() {
        let controller = StepController::default();
        assert_eq!(controller.factor(0.0), controller.max_factor);
        // Tiny error: growth capped at max_factor.
        assert_eq!(controller.factor(1e-12), controller.max_factor);
        // Huge error: reduction capped at min_factor.
        assert_eq!(controller.factor(1e12), controller.min_factor);
        // Error at tolerance: factor just below safety.
        let f = controller.factor(1.0);
        assert!((f - 0.9).abs() < 1e-12);
    }
}
