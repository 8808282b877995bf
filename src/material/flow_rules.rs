use crate::base::{ParamDamage, ParamViscoplastic, ParamViscous, BOLTZMANN};
use serde::{Deserialize, Serialize};

/// Tags the state of the viscous (network B) flow at the current local iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViscousActivity {
    /// The backward-Euler residual has a root with positive driving stress
    Flowing,

    /// The increment is large enough to relax the network B completely (τv = 0)
    Relaxed,
}

/// Tags the state of the viscoplastic flow at the current local iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlasticActivity {
    /// The driving stress is below the threshold; no viscoplastic flow
    Elastic,

    /// The driving stress exceeds the threshold
    ///
    /// `capped` indicates that the flow was limited to bring the driving stress back to σ₀.
    Plastic { capped: bool },
}

/// Implements the thermally activated viscous flow rule
///
/// ```text
/// γ̇v = γ̇₀ · exp[(ΔG/kT) · ((τ/τ̂)ᵐ − 1)]
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ViscousFlow {
    gamma_dot_0: f64,
    q: f64, // ΔG/kT
    tau_hat: f64,
    m: f64,
}

/// Implements the strain-driven viscoplastic flow rule
///
/// ```text
/// Δγp = a · |ε − ε₀|ᵇ · |Δε|
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ViscoplasticFlow {
    pub sigma0: f64,
    pub hh: f64,
    a: f64,
    b: f64,
    eps0: f64,
}

/// Implements the saturating damage law
///
/// ```text
/// d = max(d_old, d_max · (1 − exp(−εp / εd)))
/// ```
#[derive(Clone, Copy, Debug)]
pub struct DamageLaw {
    d_max: f64,
    eps_d: f64,
}

impl ViscousFlow {
    /// Allocates a new instance
    pub fn new(param: &ParamViscous, temperature: f64) -> Self {
        ViscousFlow {
            gamma_dot_0: param.gamma_dot_0,
            q: param.delta_g / (BOLTZMANN * temperature),
            tau_hat: param.tau_hat,
            m: param.m,
        }
    }

    /// Returns the activation coefficient ΔG/kT
    pub fn activation(&self) -> f64 {
        self.q
    }

    /// Calculates the shear rate and its derivative with respect to τ
    ///
    /// Negative stresses are clipped to zero.
    pub fn rate(&self, tau: f64) -> (f64, f64) {
        let tau = f64::max(tau, 0.0);
        let ratio = tau / self.tau_hat;
        let rate = self.gamma_dot_0 * f64::exp(self.q * (f64::powf(ratio, self.m) - 1.0));
        let deriv = if tau > 0.0 {
            rate * self.q * self.m * f64::powf(ratio, self.m - 1.0) / self.tau_hat
        } else {
            0.0
        };
        (rate, deriv)
    }
}

impl ViscoplasticFlow {
    /// Allocates a new instance
    pub fn new(param: &ParamViscoplastic) -> Self {
        ViscoplasticFlow {
            sigma0: param.sigma0,
            hh: param.hh,
            a: param.a,
            b: param.b,
            eps0: param.eps0,
        }
    }

    /// Calculates the flow increment and its derivative with respect to the current equivalent strain
    ///
    /// # Input
    ///
    /// * `eps` -- equivalent strain at the end of the increment
    /// * `eps_old` -- equivalent strain at the beginning of the increment
    pub fn increment(&self, eps: f64, eps_old: f64) -> (f64, f64) {
        let x = eps - self.eps0;
        let delta = eps - eps_old;
        let ax = f64::abs(x);
        let power = f64::powf(ax, self.b);
        let value = self.a * power * f64::abs(delta);
        let d_power = if ax > 0.0 && self.b > 0.0 {
            self.b * f64::powf(ax, self.b - 1.0) * f64::signum(x)
        } else {
            0.0
        };
        let d_delta = if delta != 0.0 { f64::signum(delta) } else { 0.0 };
        let deriv = self.a * (d_power * f64::abs(delta) + power * d_delta);
        (value, deriv)
    }
}

impl DamageLaw {
    /// Allocates a new instance
    pub fn new(param: &ParamDamage) -> Self {
        DamageLaw {
            d_max: param.d_max,
            eps_d: param.eps_d,
        }
    }

    /// Calculates the damage and its derivative with respect to the accumulated viscoplastic strain
    ///
    /// The derivative is zero when the previous damage governs.
    pub fn damage(&self, d_old: f64, eps_p: f64) -> (f64, f64) {
        let e = f64::exp(-eps_p / self.eps_d);
        let d = self.d_max * (1.0 - e);
        if d > d_old {
            (d, self.d_max * e / self.eps_d)
        } else {
            (d_old, 0.0)
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
