use crate::StrError;
use serde::{Deserialize, Serialize};

/// Holds parameters of the viscous (network B) flow rule
///
/// ```text
/// γ̇v = γ̇₀ · exp[(ΔG/kT) · ((τ/τ̂)ᵐ − 1)]
/// ```
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamViscous {
    /// Reference shear rate γ̇₀ (1/s)
    pub gamma_dot_0: f64,

    /// Activation energy ΔG (J)
    pub delta_g: f64,

    /// Reference shear stress τ̂
    pub tau_hat: f64,

    /// Stress exponent m
    pub m: f64,
}

/// Holds parameters of the viscoplastic flow rule and kinematic hardening
///
/// ```text
/// γ̇p = a · |ε − ε₀|ᵇ · ε̇   if τp > σ₀
/// γ̇p = 0                   otherwise
/// ```
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamViscoplastic {
    /// Threshold (yield) shear stress σ₀
    pub sigma0: f64,

    /// Coefficient a
    pub a: f64,

    /// Exponent b
    pub b: f64,

    /// Reference equivalent strain ε₀
    pub eps0: f64,

    /// Kinematic hardening modulus H (backstress)
    pub hh: f64,
}

/// Holds parameters of the damage evolution law
///
/// ```text
/// d = d_max · (1 − exp(−εp / εd))
/// ```
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamDamage {
    /// Saturation value of the damage (must be < 1)
    pub d_max: f64,

    /// Characteristic accumulated viscoplastic strain εd
    pub eps_d: f64,
}

/// Holds environmental and filler parameters
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamEnvironment {
    /// Nanoparticle volume fraction φ (wnp)
    pub wnp: f64,

    /// Moisture content ζ (zita)
    pub zita: f64,

    /// Absolute temperature T (K)
    pub temperature: f64,

    /// Reference absolute temperature (K) at which α_T = 1
    pub temperature_ref: f64,

    /// Moisture softening coefficient c_Z in α_Z = exp(−c_Z ζ)
    pub c_zita: f64,

    /// Thermal softening coefficient c_T in α_T = exp(−c_T (T − T_ref))
    pub c_temperature: f64,
}

/// Holds data to control the local (inner) Newton iterations
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamLocalSolver {
    /// Maximum number of inner iterations
    pub n_max_iterations: usize,

    /// Absolute tolerance on the max-norm of the flow-rule residuals
    pub tolerance: f64,
}

/// Holds all material parameters
///
/// The parameters are read-only during the simulation and shared by all material points.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamMaterial {
    /// Shear modulus of the equilibrium network A (mu1)
    pub mu1: f64,

    /// Shear modulus of the viscous network B (mu2)
    pub mu2: f64,

    /// Poisson's coefficient of the equilibrium network A (nu1)
    pub nu1: f64,

    /// Viscous flow
    pub viscous: ParamViscous,

    /// Viscoplastic flow
    pub viscoplastic: ParamViscoplastic,

    /// Damage
    pub damage: ParamDamage,

    /// Environment
    pub environment: ParamEnvironment,

    /// Options for the local solver (defaults are used if None)
    pub local_solver: Option<ParamLocalSolver>,
}

/// Specifies how the recurrent memory is initialized when switching from physics to ML
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandOff {
    /// Zero hidden and cell states
    Reset,

    /// Replays the recorded strain history of the point starting from zero memory
    WarmStart,
}

/// Holds parameters of the recurrent surrogate evaluation
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ParamSurrogate {
    /// Length of the strain window fed to the network at each evaluation (≥ 1)
    pub window: usize,

    /// Finite-difference step for the numerical tangent (Mandel strain components)
    pub fd_step: f64,

    /// Rule to initialize the memory at the physics→ML transition
    pub hand_off: HandOff,
}

impl ParamLocalSolver {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        ParamLocalSolver {
            n_max_iterations: 50,
            tolerance: 1e-12,
        }
    }
}

impl ParamSurrogate {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        ParamSurrogate {
            window: 1,
            fd_step: 1e-6,
            hand_off: HandOff::Reset,
        }
    }
}

impl ParamMaterial {
    /// Returns sample parameters for an epoxy matrix at the reference environment
    ///
    /// Units: MPa, s, J, K.
    pub fn sample_epoxy() -> Self {
        ParamMaterial {
            mu1: 760.0,
            mu2: 790.0,
            nu1: 0.23,
            viscous: ParamViscous {
                gamma_dot_0: 1.0e6,
                delta_g: 1.0e-19,
                tau_hat: 20.0,
                m: 1.0,
            },
            viscoplastic: ParamViscoplastic {
                sigma0: 5.5,
                a: 1.0,
                b: 0.5,
                eps0: 0.0,
                hh: 0.0,
            },
            damage: ParamDamage {
                d_max: 0.6,
                eps_d: 0.05,
            },
            environment: ParamEnvironment {
                wnp: 0.0,
                zita: 0.0,
                temperature: 296.0,
                temperature_ref: 296.0,
                c_zita: 10.0,
                c_temperature: 0.01,
            },
            local_solver: None,
        }
    }

    /// Returns sample parameters for a nanocomposite with the given nanoparticle fraction
    pub fn sample_nanocomposite(wnp: f64) -> Self {
        let mut param = ParamMaterial::sample_epoxy();
        param.environment.wnp = wnp;
        param
    }

    /// Returns the local solver options or their defaults
    pub fn local_solver(&self) -> ParamLocalSolver {
        match self.local_solver {
            Some(p) => p,
            None => ParamLocalSolver::new(),
        }
    }

    /// Validates all data
    pub fn validate(&self) -> Result<(), StrError> {
        if self.mu1 <= 0.0 {
            return Err("mu1 must be > 0.0");
        }
        if self.mu2 < 0.0 {
            return Err("mu2 must be ≥ 0.0");
        }
        if self.nu1 <= -1.0 || self.nu1 >= 0.5 {
            return Err("nu1 must satisfy -1.0 < ν < 0.5");
        }
        let v = &self.viscous;
        if v.gamma_dot_0 < 0.0 {
            return Err("gamma_dot_0 must be ≥ 0.0");
        }
        if v.delta_g < 0.0 {
            return Err("delta_g must be ≥ 0.0");
        }
        if v.tau_hat <= 0.0 {
            return Err("tau_hat must be > 0.0");
        }
        if v.m < 1.0 {
            return Err("m must be ≥ 1.0");
        }
        let vp = &self.viscoplastic;
        if vp.sigma0 < 0.0 {
            return Err("sigma0 must be ≥ 0.0");
        }
        if vp.a < 0.0 {
            return Err("a must be ≥ 0.0");
        }
        if vp.b < 0.0 {
            return Err("b must be ≥ 0.0");
        }
        if vp.hh < 0.0 {
            return Err("hh must be ≥ 0.0");
        }
        if self.damage.d_max < 0.0 || self.damage.d_max >= 1.0 {
            return Err("d_max must satisfy 0.0 ≤ d_max < 1.0");
        }
        if self.damage.eps_d <= 0.0 {
            return Err("eps_d must be > 0.0");
        }
        let env = &self.environment;
        if env.wnp < 0.0 || env.wnp >= 1.0 {
            return Err("wnp must satisfy 0.0 ≤ wnp < 1.0");
        }
        if env.zita < 0.0 {
            return Err("zita must be ≥ 0.0");
        }
        if env.temperature <= 0.0 || env.temperature_ref <= 0.0 {
            return Err("temperatures must be > 0.0");
        }
        let local = self.local_solver();
        if local.n_max_iterations < 1 {
            return Err("the local solver requires n_max_iterations ≥ 1");
        }
        if local.tolerance <= 0.0 {
            return Err("the local solver requires tolerance > 0.0");
        }
        Ok(())
    }
}

impl ParamSurrogate {
    /// Validates all data
    pub fn validate(&self) -> Result<(), StrError> {
        if self.window < 1 {
            return Err("the surrogate window must be ≥ 1");
        }
        if self.fd_step <= 0.0 {
            return Err("the finite-difference step must be > 0.0");
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
