use super::{Component, HandOff, Loading, LoadingType, ParamSurrogate, CONFIG_MIN_DT_MIN, CONFIG_MIN_TOL};
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Specifies how the strain components not driven by the loading path are determined
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    /// All other strain components are zero (no global unknowns)
    StrainDriven,

    /// All other stress components are zero (solved by Newton-Raphson)
    UniaxialStress,
}

/// Holds configuration data for the time loop, the global iterations, and the ML switch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Number of material (quadrature) points
    pub n_points: usize,

    /// Loading path
    pub loading: Loading,

    /// Control type of the remaining components
    pub control: Control,

    /// Initial time increment Δt
    pub dt: f64,

    /// Minimum allowed Δt
    pub dt_min: f64,

    /// Maximum allowed Δt
    pub dt_max: f64,

    /// Factor applied to Δt after a failed step (0 < shrink < 1)
    pub dt_shrink: f64,

    /// Factor applied to Δt after a successful step (≥ 1)
    pub dt_grow: f64,

    /// Maximum number of time steps (attempts included)
    pub n_max_time_steps: usize,

    /// Maximum number of global iterations
    pub n_max_iterations: usize,

    /// Absolute tolerance for the global residual
    pub tol_rr_abs: f64,

    /// Relative tolerance for the iterative increment (mdu = -δu)
    pub tol_mdu_rel: f64,

    /// Enables the ML surrogate branch
    pub ml_enabled: bool,

    /// Timestep index at which the surrogate replaces the physics branch
    pub ml_switch_timestep: usize,

    /// Path to the surrogate weights file (JSON)
    pub surrogate_weights: Option<String>,

    /// Surrogate evaluation options
    pub surrogate: ParamSurrogate,

    /// Number of recorded strains per point (used by the warm-start hand-off)
    pub strain_history_length: usize,

    /// Evaluates the material points in parallel
    pub parallel: bool,

    /// Verbose mode during timesteps
    pub verbose_timesteps: bool,

    /// Verbose mode during iterations
    pub verbose_iterations: bool,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        Config {
            n_points: 1,
            loading: Loading {
                kind: LoadingType::Monotonic,
                amplitudes: vec![0.01],
                rate: 1e-3,
                component: Component::Xx,
            },
            control: Control::UniaxialStress,
            dt: 0.1,
            dt_min: 1e-8,
            dt_max: 1.0,
            dt_shrink: 0.5,
            dt_grow: 1.0,
            n_max_time_steps: 10_000,
            n_max_iterations: 20,
            tol_rr_abs: 1e-8,
            tol_mdu_rel: 1e-10,
            ml_enabled: false,
            ml_switch_timestep: 0,
            surrogate_weights: None,
            surrogate: ParamSurrogate::new(),
            strain_history_length: 16,
            parallel: true,
            verbose_timesteps: false,
            verbose_iterations: false,
        }
    }

    /// Sets the number of material points
    pub fn set_n_points(&mut self, value: usize) -> Result<&mut Self, StrError> {
        if value < 1 {
            return Err("the number of material points must be ≥ 1");
        }
        self.n_points = value;
        Ok(self)
    }

    /// Sets the loading path
    pub fn set_loading(&mut self, loading: Loading) -> Result<&mut Self, StrError> {
        loading.validate()?;
        self.loading = loading;
        Ok(self)
    }

    /// Sets the control type
    pub fn set_control(&mut self, control: Control) -> &mut Self {
        self.control = control;
        self
    }

    /// Sets the initial time increment and its bounds
    pub fn set_dt(&mut self, dt: f64, dt_min: f64, dt_max: f64) -> &mut Self {
        self.dt = dt;
        self.dt_min = dt_min;
        self.dt_max = dt_max;
        self
    }

    /// Sets the shrink (on failure) and grow (on success) factors of Δt
    pub fn set_dt_factors(&mut self, shrink: f64, grow: f64) -> &mut Self {
        self.dt_shrink = shrink;
        self.dt_grow = grow;
        self
    }

    /// Sets the maximum number of global iterations
    pub fn set_n_max_iterations(&mut self, value: usize) -> &mut Self {
        self.n_max_iterations = value;
        self
    }

    /// Sets the absolute tolerance for the global residual
    pub fn set_tol_rr_abs(&mut self, value: f64) -> &mut Self {
        self.tol_rr_abs = value;
        self
    }

    /// Sets the relative tolerance for the iterative increment
    pub fn set_tol_mdu_rel(&mut self, value: f64) -> &mut Self {
        self.tol_mdu_rel = value;
        self
    }

    /// Enables the ML branch from the given timestep on using the given weights file
    pub fn set_ml_switch(&mut self, switch_timestep: usize, weights: &str) -> &mut Self {
        self.ml_enabled = true;
        self.ml_switch_timestep = switch_timestep;
        self.surrogate_weights = Some(weights.to_string());
        self
    }

    /// Sets the hand-off rule at the physics→ML transition
    pub fn set_hand_off(&mut self, hand_off: HandOff) -> &mut Self {
        self.surrogate.hand_off = hand_off;
        self
    }

    /// Sets parallel evaluation of material points
    pub fn set_parallel(&mut self, flag: bool) -> &mut Self {
        self.parallel = flag;
        self
    }

    /// Sets the verbose flags
    pub fn set_verbose(&mut self, timesteps: bool, iterations: bool) -> &mut Self {
        self.verbose_timesteps = timesteps;
        self.verbose_iterations = iterations;
        self
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.n_points < 1 {
            return Some(format!("n_points = {} is incorrect; it must be ≥ 1", self.n_points));
        }
        if let Err(e) = self.loading.validate() {
            return Some(e.to_string());
        }
        if self.dt_min < CONFIG_MIN_DT_MIN {
            return Some(format!(
                "dt_min = {:?} is incorrect; it must be ≥ {:e}",
                self.dt_min, CONFIG_MIN_DT_MIN
            ));
        }
        if self.dt < self.dt_min {
            return Some(format!(
                "dt = {:?} is incorrect; it must be ≥ dt_min = {:?}",
                self.dt, self.dt_min
            ));
        }
        if self.dt_max < self.dt {
            return Some(format!(
                "dt_max = {:?} is incorrect; it must be ≥ dt = {:?}",
                self.dt_max, self.dt
            ));
        }
        if self.dt_shrink <= 0.0 || self.dt_shrink >= 1.0 {
            return Some(format!(
                "dt_shrink = {:?} is incorrect; it must satisfy 0 < shrink < 1",
                self.dt_shrink
            ));
        }
        if self.dt_grow < 1.0 {
            return Some(format!("dt_grow = {:?} is incorrect; it must be ≥ 1.0", self.dt_grow));
        }
        if self.n_max_iterations < 1 {
            return Some(format!(
                "n_max_iterations = {} is incorrect; it must be ≥ 1",
                self.n_max_iterations
            ));
        }
        if self.tol_rr_abs < CONFIG_MIN_TOL {
            return Some(format!(
                "tol_rr_abs = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_rr_abs, CONFIG_MIN_TOL
            ));
        }
        if self.tol_mdu_rel < CONFIG_MIN_TOL {
            return Some(format!(
                "tol_mdu_rel = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_mdu_rel, CONFIG_MIN_TOL
            ));
        }
        if self.ml_enabled {
            if self.surrogate_weights.is_none() {
                return Some("the surrogate weights file must be given when the ML branch is enabled".to_string());
            }
            if let Err(e) = self.surrogate.validate() {
                return Some(e.to_string());
            }
            if self.surrogate.hand_off == HandOff::WarmStart && self.strain_history_length < 1 {
                return Some("the warm-start hand-off requires strain_history_length ≥ 1".to_string());
            }
        }
        None // all good
    }

    /// Returns the number of strains recorded per point
    pub fn recorded_history_length(&self) -> usize {
        if self.ml_enabled && self.surrogate.hand_off == HandOff::WarmStart {
            self.strain_history_length
        } else {
            0
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Material points")?;
        writeln!(f, "===============")?;
        writeln!(f, "n_points = {}", self.n_points)?;
        writeln!(f, "control = {:?}", self.control)?;
        writeln!(f, "parallel = {:?}", self.parallel)?;
        writeln!(f, "\nLoading")?;
        writeln!(f, "=======")?;
        writeln!(f, "kind = {:?}", self.loading.kind)?;
        writeln!(f, "amplitudes = {:?}", self.loading.amplitudes)?;
        writeln!(f, "rate = {:?}", self.loading.rate)?;
        writeln!(f, "component = {:?}", self.loading.component)?;
        writeln!(f, "\nTime stepping and iterations")?;
        writeln!(f, "============================")?;
        writeln!(f, "dt = {:?}", self.dt)?;
        writeln!(f, "dt_min = {:?}", self.dt_min)?;
        writeln!(f, "dt_max = {:?}", self.dt_max)?;
        writeln!(f, "dt_shrink = {:?}", self.dt_shrink)?;
        writeln!(f, "dt_grow = {:?}", self.dt_grow)?;
        writeln!(f, "n_max_time_steps = {:?}", self.n_max_time_steps)?;
        writeln!(f, "n_max_iterations = {:?}", self.n_max_iterations)?;
        writeln!(f, "tol_rr_abs = {:?}", self.tol_rr_abs)?;
        writeln!(f, "tol_mdu_rel = {:?}", self.tol_mdu_rel)?;
        writeln!(f, "\nSurrogate")?;
        writeln!(f, "=========")?;
        writeln!(f, "ml_enabled = {:?}", self.ml_enabled)?;
        writeln!(f, "ml_switch_timestep = {:?}", self.ml_switch_timestep)?;
        writeln!(f, "surrogate_weights = {:?}", self.surrogate_weights)?;
        writeln!(f, "window = {:?}", self.surrogate.window)?;
        writeln!(f, "fd_step = {:?}", self.surrogate.fd_step)?;
        writeln!(f, "hand_off = {:?}", self.surrogate.hand_off)?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
