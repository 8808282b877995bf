use crate::base::Config;
use crate::StrError;

/// Assists in the time loop control with an adaptive increment
///
/// # Notes
///
/// * After a converged step: `Δt ← min(grow·Δt, dt_max)`
/// * After a failed step: `Δt ← shrink·Δt`; a fatal error is returned if `Δt < dt_min`
/// * The last increment is truncated so that the final time is reached exactly
pub struct ControlTime<'a> {
    /// Holds configuration parameters
    config: &'a Config,

    /// Final time of the loading path
    t_fin: f64,

    /// Current (converged) time
    t: f64,

    /// Current time increment
    dt: f64,
}

impl<'a> ControlTime<'a> {
    /// Allocates a new instance
    pub fn new(config: &'a Config) -> Result<Self, StrError> {
        if config.dt < config.dt_min {
            return Err("Δt is smaller than the allowed minimum");
        }
        if config.dt_shrink <= 0.0 || config.dt_shrink >= 1.0 {
            return Err("the shrink factor must satisfy 0 < shrink < 1");
        }
        Ok(ControlTime {
            config,
            t_fin: config.loading.final_time(),
            t: 0.0,
            dt: config.dt,
        })
    }

    /// Resets the time and the increment
    pub fn initialize(&mut self) {
        self.t = 0.0;
        self.dt = self.config.dt;
    }

    /// Returns the current (converged) time
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Returns the final time
    pub fn t_fin(&self) -> f64 {
        self.t_fin
    }

    /// Returns true if the final time has been reached
    pub fn finished(&self) -> bool {
        self.t >= self.t_fin - 1e-12 * f64::max(1.0, self.t_fin)
    }

    /// Returns the increment to be tried next (truncated at the final time)
    pub fn next_dt(&self) -> f64 {
        f64::min(self.dt, self.t_fin - self.t)
    }

    /// Advances the time after a converged step and grows the increment
    pub fn on_success(&mut self, dt_used: f64) {
        self.t += dt_used;
        if self.finished() {
            self.t = self.t_fin;
        }
        self.dt = f64::min(self.dt * self.config.dt_grow, self.config.dt_max);
    }

    /// Shrinks the increment after a failed step
    ///
    /// Returns the new increment or an error if it falls below the allowed minimum.
    pub fn on_failure(&mut self) -> Result<f64, StrError> {
        self.dt *= self.config.dt_shrink;
        if self.dt < self.config.dt_min {
            return Err("Δt is smaller than the allowed minimum");
        }
        Ok(self.dt)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
