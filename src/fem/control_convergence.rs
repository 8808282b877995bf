use crate::base::Config;
use crate::material::Mode;
use crate::StrError;
use russell_lab::{vec_copy, vec_max_scaled, vec_norm, Norm, Vector};

/// Controls the convergence of the global Newton-Raphson iterations
///
/// Tracks the residual norm (`norm_rr`) and the relative increment (`rel_mdu`) of the unknown
/// strain components, and prints the iteration history when the verbose flags are set.
pub struct ControlConvergence<'a> {
    config: &'a Config,
    iteration: usize,
    norm_rr_prev: f64,
    norm_rr: f64,
    mdu0: Vector,
    norm_mdu: f64,
    rel_mdu_prev: f64,
    rel_mdu: f64,
    converged_on_norm_rr: bool,
    diverging_on_norm_rr: bool,
    converged_on_rel_mdu: bool,
    diverging_on_rel_mdu: bool,
    n_converged_total: usize,
    n_failed_total: usize,
}

impl<'a> ControlConvergence<'a> {
    /// Creates a new convergence controller
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration parameters including convergence tolerances
    /// * `n_unknown` - Total number of global unknowns
    pub fn new(config: &'a Config, n_unknown: usize) -> Self {
        ControlConvergence {
            config,
            iteration: 0,
            norm_rr_prev: 0.0,
            norm_rr: 0.0,
            mdu0: Vector::new(n_unknown),
            norm_mdu: 0.0,
            rel_mdu_prev: 0.0,
            rel_mdu: 0.0,
            converged_on_norm_rr: false,
            diverging_on_norm_rr: false,
            converged_on_rel_mdu: false,
            diverging_on_rel_mdu: false,
            n_converged_total: 0,
            n_failed_total: 0,
        }
    }

    /// Resets convergence flags for a new step
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.norm_mdu = 0.0;
        self.rel_mdu = 0.0;
        self.converged_on_norm_rr = false;
        self.diverging_on_norm_rr = false;
        self.converged_on_rel_mdu = false;
        self.diverging_on_rel_mdu = false;
    }

    /// Increments the total number of converged steps
    pub fn add_converged(&mut self) {
        self.n_converged_total += 1;
    }

    /// Increments the total number of failed attempts
    pub fn add_failed(&mut self) {
        self.n_failed_total += 1;
    }

    /// Returns the total number of converged steps
    pub fn n_converged_total(&self) -> usize {
        self.n_converged_total
    }

    /// Returns the total number of failed attempts
    pub fn n_failed_total(&self) -> usize {
        self.n_failed_total
    }

    /// Returns the current norm of the residual
    pub fn norm_rr(&self) -> f64 {
        self.norm_rr
    }

    /// Returns true if the residual satisfies the tolerance
    pub fn converged_on_norm_rr(&self) -> bool {
        self.converged_on_norm_rr
    }

    /// Returns true if the relative increment satisfies the tolerance
    pub fn converged_on_rel_mdu(&self) -> bool {
        self.converged_on_rel_mdu
    }

    /// Returns true if either the residual or the relative increment satisfies its tolerance
    pub fn converged(&self) -> bool {
        self.converged_on_norm_rr || self.converged_on_rel_mdu
    }

    /// Analyzes convergence based on the residual vector
    ///
    /// Returns an error if NaN or Inf values are detected.
    pub(crate) fn analyze_rr(&mut self, iteration: usize, rr: &Vector) -> Result<(), StrError> {
        self.iteration = iteration;
        self.norm_rr = if rr.dim() == 0 { 0.0 } else { vec_norm(rr, Norm::Max) };
        let found_nan_or_inf = !self.norm_rr.is_finite();
        self.converged_on_norm_rr = if found_nan_or_inf {
            false
        } else {
            self.norm_rr < self.config.tol_rr_abs
        };
        self.diverging_on_norm_rr = if found_nan_or_inf || iteration == 0 {
            false
        } else {
            self.norm_rr > self.norm_rr_prev
        };
        self.norm_rr_prev = self.norm_rr;
        if found_nan_or_inf {
            Err("found NaN or Inf in the residual")
        } else {
            Ok(())
        }
    }

    /// Analyzes convergence based on the increment of the unknowns
    ///
    /// Returns an error if NaN or Inf values are detected.
    pub(crate) fn analyze_mdu(&mut self, iteration: usize, mdu: &Vector) -> Result<(), StrError> {
        self.norm_mdu = if mdu.dim() == 0 { 0.0 } else { vec_norm(mdu, Norm::Max) };
        let found_nan_or_inf = !self.norm_mdu.is_finite();
        if iteration == 0 && !found_nan_or_inf {
            vec_copy(&mut self.mdu0, mdu)?;
            self.rel_mdu = 1.0;
        }
        self.converged_on_rel_mdu = if found_nan_or_inf || iteration == 0 {
            false
        } else {
            //                 /    |mduᵢ|    \
            // rel_mdu = max_i | ──────────── |
            //                 \ 1 + |mdu0ᵢ| /
            self.rel_mdu = vec_max_scaled(mdu, &self.mdu0);
            self.rel_mdu < self.config.tol_mdu_rel
        };
        self.diverging_on_rel_mdu = if found_nan_or_inf || iteration < 2 {
            false
        } else {
            self.rel_mdu > self.rel_mdu_prev
        };
        self.rel_mdu_prev = self.rel_mdu;
        if found_nan_or_inf {
            Err("found NaN or Inf in the increment")
        } else {
            Ok(())
        }
    }

    /// Prints the header before time stepping and convergence statistics
    pub fn print_header(&self) {
        if self.config.verbose_timesteps || self.config.verbose_iterations {
            println!("\nVEVPD === TIME STEPPING AND CONVERGENCE STATISTICS ============================");
            println!("\nLegend:");
            println!("✅ : converged");
            println!("🔹 : converging");
            println!("🎈 : diverging");
            println!("❌ : failed (increment reduced)");
            println!("\"iter\" means iteration\n");
            println!("{}", "─".repeat(79));
            println!(
                "{:8} {:>11} {:>11} {:>7} {:>5} {:>9} {:>9}    {:>9}",
                "timestep", "t", "Δt", "mode", "iter", "‖mdu‖∞", "rel(mdu)", "‖R‖∞"
            );
            println!("{}", "─".repeat(79));
        }
    }

    /// Prints timestep information
    pub(crate) fn print_timestep(&self, timestep: usize, t: f64, dt: f64, mode: Mode) {
        if self.config.verbose_timesteps {
            let str_mode = match mode {
                Mode::Physics => "physics",
                Mode::Ml => "ml",
            };
            println!("{:>8} {:>11.6e} {:>11.6e} {:>7}", timestep + 1, t, dt, str_mode);
        }
    }

    /// Prints iteration information
    pub(crate) fn print_iteration(&self) {
        if self.config.verbose_iterations {
            let icon_rr = if self.converged_on_norm_rr {
                "✅"
            } else if self.diverging_on_norm_rr {
                "🎈"
            } else {
                "🔹"
            };
            if self.iteration == 0 {
                println!(
                    "{:>8} {:>11} {:>11} {:>7} {:>5} {:>9.2e} {:>9}    {:>9.2e} {}",
                    "·", "·", "·", "", self.iteration, self.norm_mdu, "·", self.norm_rr, icon_rr
                );
            } else {
                let icon_mdu = if self.converged_on_rel_mdu {
                    "✅"
                } else if self.diverging_on_rel_mdu {
                    "🎈"
                } else {
                    "🔹"
                };
                println!(
                    "{:>8} {:>11} {:>11} {:>7} {:>5} {:>9.2e} {:>9.2e} {} {:>9.2e} {}",
                    "·", "·", "·", "", self.iteration, self.norm_mdu, self.rel_mdu, icon_mdu, self.norm_rr, icon_rr
                );
            }
        }
    }

    /// Prints a message when the step fails and the increment is reduced
    pub(crate) fn print_failure(&self, reason: &str, dt_new: f64) {
        if self.config.verbose_timesteps || self.config.verbose_iterations {
            println!("{:>8} ❌ {} (Δt → {:.6e})", "·", reason, dt_new);
        }
    }

    /// Prints the horizontal line at the end of the analysis
    pub(crate) fn print_footer(&self) {
        if self.config.verbose_timesteps || self.config.verbose_iterations {
            println!("{}", "─".repeat(79));
            println!(
                "converged steps = {}, failed attempts = {}",
                self.n_converged_total, self.n_failed_total
            );
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
