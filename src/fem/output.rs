use crate::material::{small_strain, LocalDiagnostics, MaterialState, Mode};
use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the results of one material point at a converged timestep
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PointOutput {
    /// Small strain ε = sym(F) − I (Mandel)
    pub strain: Vector,

    /// Cauchy stress (Mandel)
    pub stress: Vector,

    /// Damage
    pub damage: f64,

    /// Accumulated viscoplastic strain
    pub eps_p: f64,

    /// Number of local iterations
    pub iterations: usize,

    /// Final residual of the local iterations
    pub residual: f64,
}

/// Holds the results of all material points at a converged timestep
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepOutput {
    /// Timestep index (number of accepted steps, including this one)
    pub timestep: usize,

    /// Time at the end of the step
    pub t: f64,

    /// Increment used in this step
    pub dt: f64,

    /// Evaluator used in this step
    pub mode: Mode,

    /// Number of global iterations
    pub iterations: usize,

    /// Results at each material point
    pub points: Vec<PointOutput>,
}

impl PointOutput {
    /// Allocates a new instance from a committed state
    pub fn new(state: &MaterialState, diagnostics: &LocalDiagnostics) -> Self {
        PointOutput {
            strain: small_strain(&state.ff_total).vector().clone(),
            stress: state.stress.vector().clone(),
            damage: state.damage,
            eps_p: state.eps_p,
            iterations: diagnostics.iterations,
            residual: diagnostics.residual,
        }
    }
}

impl StepOutput {
    /// Reads a JSON file containing the step results
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let output = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(output)
    }

    /// Writes a JSON file with the step results
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
