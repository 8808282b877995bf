use super::{Linearization, MaterialState, Mode, PlasticActivity, ViscousActivity};
use crate::base::N_MANDEL;
use crate::StrError;
use russell_lab::Vector;
use russell_tensor::{Mandel, Tensor2, Tensor4};
use serde::{Deserialize, Serialize};

/// Holds the transient input of one constitutive evaluation
pub struct TrialState<'a> {
    /// Trial total deformation gradient
    pub ff: &'a Tensor2,

    /// Previously converged (committed) state
    pub previous: &'a MaterialState,

    /// Time increment Δt
    pub dt: f64,
}

/// Holds the diagnostics of the local update
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LocalDiagnostics {
    /// Local convergence flag
    pub converged: bool,

    /// Number of local iterations (zero for the surrogate)
    pub iterations: usize,

    /// Max-norm of the flow-rule residuals (f64::MAX for numerical domain errors)
    pub residual: f64,

    /// Viscous flow tag at the last iteration
    pub viscous: ViscousActivity,

    /// Viscoplastic flow tag at the last iteration
    pub plastic: PlasticActivity,

    /// Viscous flow increment Δγv
    pub dgamma_v: f64,

    /// Viscoplastic flow increment Δγp
    pub dgamma_p: f64,

    /// Environmental amplification factor X applied to the moduli
    pub amplification: f64,
}

/// Holds the output of one constitutive evaluation
pub struct ConstitutiveResult {
    /// Cauchy stress
    pub stress: Tensor2,

    /// Updated state, committed only after the global step converges
    pub candidate: MaterialState,

    /// Local diagnostics
    pub diagnostics: LocalDiagnostics,

    /// Data required by the analytic tangent (physics branch only)
    pub linearization: Option<Linearization>,
}

/// Specifies the contract shared by the physics and surrogate evaluators
pub trait ConstitutiveTrait: Send + Sync {
    /// Returns the evaluation mode implemented by this evaluator
    fn mode(&self) -> Mode;

    /// Computes the stress and the candidate state for a trial deformation gradient
    ///
    /// Local non-convergence is not an error: it is reported via `diagnostics.converged`.
    fn update(&self, trial: &TrialState) -> Result<ConstitutiveResult, StrError>;

    /// Computes the consistent tangent D = ∂σ/∂ε (Mandel, symmetric) at an updated state
    fn tangent(&self, dd: &mut Tensor4, trial: &TrialState, result: &ConstitutiveResult) -> Result<(), StrError>;
}

impl LocalDiagnostics {
    /// Returns diagnostics for a successful evaluation without local iterations
    pub fn direct(amplification: f64) -> Self {
        LocalDiagnostics {
            converged: true,
            iterations: 0,
            residual: 0.0,
            viscous: ViscousActivity::Relaxed,
            plastic: PlasticActivity::Elastic,
            dgamma_v: 0.0,
            dgamma_p: 0.0,
            amplification,
        }
    }
}

impl ConstitutiveResult {
    /// Returns a result flagged as not converged that carries the previous state unchanged
    pub fn not_converged(previous: &MaterialState, diagnostics: LocalDiagnostics) -> Self {
        ConstitutiveResult {
            stress: previous.stress.clone(),
            candidate: previous.clone(),
            diagnostics: LocalDiagnostics {
                converged: false,
                ..diagnostics
            },
            linearization: None,
        }
    }
}

/// Computes the tangent by central finite differences of the Mandel strain components
///
/// ```text
/// D[:,j] = (σ(ε + h eⱼ) − σ(ε − h eⱼ)) / 2h
/// ```
///
/// The perturbation `h eⱼ` is applied to the symmetric part of F so that ε = sym(F) − I changes by
/// exactly `h` in the Mandel component j.
pub fn numerical_tangent<M>(model: &M, dd: &mut Tensor4, trial: &TrialState, step: f64) -> Result<(), StrError>
where
    M: ConstitutiveTrait + ?Sized,
{
    if !(step > 0.0) {
        return Err("the finite-difference step must be > 0.0");
    }
    let mut stress_plus: Vec<Vector> = Vec::with_capacity(N_MANDEL);
    let mut stress_minus: Vec<Vector> = Vec::with_capacity(N_MANDEL);
    for j in 0..N_MANDEL {
        for (sign, out) in [(1.0, &mut stress_plus), (-1.0, &mut stress_minus)] {
            let mut delta = Tensor2::new(Mandel::Symmetric);
            delta.vector_mut()[j] = sign * step;
            let mut data = [[0.0; 3]; 3];
            for r in 0..3 {
                for c in 0..3 {
                    data[r][c] = trial.ff.get(r, c) + delta.get(r, c);
                }
            }
            let ff_perturbed = Tensor2::from_matrix(&data, Mandel::General)?;
            let perturbed = TrialState {
                ff: &ff_perturbed,
                previous: trial.previous,
                dt: trial.dt,
            };
            let result = model.update(&perturbed)?;
            if !result.diagnostics.converged {
                return Err("the local update failed during the finite-difference tangent");
            }
            out.push(result.stress.vector().clone());
        }
    }
    let mat = dd.matrix_mut();
    for i in 0..N_MANDEL {
        for j in 0..N_MANDEL {
            mat.set(i, j, (stress_plus[j][i] - stress_minus[j][i]) / (2.0 * step));
        }
    }
    Ok(())
}
