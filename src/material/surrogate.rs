use super::{
    mat3_mul, numerical_tangent, small_strain, tensor_general, ConstitutiveResult, ConstitutiveTrait,
    LocalDiagnostics, Lstm, LstmWeights, MaterialState, Mode, RecurrentMemory, TrialState,
};
use crate::base::{amplification, ParamMaterial, ParamSurrogate};
use crate::StrError;
use russell_lab::Vector;
use russell_tensor::Tensor4;
use std::collections::VecDeque;

/// Implements the ML branch: a forward pass of the recurrent surrogate
///
/// The recurrent memory replaces the explicit physics internal variables; the damage, the viscous
/// and viscoplastic deformation gradients, and the backstress are carried unchanged. The elastic part
/// is recomputed from the total deformation gradient so that the decomposition still holds.
pub struct SurrogateEvaluator {
    lstm: Lstm,
    param: ParamSurrogate,
    amplification: f64,
}

impl SurrogateEvaluator {
    /// Allocates a new instance
    pub fn new(weights: &LstmWeights, param: ParamSurrogate, material: &ParamMaterial) -> Result<Self, StrError> {
        param.validate()?;
        Ok(SurrogateEvaluator {
            lstm: Lstm::new(weights)?,
            param,
            amplification: amplification(&material.environment),
        })
    }

    /// Returns the surrogate options
    pub fn param(&self) -> &ParamSurrogate {
        &self.param
    }

    /// Returns a memory with zero hidden and cell states
    pub fn zero_memory(&self) -> RecurrentMemory {
        self.lstm.zero_memory()
    }

    /// Returns the memory obtained by replaying a recorded strain history from zero memory
    pub fn warm_start(&self, history: &VecDeque<Vector>) -> Result<RecurrentMemory, StrError> {
        self.lstm.replay(history, self.param.window)
    }
}

impl ConstitutiveTrait for SurrogateEvaluator {
    fn mode(&self) -> Mode {
        Mode::Ml
    }

    fn update(&self, trial: &TrialState) -> Result<ConstitutiveResult, StrError> {
        let prev = trial.previous;
        let memory = prev
            .memory
            .as_ref()
            .ok_or("the recurrent memory must be initialized before the surrogate evaluation")?;
        let eps = small_strain(trial.ff);
        let eps_prev = small_strain(&prev.ff_total);
        let x = self.lstm.input(eps.vector(), eps_prev.vector());
        let (stress, next) = self.lstm.forward(memory, &x, self.param.window)?;
        if stress.vector().as_data().iter().any(|v| !v.is_finite()) {
            let mut diagnostics = LocalDiagnostics::direct(self.amplification);
            diagnostics.residual = f64::MAX;
            return Ok(ConstitutiveResult::not_converged(prev, diagnostics));
        }
        let ff = trial.ff.as_matrix();
        let ff_a = mat3_mul(&ff, &prev.ff_vp.as_matrix())?;
        let ff_e = mat3_mul(&ff_a, &prev.ff_v.as_matrix())?;
        let mut candidate = prev.clone();
        candidate.ff_total = trial.ff.clone();
        candidate.ff_e = tensor_general(&ff_e)?;
        candidate.stress = stress.clone();
        candidate.memory = Some(next);
        Ok(ConstitutiveResult {
            stress,
            candidate,
            diagnostics: LocalDiagnostics::direct(self.amplification),
            linearization: None,
        })
    }

    /// Computes the tangent by central finite differences with step `fd_step`
    fn tangent(&self, dd: &mut Tensor4, trial: &TrialState, _result: &ConstitutiveResult) -> Result<(), StrError> {
        numerical_tangent(self, dd, trial, self.param.fd_step)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
