use crate::base::{Config, ParamMaterial};
use crate::material::{
    ConstitutiveTrait, LocalDiagnostics, LstmWeights, MaterialState, Mode, ModeSwitch, PhysicsEvaluator, StateStore,
    SurrogateEvaluator, Transition, TrialState,
};
use crate::StrError;
use rayon::prelude::*;
use russell_tensor::{Mandel, Tensor2, Tensor4};

/// Holds the response of one material point to a trial deformation gradient
#[derive(Clone, Debug)]
pub struct PointResponse {
    /// Cauchy stress
    pub stress: Tensor2,

    /// Consistent tangent D = ∂σ/∂ε (Mandel; zero if the local update did not converge)
    pub tangent: Tensor4,

    /// Local diagnostics
    pub diagnostics: LocalDiagnostics,

    /// Evaluator that produced this response
    pub mode: Mode,
}

/// Holds the trial (uncommitted) data of one point
struct PointTrial {
    candidate: MaterialState,
    response: PointResponse,
}

/// Indicates whether a step is open
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Open,
}

/// Implements the interface between a global Newton-Raphson driver and the constitutive core
///
/// The call sequence for each timestep is:
///
/// ```text
/// begin_step(Δt) → evaluate(id, F) | evaluate_all([F]) (any number of times)
///                → accept_point(id)* → accept_step()   or   reject_step()
/// ```
///
/// Trial states are kept aside; the committed history of a point changes only when the point
/// (or the whole step) is accepted. Rejecting a step discards all trials.
pub struct MaterialPoints {
    config: Config,
    physics: PhysicsEvaluator,
    surrogate: Option<SurrogateEvaluator>,
    switch: ModeSwitch,
    store: StateStore,
    trials: Vec<Option<PointTrial>>,
    accepted: Vec<bool>,
    phase: Phase,
    dt: f64,
    timestep: usize,
    n_physics_calls: usize,
    n_surrogate_calls: usize,
}

impl MaterialPoints {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `param` -- material parameters (shared by all points)
    /// * `config` -- configuration; `n_points` and the ML switch settings are used here
    /// * `weights` -- surrogate weights; required if the ML branch is enabled
    pub fn new(param: &ParamMaterial, config: &Config, weights: Option<&LstmWeights>) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate material points because config.validate() failed");
        }
        param.validate()?;
        let surrogate = if config.ml_enabled {
            let w = weights.ok_or("the surrogate weights must be given when the ML branch is enabled")?;
            Some(SurrogateEvaluator::new(w, config.surrogate, param)?)
        } else {
            None
        };
        let n = config.n_points;
        Ok(MaterialPoints {
            config: config.clone(),
            physics: PhysicsEvaluator::new(param)?,
            surrogate,
            switch: ModeSwitch::new(config),
            store: StateStore::new(n),
            trials: (0..n).map(|_| None).collect(),
            accepted: vec![false; n],
            phase: Phase::Idle,
            dt: 0.0,
            timestep: 0,
            n_physics_calls: 0,
            n_surrogate_calls: 0,
        })
    }

    /// Allocates a new instance reading the surrogate weights from `config.surrogate_weights`
    pub fn from_config(param: &ParamMaterial, config: &Config) -> Result<Self, StrError> {
        if !config.ml_enabled {
            return MaterialPoints::new(param, config, None);
        }
        let path = match &config.surrogate_weights {
            Some(p) => p,
            None => {
                println!("ERROR: the surrogate weights file must be given when the ML branch is enabled");
                return Err("cannot allocate material points because config.validate() failed");
            }
        };
        let weights = LstmWeights::read_json(path)?;
        MaterialPoints::new(param, config, Some(&weights))
    }

    /// Returns the number of points
    pub fn n_points(&self) -> usize {
        self.store.len()
    }

    /// Returns the current mode
    pub fn mode(&self) -> Mode {
        self.switch.mode()
    }

    /// Returns the timestep index at which the surrogate took over, if any
    pub fn switched_at(&self) -> Option<usize> {
        self.switch.switched_at()
    }

    /// Returns the timestep index (number of accepted steps)
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    /// Returns the number of point evaluations performed by the physics branch
    pub fn n_physics_calls(&self) -> usize {
        self.n_physics_calls
    }

    /// Returns the number of point evaluations performed by the surrogate
    pub fn n_surrogate_calls(&self) -> usize {
        self.n_surrogate_calls
    }

    /// Returns the committed state of a point
    pub fn committed(&self, point_id: usize) -> Result<&MaterialState, StrError> {
        self.store.get(point_id)
    }

    /// Returns the committed states of all points
    pub fn states(&self) -> &StateStore {
        &self.store
    }

    /// Opens a new timestep
    ///
    /// Selects the mode for the current timestep index. At the physics→ML transition, the
    /// recurrent memory of every point is initialized from its committed state (and only the
    /// memory is written). If any memory cannot be built, nothing is written and the mode stays
    /// physics.
    pub fn begin_step(&mut self, dt: f64) -> Result<Mode, StrError> {
        if self.phase == Phase::Open {
            return Err("begin_step cannot be called while a step is open");
        }
        if !(dt > 0.0) {
            return Err("Δt must be > 0.0");
        }
        if self.switch.transition(self.timestep) == Transition::PhysicsToMl {
            let surrogate = self
                .surrogate
                .as_ref()
                .ok_or("the surrogate is not available for the physics to ML transition")?;
            let memories = self
                .store
                .iter()
                .map(|state| self.switch.initial_memory(surrogate, state))
                .collect::<Result<Vec<_>, StrError>>()?;
            for (state, memory) in self.store.iter_mut().zip(memories) {
                state.memory = Some(memory);
            }
            self.switch.commit(self.timestep);
        }
        self.phase = Phase::Open;
        self.dt = dt;
        Ok(self.switch.mode())
    }

    /// Evaluates the stress and the tangent of one point for a trial deformation gradient
    ///
    /// The result replaces any previous trial of this point within the current step.
    pub fn evaluate(&mut self, point_id: usize, ff: &Tensor2) -> Result<&PointResponse, StrError> {
        if self.phase != Phase::Open {
            return Err("begin_step must be called before evaluate");
        }
        if *self.accepted.get(point_id).ok_or("point id is out of bounds")? {
            return Err("the point has already been accepted in this step");
        }
        let mode = self.switch.mode();
        let model = select_model(mode, &self.physics, self.surrogate.as_ref())?;
        let previous = self.store.get(point_id)?;
        let trial = evaluate_point(model, previous, ff, self.dt, self.config.recorded_history_length())?;
        self.count_calls(mode, 1);
        self.trials[point_id] = Some(trial);
        self.response(point_id)
    }

    /// Evaluates all points (in parallel if enabled)
    ///
    /// Returns true if all local updates converged.
    pub fn evaluate_all(&mut self, ffs: &[Tensor2]) -> Result<bool, StrError> {
        if self.phase != Phase::Open {
            return Err("begin_step must be called before evaluate");
        }
        if ffs.len() != self.store.len() {
            return Err("the number of deformation gradients must equal the number of points");
        }
        if self.accepted.iter().any(|a| *a) {
            return Err("cannot evaluate all points after a point has been accepted");
        }
        let mode = self.switch.mode();
        let model = select_model(mode, &self.physics, self.surrogate.as_ref())?;
        let store = &self.store;
        let dt = self.dt;
        let history = self.config.recorded_history_length();
        let trials: Vec<PointTrial> = if self.config.parallel {
            ffs.par_iter()
                .enumerate()
                .map(|(id, ff)| evaluate_point(model, store.get(id)?, ff, dt, history))
                .collect::<Result<Vec<_>, StrError>>()?
        } else {
            ffs.iter()
                .enumerate()
                .map(|(id, ff)| evaluate_point(model, store.get(id)?, ff, dt, history))
                .collect::<Result<Vec<_>, StrError>>()?
        };
        let all_converged = trials.iter().all(|t| t.response.diagnostics.converged);
        self.count_calls(mode, trials.len());
        for (slot, trial) in self.trials.iter_mut().zip(trials) {
            *slot = Some(trial);
        }
        Ok(all_converged)
    }

    /// Returns the latest trial response of a point in the current step
    pub fn response(&self, point_id: usize) -> Result<&PointResponse, StrError> {
        match self.trials.get(point_id).ok_or("point id is out of bounds")? {
            Some(trial) => Ok(&trial.response),
            None => Err("the point has not been evaluated in this step"),
        }
    }

    /// Commits the trial state of one point
    ///
    /// The point must have been evaluated and converged in the current step.
    pub fn accept_point(&mut self, point_id: usize) -> Result<(), StrError> {
        if self.phase != Phase::Open {
            return Err("accept_point requires an open step");
        }
        if *self.accepted.get(point_id).ok_or("point id is out of bounds")? {
            return Err("the point has already been accepted in this step");
        }
        let trial = match self.trials[point_id].take() {
            Some(trial) => trial,
            None => return Err("the point has not been evaluated in this step"),
        };
        if !trial.response.diagnostics.converged {
            self.trials[point_id] = Some(trial);
            return Err("cannot accept a point whose local update has not converged");
        }
        self.store.commit(point_id, trial.candidate)?;
        self.accepted[point_id] = true;
        Ok(())
    }

    /// Commits all remaining trial states and closes the step
    ///
    /// Nothing is committed unless every point not yet accepted holds a converged trial.
    pub fn accept_step(&mut self) -> Result<(), StrError> {
        if self.phase != Phase::Open {
            return Err("accept_step requires an open step");
        }
        for (trial, accepted) in self.trials.iter().zip(&self.accepted) {
            if *accepted {
                continue;
            }
            match trial {
                Some(t) if t.response.diagnostics.converged => (),
                Some(_) => return Err("cannot accept a step with a non-converged point"),
                None => return Err("all points must be evaluated before accept_step"),
            }
        }
        for id in 0..self.trials.len() {
            if let Some(trial) = self.trials[id].take() {
                self.store.commit(id, trial.candidate)?;
            }
            self.accepted[id] = false;
        }
        self.timestep += 1;
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Discards all trial states and closes the step
    pub fn reject_step(&mut self) -> Result<(), StrError> {
        if self.phase != Phase::Open {
            return Err("reject_step requires an open step");
        }
        if self.accepted.iter().any(|a| *a) {
            return Err("cannot reject a step after a point has been accepted");
        }
        for trial in self.trials.iter_mut() {
            *trial = None;
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Updates the call counters
    fn count_calls(&mut self, mode: Mode, n: usize) {
        match mode {
            Mode::Physics => self.n_physics_calls += n,
            Mode::Ml => self.n_surrogate_calls += n,
        }
    }
}

/// Returns the evaluator of the given mode
fn select_model<'a>(
    mode: Mode,
    physics: &'a PhysicsEvaluator,
    surrogate: Option<&'a SurrogateEvaluator>,
) -> Result<&'a dyn ConstitutiveTrait, StrError> {
    match mode {
        Mode::Physics => Ok(physics),
        Mode::Ml => match surrogate {
            Some(s) => Ok(s),
            None => Err("the surrogate is not available"),
        },
    }
}

/// Runs the local update and the tangent of one point
fn evaluate_point(
    model: &dyn ConstitutiveTrait,
    previous: &MaterialState,
    ff: &Tensor2,
    dt: f64,
    history: usize,
) -> Result<PointTrial, StrError> {
    let trial = TrialState { ff, previous, dt };
    let mut result = model.update(&trial)?;
    let mut tangent = Tensor4::new(Mandel::Symmetric);
    if result.diagnostics.converged {
        model.tangent(&mut tangent, &trial, &result)?;
        result.candidate.push_strain(history);
    }
    Ok(PointTrial {
        candidate: result.candidate,
        response: PointResponse {
            stress: result.stress,
            tangent,
            diagnostics: result.diagnostics,
            mode: model.mode(),
        },
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::MaterialPoints;
    use crate::base::{Config, HandOff, ParamMaterial};
    use crate::material::{deformation_from_strain, LstmWeights, Mode};
    use russell_lab::Vector;

    fn shear(gamma: f64) -> russell_tensor::Tensor2 {
        // Mandel: ε12 = γ/2 → v[3] = √2 ε12
        let v = Vector::from(&[0.0, 0.0, 0.0, gamma / f64::sqrt(2.0), 0.0, 0.0]);
        deformation_from_strain(&v).unwrap()
    }

    #[test]
    fn new_captures_errors() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        config.n_points = 0;
        assert_eq!(
            MaterialPoints::new(&param, &config, None).err(),
            Some("cannot allocate material points because config.validate() failed")
        );
        config.n_points = 1;
        config.set_ml_switch(0, "/tmp/vevpd/test/none.json");
        assert_eq!(
            MaterialPoints::new(&param, &config, None).err(),
            Some("the surrogate weights must be given when the ML branch is enabled")
        );
        assert_eq!(
            MaterialPoints::from_config(&param, &config).err(),
            Some("cannot open the surrogate weights file")
        );
    }

    #[test]
    fn phases_are_enforced() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        config.set_n_points(2).unwrap();
        let mut points = MaterialPoints::new(&param, &config, None).unwrap();
        let ff = shear(1e-4);
        assert_eq!(points.evaluate(0, &ff).err(), Some("begin_step must be called before evaluate"));
        assert_eq!(points.accept_step().err(), Some("accept_step requires an open step"));
        assert_eq!(points.reject_step().err(), Some("reject_step requires an open step"));
        assert_eq!(points.begin_step(0.0).err(), Some("Δt must be > 0.0"));
        assert_eq!(points.begin_step(0.1).unwrap(), Mode::Physics);
        assert_eq!(
            points.begin_step(0.1).err(),
            Some("begin_step cannot be called while a step is open")
        );
        assert_eq!(points.evaluate(2, &ff).err(), Some("point id is out of bounds"));
        points.evaluate(0, &ff).unwrap();
        assert_eq!(
            points.accept_step().err(),
            Some("all points must be evaluated before accept_step")
        );
        points.accept_point(0).unwrap();
        assert_eq!(
            points.accept_point(0).err(),
            Some("the point has already been accepted in this step")
        );
        assert_eq!(
            points.reject_step().err(),
            Some("cannot reject a step after a point has been accepted")
        );
        points.evaluate(1, &ff).unwrap();
        points.accept_step().unwrap();
        assert_eq!(points.timestep(), 1);
        assert_eq!(points.n_physics_calls(), 2);
    }

    #[test]
    fn reject_step_keeps_committed_states() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        config.set_n_points(3).unwrap().set_parallel(false);
        let mut points = MaterialPoints::new(&param, &config, None).unwrap();
        points.begin_step(0.1).unwrap();
        let ffs = vec![shear(1e-4), shear(2e-4), shear(3e-4)];
        assert_eq!(points.evaluate_all(&ffs).unwrap(), true);
        let sigma = points.response(2).unwrap().stress.get(0, 1);
        assert!(sigma > 0.0);
        points.reject_step().unwrap();
        for id in 0..3 {
            let state = points.committed(id).unwrap();
            assert_eq!(state.stress.get(0, 1), 0.0);
            assert_eq!(state.ff_total.get(0, 1), 0.0);
        }
        assert_eq!(points.timestep(), 0);
        assert_eq!(
            points.response(0).err(),
            Some("the point has not been evaluated in this step")
        );
    }

    #[test]
    fn parallel_and_serial_evaluations_match() {
        let param = ParamMaterial::sample_epoxy();
        let ffs = vec![shear(1e-3), shear(8e-3), shear(5e-3), shear(1e-2)];
        let mut results = Vec::new();
        for parallel in [true, false] {
            let mut config = Config::new();
            config.set_n_points(4).unwrap().set_parallel(parallel);
            let mut points = MaterialPoints::new(&param, &config, None).unwrap();
            points.begin_step(0.1).unwrap();
            assert_eq!(points.evaluate_all(&ffs).unwrap(), true);
            points.accept_step().unwrap();
            let stresses: Vec<f64> = (0..4).map(|id| points.committed(id).unwrap().stress.get(0, 1)).collect();
            results.push(stresses);
        }
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn switch_at_zero_skips_physics() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        config.set_n_points(2).unwrap().set_ml_switch(0, "unused.json");
        let weights = LstmWeights::sample(8);
        let mut points = MaterialPoints::new(&param, &config, Some(&weights)).unwrap();
        for k in 0..3 {
            assert_eq!(points.begin_step(0.1).unwrap(), Mode::Ml);
            let ffs = vec![shear(1e-4 * (k + 1) as f64), shear(2e-4 * (k + 1) as f64)];
            assert_eq!(points.evaluate_all(&ffs).unwrap(), true);
            assert_eq!(points.response(0).unwrap().mode, Mode::Ml);
            points.accept_step().unwrap();
        }
        assert_eq!(points.n_physics_calls(), 0);
        assert_eq!(points.n_surrogate_calls(), 6);
        assert_eq!(points.switched_at(), Some(0));
        assert!(points.committed(1).unwrap().has_memory());
    }

    #[test]
    fn failed_hand_off_keeps_physics_mode() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        config
            .set_n_points(3)
            .unwrap()
            .set_ml_switch(1, "unused.json")
            .set_hand_off(HandOff::WarmStart);
        let weights = LstmWeights::sample(4);
        let mut points = MaterialPoints::new(&param, &config, Some(&weights)).unwrap();
        points.begin_step(0.1).unwrap();
        let ffs = vec![shear(1e-4), shear(2e-4), shear(3e-4)];
        points.evaluate_all(&ffs).unwrap();
        points.accept_step().unwrap();

        // corrupt the recorded history of the last point only
        if let Some(state) = points.store.iter_mut().last() {
            state.strain_history.push_back(Vector::new(3));
        }
        assert_eq!(
            points.begin_step(0.1).err(),
            Some("the recorded strains must have 6 Mandel components")
        );
        assert_eq!(points.mode(), Mode::Physics);
        assert_eq!(points.switched_at(), None);
        for id in 0..3 {
            assert_eq!(points.committed(id).unwrap().has_memory(), false);
        }

        // repair and switch
        if let Some(state) = points.store.iter_mut().last() {
            state.strain_history.pop_back();
        }
        assert_eq!(points.begin_step(0.1).unwrap(), Mode::Ml);
        assert_eq!(points.switched_at(), Some(1));
        for id in 0..3 {
            assert!(points.committed(id).unwrap().has_memory());
        }
    }
}
