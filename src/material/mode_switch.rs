use super::{MaterialState, RecurrentMemory, SurrogateEvaluator};
use crate::base::{Config, HandOff};
use crate::StrError;
use serde::{Deserialize, Serialize};

/// Specifies which evaluator computes the constitutive response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Physics branch (implicit local solve, analytic tangent)
    Physics,

    /// Surrogate branch (recurrent network, finite-difference tangent)
    Ml,
}

/// Indicates what happened when selecting the mode for a timestep
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The mode did not change
    None,

    /// The mode changes from physics to ML; the hand-off must be performed before committing
    PhysicsToMl,
}

/// Controls the one-way switch from the physics branch to the surrogate
///
/// The transition happens once, deterministically, when the timestep index reaches the configured
/// switch timestep. There is no ML→physics transition.
#[derive(Clone, Debug)]
pub struct ModeSwitch {
    mode: Mode,
    ml_enabled: bool,
    switch_timestep: usize,
    hand_off: HandOff,
    switched_at: Option<usize>,
}

impl ModeSwitch {
    /// Allocates a new instance (starting in physics mode)
    pub fn new(config: &Config) -> Self {
        ModeSwitch {
            mode: Mode::Physics,
            ml_enabled: config.ml_enabled,
            switch_timestep: config.ml_switch_timestep,
            hand_off: config.surrogate.hand_off,
            switched_at: None,
        }
    }

    /// Returns the current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the timestep index at which the switch happened, if any
    pub fn switched_at(&self) -> Option<usize> {
        self.switched_at
    }

    /// Returns the transition due at the given timestep index (number of accepted steps)
    ///
    /// The mode is not changed; call [ModeSwitch::commit] after the hand-off succeeds.
    pub fn transition(&self, timestep: usize) -> Transition {
        if self.mode == Mode::Physics && self.ml_enabled && timestep >= self.switch_timestep {
            Transition::PhysicsToMl
        } else {
            Transition::None
        }
    }

    /// Performs the transition due at the given timestep index, if any
    pub fn commit(&mut self, timestep: usize) -> Transition {
        let transition = self.transition(timestep);
        if transition == Transition::PhysicsToMl {
            self.mode = Mode::Ml;
            self.switched_at = Some(timestep);
        }
        transition
    }

    /// Builds the initial recurrent memory of a single point from its last physics state
    pub fn initial_memory(
        &self,
        surrogate: &SurrogateEvaluator,
        state: &MaterialState,
    ) -> Result<RecurrentMemory, StrError> {
        match self.hand_off {
            HandOff::Reset => Ok(surrogate.zero_memory()),
            HandOff::WarmStart => surrogate.warm_start(&state.strain_history),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Mode, ModeSwitch, Transition};
    use crate::base::{Config, HandOff, ParamMaterial};
    use crate::material::{deformation_from_strain, LstmWeights, MaterialState, SurrogateEvaluator};
    use russell_lab::Vector;

    #[test]
    fn stays_in_physics_if_disabled() {
        let config = Config::new();
        let mut switch = ModeSwitch::new(&config);
        for k in 0..10 {
            assert_eq!(switch.transition(k), Transition::None);
            assert_eq!(switch.commit(k), Transition::None);
        }
        assert_eq!(switch.mode(), Mode::Physics);
        assert_eq!(switch.switched_at(), None);
    }

    #[test]
    fn switches_once() {
        let mut config = Config::new();
        config.set_ml_switch(3, "/tmp/weights.json");
        let mut switch = ModeSwitch::new(&config);
        assert_eq!(switch.commit(0), Transition::None);
        assert_eq!(switch.commit(2), Transition::None);

        // checking does not switch
        assert_eq!(switch.transition(3), Transition::PhysicsToMl);
        assert_eq!(switch.transition(3), Transition::PhysicsToMl);
        assert_eq!(switch.mode(), Mode::Physics);
        assert_eq!(switch.switched_at(), None);

        assert_eq!(switch.commit(3), Transition::PhysicsToMl);
        assert_eq!(switch.mode(), Mode::Ml);
        assert_eq!(switch.commit(3), Transition::None);
        assert_eq!(switch.commit(4), Transition::None);
        assert_eq!(switch.switched_at(), Some(3));
    }

    #[test]
    fn switch_at_zero_works() {
        let mut config = Config::new();
        config.set_ml_switch(0, "/tmp/weights.json");
        let mut switch = ModeSwitch::new(&config);
        assert_eq!(switch.commit(0), Transition::PhysicsToMl);
    }

    #[test]
    fn initial_memory_does_not_touch_the_state() {
        let mut config = Config::new();
        config.set_ml_switch(1, "/tmp/weights.json");
        let param = ParamMaterial::sample_epoxy();
        let surrogate = SurrogateEvaluator::new(&LstmWeights::sample(4), config.surrogate, &param).unwrap();

        let mut state = MaterialState::new();
        state.ff_total = deformation_from_strain(&Vector::from(&[0.001, 0.0, 0.0, 0.0, 0.0, 0.0])).unwrap();
        state.push_strain(4);
        let before = state.clone();

        let switch = ModeSwitch::new(&config);
        let memory = switch.initial_memory(&surrogate, &state).unwrap();
        assert_eq!(memory.hh[0].as_data(), &vec![0.0; 4]);

        config.set_hand_off(HandOff::WarmStart);
        let switch = ModeSwitch::new(&config);
        let memory = switch.initial_memory(&surrogate, &state).unwrap();
        assert!(memory.hh[0].as_data().iter().any(|v| *v != 0.0));

        // the state is bit-identical
        assert_eq!(state.has_memory(), false);
        for (a, b) in [
            (&state.ff_total, &before.ff_total),
            (&state.ff_e, &before.ff_e),
            (&state.ff_v, &before.ff_v),
            (&state.ff_vp, &before.ff_vp),
            (&state.backstress, &before.backstress),
            (&state.stress, &before.stress),
        ] {
            assert_eq!(a.vector().as_data(), b.vector().as_data());
        }
        assert_eq!(state.damage.to_bits(), before.damage.to_bits());
        assert_eq!(state.eps_p.to_bits(), before.eps_p.to_bits());
        assert_eq!(state.strain_history.len(), before.strain_history.len());
        assert_eq!(state.strain_history[0].as_data(), before.strain_history[0].as_data());
    }
}
