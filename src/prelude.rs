//! Makes available common structures needed to run a simulation
//!
//! You may write `use vevpd::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{
    amplification, Component, Config, Control, HandOff, Loading, LoadingType, ParamLocalSolver, ParamMaterial,
    ParamSurrogate, DEFAULT_OUT_DIR, DEFAULT_TEST_DIR,
};
pub use crate::fem::{FileIo, MaterialPoints, PointOutput, PointResponse, SolverMaterialPoint, StepOutput};
pub use crate::material::{
    ConstitutiveTrait, LocalDiagnostics, LstmWeights, MaterialState, Mode, ModeSwitch, PhysicsEvaluator,
    PlasticActivity, StateStore, SurrogateEvaluator, TrialState, ViscousActivity,
};
pub use crate::StrError;
