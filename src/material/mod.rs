//! Implements the constitutive models: physics branch, recurrent surrogate, and their state

mod constitutive;
mod flow_rules;
mod kinematics;
mod lstm;
mod material_state;
mod mode_switch;
mod network;
mod physics;
mod state_store;
mod surrogate;
pub use crate::material::constitutive::*;
pub use crate::material::flow_rules::*;
pub use crate::material::kinematics::*;
pub use crate::material::lstm::*;
pub use crate::material::material_state::*;
pub use crate::material::mode_switch::*;
pub use crate::material::network::*;
pub use crate::material::physics::*;
pub use crate::material::state_store::*;
pub use crate::material::surrogate::*;
