//! Implements the base structures: parameters, configuration, and loading paths

mod config;
mod constants;
mod environment;
mod loading;
mod parameters;
pub use crate::base::config::*;
pub use crate::base::constants::*;
pub use crate::base::environment::*;
pub use crate::base::loading::*;
pub use crate::base::parameters::*;
