//! Implements the interface to a global (finite element) Newton-Raphson driver

mod control_convergence;
mod control_time;
mod file_io;
mod material_points;
mod output;
mod solver;
pub use crate::fem::control_convergence::*;
pub use crate::fem::control_time::*;
pub use crate::fem::file_io::*;
pub use crate::fem::material_points::*;
pub use crate::fem::output::*;
pub use crate::fem::solver::*;
