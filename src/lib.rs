//! Viscoelastic-viscoplastic-damage material point solver for epoxy nanocomposites
//!
//! The crate implements the per-point constitutive update (physics branch with an implicit
//! local solve, or a recurrent surrogate), the consistent tangent, the physics→ML mode switch,
//! and the adapter consumed by a global Newton-Raphson driver.

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod fem;
pub mod material;
pub mod prelude;
