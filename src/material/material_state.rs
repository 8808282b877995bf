use super::{identity3, mat3_mul, small_strain, RecurrentMemory};
use crate::StrError;
use russell_lab::{mat_inverse, Matrix, Vector};
use russell_tensor::{Mandel, Tensor2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Holds the history variables of a single material (quadrature) point
///
/// The multiplicative decomposition reads:
///
/// ```text
/// F = Fe · Fv⁻¹ · Fvp⁻¹
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialState {
    /// Total deformation gradient F
    pub ff_total: Tensor2,

    /// Elastic deformation gradient Fe (seen by the viscous network)
    pub ff_e: Tensor2,

    /// Viscous deformation gradient Fv
    pub ff_v: Tensor2,

    /// Viscoplastic deformation gradient Fvp
    pub ff_vp: Tensor2,

    /// Damage d ∈ [0, 1)
    pub damage: f64,

    /// Backstress β (symmetric)
    pub backstress: Tensor2,

    /// Accumulated viscoplastic strain εp
    pub eps_p: f64,

    /// Cauchy stress σ (damaged)
    pub stress: Tensor2,

    /// Recent small strains (Mandel), oldest first
    pub strain_history: VecDeque<Vector>,

    /// Recurrent memory used by the surrogate (None while the physics branch is active)
    pub memory: Option<RecurrentMemory>,
}

impl MaterialState {
    /// Allocates a new (undeformed, virgin) instance
    pub fn new() -> Self {
        let mut ff = Tensor2::new(Mandel::General);
        for i in 0..3 {
            ff.vector_mut()[i] = 1.0;
        }
        MaterialState {
            ff_total: ff.clone(),
            ff_e: ff.clone(),
            ff_v: ff.clone(),
            ff_vp: ff,
            damage: 0.0,
            backstress: Tensor2::new(Mandel::Symmetric),
            eps_p: 0.0,
            stress: Tensor2::new(Mandel::Symmetric),
            strain_history: VecDeque::new(),
            memory: None,
        }
    }

    /// Records the current small strain keeping at most `capacity` entries
    pub fn push_strain(&mut self, capacity: usize) {
        if capacity == 0 {
            return;
        }
        let eps = small_strain(&self.ff_total);
        self.strain_history.push_back(eps.vector().clone());
        while self.strain_history.len() > capacity {
            self.strain_history.pop_front();
        }
    }

    /// Calculates the error of the multiplicative decomposition
    ///
    /// ```text
    /// error = max |F − Fe · Fv⁻¹ · Fvp⁻¹| / max(1, max |F|)
    /// ```
    pub fn decomposition_error(&self) -> Result<f64, StrError> {
        let mut ff_v_inv = Matrix::new(3, 3);
        let mut ff_vp_inv = Matrix::new(3, 3);
        mat_inverse(&mut ff_v_inv, &self.ff_v.as_matrix())?;
        mat_inverse(&mut ff_vp_inv, &self.ff_vp.as_matrix())?;
        let product = mat3_mul(&mat3_mul(&self.ff_e.as_matrix(), &ff_v_inv)?, &ff_vp_inv)?;
        let ff = self.ff_total.as_matrix();
        let mut error: f64 = 0.0;
        let mut scale: f64 = 1.0;
        for i in 0..3 {
            for j in 0..3 {
                error = f64::max(error, f64::abs(ff.get(i, j) - product.get(i, j)));
                scale = f64::max(scale, f64::abs(ff.get(i, j)));
            }
        }
        Ok(error / scale)
    }

    /// Returns true if the surrogate memory has been initialized
    pub fn has_memory(&self) -> bool {
        self.memory.is_some()
    }

    /// Returns the max distance of the viscoplastic deformation gradient from identity
    pub fn distance_vp_from_identity(&self) -> f64 {
        let ii = identity3();
        let ff_vp = self.ff_vp.as_matrix();
        let mut dist: f64 = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                dist = f64::max(dist, f64::abs(ff_vp.get(i, j) - ii.get(i, j)));
            }
        }
        dist
    }
}

impl fmt::Display for MaterialState {
    /// Returns a nicely formatted string representing the state
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mat = self.stress.as_matrix();
        write!(f, "σ =\n")?;
        match f.precision() {
            Some(v) => write!(f, "{:.1$}", mat, v)?,
            None => write!(f, "{}", mat)?,
        }
        let mat = self.ff_vp.as_matrix();
        write!(f, "\nFvp =\n")?;
        match f.precision() {
            Some(v) => write!(f, "{:.1$}", mat, v)?,
            None => write!(f, "{}", mat)?,
        }
        write!(f, "\nd = {:?}", self.damage)?;
        write!(f, "\nεp = {:?}", self.eps_p)?;
        write!(f, "\nmemory = {}", self.memory.is_some())?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
