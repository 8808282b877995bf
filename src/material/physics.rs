use super::{
    equivalent_strain, isochoric_flow_map, isochoric_flow_map_deriv, mat3_mul, sym_tensor, tensor_general, transpose3,
    unit_direction, ConstitutiveResult, ConstitutiveTrait, DamageLaw, LocalDiagnostics, MaterialState, Mode,
    NeoHookean, PlasticActivity, TrialState, ViscoplasticFlow, ViscousActivity, ViscousFlow,
};
use crate::base::{amplification, ParamLocalSolver, ParamMaterial, N_MANDEL};
use crate::StrError;
use russell_lab::{mat_add, mat_inverse, solve_lin_sys, Matrix, Vector};
use russell_tensor::{t2_add, t2_ddot_t2, Mandel, Tensor2, Tensor4, SQRT_2_BY_3};
use std::f64::consts::SQRT_2;

/// Directions with norms below this value are taken as zero
const TINY_NORM: f64 = 1e-14;

/// Holds the elastic predictor (flow increments equal to zero)
#[derive(Clone, Debug)]
struct Predictor {
    /// Trial FA = F · Fvp_old
    ff_a: Matrix,

    /// Trial Fe = FA · Fv_old
    ff_e: Matrix,

    /// Viscoplastic direction Np = ξ/‖ξ‖ with ξ = dev(σA + σB) − β
    n_p: Tensor2,

    /// Viscous direction NB = dev(σB)/‖dev(σB)‖
    n_b: Tensor2,

    norm_xi: f64,
    norm_sb: f64,
}

/// Holds the deformation gradients after applying the flow maps
#[derive(Clone, Debug)]
struct Flowed {
    ff_vp: Matrix,
    ff_v: Matrix,
    ff_a: Matrix,
    ff_e: Matrix,
}

/// Holds the converged data needed by the analytic tangent
#[derive(Clone, Debug)]
pub struct Linearization {
    viscous: ViscousActivity,
    plastic: PlasticActivity,
    jacobian: [[f64; 2]; 2],
    predictor: Predictor,
    flowed: Flowed,
    rate_deriv: f64,
    dgp_rate_deps: f64,
    n_eq: Tensor2,
    dgamma_v: f64,
    dgamma_p: f64,
    sigma_eff: Tensor2,
    damage: f64,
    damage_slope: f64,
}

/// Holds the frozen trial quantities of the local system in (Δγv, Δγp)
///
/// ```text
/// τv = τB_trial − μB (Δγv + c Δγp)
/// τp = τp_trial − μB c Δγv − (μA + μB + H) Δγp
/// ```
struct LocalSystem {
    tau_b_trial: f64,
    tau_p_trial: f64,
    c: f64,
    mu_b: f64,
    mu_abh: f64,
    sigma0: f64,
    dt: f64,
    dgp_rate: f64,
}

/// Holds the tags and derivatives of one evaluation of the local residual
struct LocalEval {
    viscous: ViscousActivity,
    plastic: PlasticActivity,
    rate_deriv: f64,
    jacobian: [[f64; 2]; 2],
}

/// Implements the physics branch: implicit viscous/viscoplastic flow with damage
///
/// The model combines an equilibrium network A (compressible neo-Hookean) in parallel with a viscous
/// network B (deviatoric neo-Hookean), both in series with the viscoplastic flow:
///
/// ```text
/// F = Fe · Fv⁻¹ · Fvp⁻¹      FA = F · Fvp      Fe = FA · Fv
/// σ = (1 − d) (σA(FA) + σB(Fe))
/// ```
///
/// The flow increments are obtained by a Newton iteration on the backward-Euler residuals, linearised
/// in the trial stresses, with the activation handled by explicit tags ([ViscousActivity],
/// [PlasticActivity]). The tangent is the exact linearisation of this update.
pub struct PhysicsEvaluator {
    amplification: f64,
    network_a: NeoHookean,
    network_b: NeoHookean,
    viscous: ViscousFlow,
    viscoplastic: ViscoplasticFlow,
    damage: DamageLaw,
    local: ParamLocalSolver,
}

impl LocalSystem {
    /// Returns the viscous increment that brings τv to zero
    fn viscous_cap(&self, dgp: f64) -> f64 {
        if self.mu_b > 0.0 {
            f64::max(0.0, (self.tau_b_trial - self.mu_b * self.c * dgp) / self.mu_b)
        } else {
            0.0
        }
    }

    /// Evaluates the residual vector and the Jacobian at x = (Δγv, Δγp)
    fn residual(&self, rr: &mut Vector, x: &[f64; 2], flow: &ViscousFlow) -> LocalEval {
        let (dgv, dgp) = (x[0], x[1]);

        // viscous flow
        let cap_v = self.viscous_cap(dgp);
        let (rate_zero, _) = flow.rate(0.0);
        let (viscous, r0, j00, j01, rate_deriv) = if self.tau_b_trial <= 0.0 || self.dt * rate_zero >= cap_v {
            let j01 = if cap_v > 0.0 { self.c } else { 0.0 };
            (ViscousActivity::Relaxed, dgv - cap_v, 1.0, j01, 0.0)
        } else {
            let tau_v = self.tau_b_trial - self.mu_b * (dgv + self.c * dgp);
            let (rate, deriv) = flow.rate(tau_v);
            let j00 = 1.0 + self.dt * deriv * self.mu_b;
            let j01 = self.dt * deriv * self.mu_b * self.c;
            (ViscousActivity::Flowing, dgv - self.dt * rate, j00, j01, deriv)
        };

        // viscoplastic flow (active set)
        let tau_p_elastic = self.tau_p_trial - self.mu_b * self.c * dgv;
        let (plastic, r1, j10) = if tau_p_elastic <= self.sigma0 {
            (PlasticActivity::Elastic, dgp, 0.0)
        } else {
            let cap_p = (tau_p_elastic - self.sigma0) / self.mu_abh;
            if self.dgp_rate <= cap_p {
                (PlasticActivity::Plastic { capped: false }, dgp - self.dgp_rate, 0.0)
            } else {
                let j10 = self.mu_b * self.c / self.mu_abh;
                (PlasticActivity::Plastic { capped: true }, dgp - cap_p, j10)
            }
        };

        rr[0] = r0;
        rr[1] = r1;
        LocalEval {
            viscous,
            plastic,
            rate_deriv,
            jacobian: [[j00, j01], [j10, 1.0]],
        }
    }
}

/// Returns the derivatives of a unit direction n = a/‖a‖ and of the norm ‖a‖ along δa
fn direction_deriv(n: &Tensor2, norm: f64, da: &Tensor2) -> (Tensor2, f64) {
    let dnorm = t2_ddot_t2(n, da);
    let mut dn = Tensor2::new(Mandel::Symmetric);
    if norm > TINY_NORM {
        t2_add(&mut dn, 1.0 / norm, da, -dnorm / norm, n);
    }
    (dn, dnorm)
}

impl PhysicsEvaluator {
    /// Allocates a new instance
    pub fn new(param: &ParamMaterial) -> Result<Self, StrError> {
        param.validate()?;
        let x = amplification(&param.environment);
        Ok(PhysicsEvaluator {
            amplification: x,
            network_a: NeoHookean::new(x * param.mu1, param.nu1),
            network_b: NeoHookean::deviatoric(x * param.mu2),
            viscous: ViscousFlow::new(&param.viscous, param.environment.temperature),
            viscoplastic: ViscoplasticFlow::new(&param.viscoplastic),
            damage: DamageLaw::new(&param.damage),
            local: param.local_solver(),
        })
    }

    /// Returns the environmental amplification factor X used to scale the moduli
    pub fn amplification(&self) -> f64 {
        self.amplification
    }

    /// Returns the amplified shear moduli (μA, μB)
    pub fn moduli(&self) -> (f64, f64) {
        (self.network_a.mu, self.network_b.mu)
    }

    /// Calculates the effective (undamaged) stresses of both networks
    fn network_stresses(&self, ff_a: &Matrix, ff_e: &Matrix) -> Result<(Tensor2, Tensor2), StrError> {
        let mut sig_a = Tensor2::new(Mandel::Symmetric);
        let mut sig_b = Tensor2::new(Mandel::Symmetric);
        self.network_a.cauchy(&mut sig_a, ff_a)?;
        self.network_b.cauchy(&mut sig_b, ff_e)?;
        Ok((sig_a, sig_b))
    }

    /// Calculates the scaled sum of the network stress derivatives s (δσA(FA; δFA) + δσB(Fe; δFe))
    fn network_deriv(
        &self,
        dsigma: &mut Tensor2,
        ff_a: &Matrix,
        ff_e: &Matrix,
        dff_a: &Matrix,
        dff_e: &Matrix,
        scale: f64,
    ) -> Result<(), StrError> {
        let mut dsig_a = Tensor2::new(Mandel::Symmetric);
        let mut dsig_b = Tensor2::new(Mandel::Symmetric);
        self.network_a.cauchy_deriv(&mut dsig_a, ff_a, dff_a)?;
        self.network_b.cauchy_deriv(&mut dsig_b, ff_e, dff_e)?;
        t2_add(dsigma, scale, &dsig_a, scale, &dsig_b);
        Ok(())
    }

    /// Computes the elastic predictor
    fn predictor(&self, ff: &Matrix, prev: &MaterialState) -> Result<Predictor, StrError> {
        let ff_a = mat3_mul(ff, &prev.ff_vp.as_matrix())?;
        let ff_e = mat3_mul(&ff_a, &prev.ff_v.as_matrix())?;
        let (sig_a, sig_b) = self.network_stresses(&ff_a, &ff_e)?;
        let mut sum = Tensor2::new(Mandel::Symmetric);
        let mut s = Tensor2::new(Mandel::Symmetric);
        let mut s_b = Tensor2::new(Mandel::Symmetric);
        let mut xi = Tensor2::new(Mandel::Symmetric);
        t2_add(&mut sum, 1.0, &sig_a, 1.0, &sig_b);
        sum.deviator(&mut s);
        sig_b.deviator(&mut s_b);
        t2_add(&mut xi, 1.0, &s, -1.0, &prev.backstress);
        let (n_p, norm_xi) = unit_direction(&xi, TINY_NORM);
        let (n_b, norm_sb) = unit_direction(&s_b, TINY_NORM);
        Ok(Predictor {
            ff_a,
            ff_e,
            n_p,
            n_b,
            norm_xi,
            norm_sb,
        })
    }

    /// Applies the flow maps Fvp = Fvp_old · Mp and Fv = Fv_old · Mb
    fn flow(&self, ff: &Matrix, prev: &MaterialState, pred: &Predictor, dgv: f64, dgp: f64) -> Result<Flowed, StrError> {
        let ff_vp_old = prev.ff_vp.as_matrix();
        let ff_v_old = prev.ff_v.as_matrix();
        let ff_vp = if dgp > 0.0 {
            mat3_mul(&ff_vp_old, &isochoric_flow_map(&pred.n_p, dgp / SQRT_2)?)?
        } else {
            ff_vp_old
        };
        let ff_v = if dgv > 0.0 {
            mat3_mul(&ff_v_old, &isochoric_flow_map(&pred.n_b, dgv / SQRT_2)?)?
        } else {
            ff_v_old
        };
        let ff_a = mat3_mul(ff, &ff_vp)?;
        let ff_e = mat3_mul(&ff_a, &ff_v)?;
        Ok(Flowed { ff_vp, ff_v, ff_a, ff_e })
    }

    /// Returns the diagnostics of a numerical domain error
    fn domain_error(&self, iterations: usize) -> LocalDiagnostics {
        LocalDiagnostics {
            converged: false,
            iterations,
            residual: f64::MAX,
            viscous: ViscousActivity::Relaxed,
            plastic: PlasticActivity::Elastic,
            dgamma_v: 0.0,
            dgamma_p: 0.0,
            amplification: self.amplification,
        }
    }
}

impl ConstitutiveTrait for PhysicsEvaluator {
    fn mode(&self) -> Mode {
        Mode::Physics
    }

    fn update(&self, trial: &TrialState) -> Result<ConstitutiveResult, StrError> {
        let prev = trial.previous;
        let ff = trial.ff.as_matrix();

        // trial (elastic predictor)
        let pred = match self.predictor(&ff, prev) {
            Ok(v) => v,
            Err(_) => return Ok(ConstitutiveResult::not_converged(prev, self.domain_error(0))),
        };
        let (mu_a, mu_b) = self.moduli();

        // equivalent strain driving the viscoplastic flow
        let (eps_eq, n_eq) = equivalent_strain(&ff)?;
        let (eps_eq_old, _) = equivalent_strain(&prev.ff_total.as_matrix())?;
        let (dgp_rate, dgp_rate_deps) = self.viscoplastic.increment(eps_eq, eps_eq_old);

        let system = LocalSystem {
            tau_b_trial: pred.norm_sb / SQRT_2,
            tau_p_trial: pred.norm_xi / SQRT_2,
            c: t2_ddot_t2(&pred.n_p, &pred.n_b),
            mu_b,
            mu_abh: mu_a + mu_b + self.viscoplastic.hh,
            sigma0: self.viscoplastic.sigma0,
            dt: trial.dt,
            dgp_rate,
        };

        // local Newton iterations
        let mut x = [0.0, 0.0];
        let mut rr = Vector::new(2);
        let mut jj = Matrix::new(2, 2);
        let mut converged = false;
        let mut residual = f64::MAX;
        let mut iterations = 0;
        let mut eval = system.residual(&mut rr, &x, &self.viscous);
        for it in 0..(self.local.n_max_iterations + 1) {
            iterations = it;
            if it > 0 {
                eval = system.residual(&mut rr, &x, &self.viscous);
            }
            let finite = rr[0].is_finite()
                && rr[1].is_finite()
                && eval.jacobian.iter().all(|row| row.iter().all(|v| v.is_finite()));
            if !finite {
                return Ok(ConstitutiveResult::not_converged(prev, self.domain_error(it)));
            }
            residual = f64::max(f64::abs(rr[0]), f64::abs(rr[1]));
            if residual <= self.local.tolerance {
                converged = true;
                break;
            }
            if it == self.local.n_max_iterations {
                break;
            }
            for i in 0..2 {
                for j in 0..2 {
                    jj.set(i, j, eval.jacobian[i][j]);
                }
            }
            if solve_lin_sys(&mut rr, &mut jj).is_err() {
                return Ok(ConstitutiveResult::not_converged(prev, self.domain_error(it)));
            }
            x[1] = f64::max(0.0, x[1] - rr[1]);
            x[0] = f64::min(f64::max(0.0, x[0] - rr[0]), system.viscous_cap(x[1]));
        }

        let mut diagnostics = LocalDiagnostics {
            converged,
            iterations,
            residual,
            viscous: eval.viscous,
            plastic: eval.plastic,
            dgamma_v: x[0],
            dgamma_p: x[1],
            amplification: self.amplification,
        };
        if !converged {
            return Ok(ConstitutiveResult::not_converged(prev, diagnostics));
        }
        if eval.plastic == PlasticActivity::Elastic {
            x[1] = 0.0;
            diagnostics.dgamma_p = 0.0;
        }
        let (dgv, dgp) = (x[0], x[1]);

        // flow maps and final stresses
        let flowed = match self.flow(&ff, prev, &pred, dgv, dgp) {
            Ok(v) => v,
            Err(_) => return Ok(ConstitutiveResult::not_converged(prev, self.domain_error(iterations))),
        };
        let (sig_a, sig_b) = match self.network_stresses(&flowed.ff_a, &flowed.ff_e) {
            Ok(v) => v,
            Err(_) => return Ok(ConstitutiveResult::not_converged(prev, self.domain_error(iterations))),
        };

        // hardening and damage
        let mut backstress = Tensor2::new(Mandel::Symmetric);
        t2_add(&mut backstress, 1.0, &prev.backstress, SQRT_2 * self.viscoplastic.hh * dgp, &pred.n_p);
        let eps_p = prev.eps_p + dgp / f64::sqrt(3.0);
        let (damage, damage_slope) = self.damage.damage(prev.damage, eps_p);
        let mut sigma_eff = Tensor2::new(Mandel::Symmetric);
        let mut stress = Tensor2::new(Mandel::Symmetric);
        t2_add(&mut sigma_eff, 1.0, &sig_a, 1.0, &sig_b);
        stress.set_tensor(1.0 - damage, &sigma_eff);

        let candidate = MaterialState {
            ff_total: trial.ff.clone(),
            ff_e: tensor_general(&flowed.ff_e)?,
            ff_v: tensor_general(&flowed.ff_v)?,
            ff_vp: tensor_general(&flowed.ff_vp)?,
            damage,
            backstress,
            eps_p,
            stress: stress.clone(),
            strain_history: prev.strain_history.clone(),
            memory: prev.memory.clone(),
        };

        Ok(ConstitutiveResult {
            stress,
            candidate,
            diagnostics,
            linearization: Some(Linearization {
                viscous: eval.viscous,
                plastic: eval.plastic,
                jacobian: eval.jacobian,
                predictor: pred,
                flowed,
                rate_deriv: eval.rate_deriv,
                dgp_rate_deps,
                n_eq,
                dgamma_v: dgv,
                dgamma_p: dgp,
                sigma_eff,
                damage,
                damage_slope,
            }),
        })
    }

    /// Computes the exact linearisation of the update
    ///
    /// For each Mandel strain direction δε (with δF = δε):
    ///
    /// ```text
    /// δσ = ∂σ/∂F|Δγ : δF + ∂σ/∂Δγv δΔγv + ∂σ/∂Δγp δΔγp
    /// δΔγ = −J⁻¹ ∂r/∂F : δF
    /// ```
    ///
    /// where J is the converged Jacobian of the local residuals r with the tags frozen.
    fn tangent(&self, dd: &mut Tensor4, trial: &TrialState, result: &ConstitutiveResult) -> Result<(), StrError> {
        let lin = result
            .linearization
            .as_ref()
            .ok_or("the analytic tangent requires a converged physics update")?;
        let pred = &lin.predictor;
        let flowed = &lin.flowed;
        let ff = trial.ff.as_matrix();
        let fft = transpose3(&ff);
        let ff_vp_old = trial.previous.ff_vp.as_matrix();
        let ff_v_old = trial.previous.ff_v.as_matrix();
        let (mu_a, mu_b) = self.moduli();
        let mu_abh = mu_a + mu_b + self.viscoplastic.hh;
        let scale = 1.0 - lin.damage;
        let (a_v, a_p) = (lin.dgamma_v / SQRT_2, lin.dgamma_p / SQRT_2);
        let zero = Tensor2::new(Mandel::Symmetric);
        let zero_matrix = Matrix::new(3, 3);

        // ∂σ/∂Δγv
        let dmm_b = isochoric_flow_map_deriv(&pred.n_b, a_v, &zero, 1.0 / SQRT_2)?;
        let dff_e = mat3_mul(&mat3_mul(&flowed.ff_a, &ff_v_old)?, &dmm_b)?;
        let mut ds_dgv = Tensor2::new(Mandel::Symmetric);
        self.network_deriv(&mut ds_dgv, &flowed.ff_a, &flowed.ff_e, &zero_matrix, &dff_e, scale)?;

        // ∂σ/∂Δγp (including damage)
        let dmm_p = isochoric_flow_map_deriv(&pred.n_p, a_p, &zero, 1.0 / SQRT_2)?;
        let dff_a = mat3_mul(&pred.ff_a, &dmm_p)?;
        let dff_e = mat3_mul(&dff_a, &flowed.ff_v)?;
        let mut ds_flow = Tensor2::new(Mandel::Symmetric);
        self.network_deriv(&mut ds_flow, &flowed.ff_a, &flowed.ff_e, &dff_a, &dff_e, scale)?;
        let mut ds_dgp = Tensor2::new(Mandel::Symmetric);
        t2_add(&mut ds_dgp, 1.0, &ds_flow, -lin.damage_slope / f64::sqrt(3.0), &lin.sigma_eff);

        // J⁻¹
        let jac = Matrix::from(&lin.jacobian);
        let mut ji = Matrix::new(2, 2);
        mat_inverse(&mut ji, &jac)?;

        let mut de = Tensor2::new(Mandel::Symmetric);
        let mut dsig_a = Tensor2::new(Mandel::Symmetric);
        let mut dsig_b = Tensor2::new(Mandel::Symmetric);
        let mut dsum = Tensor2::new(Mandel::Symmetric);
        let mut dxi = Tensor2::new(Mandel::Symmetric);
        let mut ds_b = Tensor2::new(Mandel::Symmetric);
        let mut dsigma = Tensor2::new(Mandel::Symmetric);
        let mat = dd.matrix_mut();
        for k in 0..N_MANDEL {
            de.vector_mut().fill(0.0);
            de.vector_mut()[k] = 1.0;
            let dff = de.as_matrix();

            // predictor
            let dff_a_trial = mat3_mul(&dff, &ff_vp_old)?;
            let dff_e_trial = mat3_mul(&dff_a_trial, &ff_v_old)?;
            self.network_a.cauchy_deriv(&mut dsig_a, &pred.ff_a, &dff_a_trial)?;
            self.network_b.cauchy_deriv(&mut dsig_b, &pred.ff_e, &dff_e_trial)?;
            t2_add(&mut dsum, 1.0, &dsig_a, 1.0, &dsig_b);
            dsum.deviator(&mut dxi);
            dsig_b.deviator(&mut ds_b);
            let (dn_p, dnorm_xi) = direction_deriv(&pred.n_p, pred.norm_xi, &dxi);
            let (dn_b, dnorm_sb) = direction_deriv(&pred.n_b, pred.norm_sb, &ds_b);
            let dc = t2_ddot_t2(&dn_p, &pred.n_b) + t2_ddot_t2(&pred.n_p, &dn_b);
            let dtau_b = dnorm_sb / SQRT_2;
            let dtau_p = dnorm_xi / SQRT_2;
            let deps_eq = SQRT_2_BY_3 * t2_ddot_t2(&lin.n_eq, &sym_tensor(&mat3_mul(&fft, &dff)?));

            // ∂r/∂ε and δΔγ = −J⁻¹ ∂r/∂ε
            let dr0 = match lin.viscous {
                ViscousActivity::Flowing => {
                    -trial.dt * lin.rate_deriv * (dtau_b - mu_b * lin.dgamma_p * dc)
                }
                ViscousActivity::Relaxed if lin.dgamma_v > 0.0 => -(dtau_b - mu_b * lin.dgamma_p * dc) / mu_b,
                ViscousActivity::Relaxed => 0.0,
            };
            let dr1 = match lin.plastic {
                PlasticActivity::Elastic => 0.0,
                PlasticActivity::Plastic { capped: false } => -lin.dgp_rate_deps * deps_eq,
                PlasticActivity::Plastic { capped: true } => -(dtau_p - mu_b * lin.dgamma_v * dc) / mu_abh,
            };
            let dgv_de = -(ji.get(0, 0) * dr0 + ji.get(0, 1) * dr1);
            let dgp_de = match lin.plastic {
                PlasticActivity::Elastic => 0.0,
                PlasticActivity::Plastic { .. } => -(ji.get(1, 0) * dr0 + ji.get(1, 1) * dr1),
            };

            // δσ at fixed increments
            let dmm_p = isochoric_flow_map_deriv(&pred.n_p, a_p, &dn_p, 0.0)?;
            let dmm_b = isochoric_flow_map_deriv(&pred.n_b, a_v, &dn_b, 0.0)?;
            let dff_vp = mat3_mul(&ff_vp_old, &dmm_p)?;
            let dff_v = mat3_mul(&ff_v_old, &dmm_b)?;
            let mut dff_a = Matrix::new(3, 3);
            let mut dff_e = Matrix::new(3, 3);
            mat_add(&mut dff_a, 1.0, &mat3_mul(&dff, &flowed.ff_vp)?, 1.0, &mat3_mul(&ff, &dff_vp)?)?;
            mat_add(&mut dff_e, 1.0, &mat3_mul(&dff_a, &flowed.ff_v)?, 1.0, &mat3_mul(&flowed.ff_a, &dff_v)?)?;
            self.network_deriv(&mut dsigma, &flowed.ff_a, &flowed.ff_e, &dff_a, &dff_e, scale)?;

            for i in 0..N_MANDEL {
                let value = dsigma.vector()[i] + ds_dgv.vector()[i] * dgv_de + ds_dgp.vector()[i] * dgp_de;
                mat.set(i, k, value);
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::PhysicsEvaluator;
    use crate::base::{amplification, ParamLocalSolver, ParamMaterial};
    use crate::material::{
        deformation_from_strain, numerical_tangent, ConstitutiveTrait, MaterialState, PlasticActivity, TrialState,
        ViscousActivity,
    };
    use russell_lab::{approx_eq, Vector};
    use russell_tensor::{Mandel, Tensor4};
    use std::f64::consts::SQRT_2;

    fn shear(gamma: f64) -> Vector {
        Vector::from(&[0.0, 0.0, 0.0, gamma / SQRT_2, 0.0, 0.0])
    }

    fn max_abs(dd: &Tensor4) -> f64 {
        let mut m: f64 = 0.0;
        for i in 0..6 {
            for j in 0..6 {
                m = f64::max(m, f64::abs(dd.matrix().get(i, j)));
            }
        }
        m
    }

    #[test]
    fn new_captures_errors() {
        let mut param = ParamMaterial::sample_epoxy();
        param.mu1 = -1.0;
        assert_eq!(PhysicsEvaluator::new(&param).err(), Some("mu1 must be > 0.0"));
    }

    #[test]
    fn amplification_is_applied_to_the_moduli() {
        let param = ParamMaterial::sample_nanocomposite(0.05);
        let model = PhysicsEvaluator::new(&param).unwrap();
        let x = amplification(&param.environment);
        assert_eq!(model.amplification(), x);
        let (mu_a, mu_b) = model.moduli();
        approx_eq(mu_a, x * 760.0, 1e-12);
        approx_eq(mu_b, x * 790.0, 1e-12);
    }

    #[test]
    fn quasi_static_shear_relaxes_network_b() {
        let param = ParamMaterial::sample_epoxy();
        let model = PhysicsEvaluator::new(&param).unwrap();
        let prev = MaterialState::new();
        let gamma = 1e-4;
        let ff = deformation_from_strain(&shear(gamma)).unwrap();
        let trial = TrialState {
            ff: &ff,
            previous: &prev,
            dt: 1e6,
        };
        let res = model.update(&trial).unwrap();
        assert_eq!(res.diagnostics.converged, true);
        assert_eq!(res.diagnostics.viscous, ViscousActivity::Relaxed);
        assert_eq!(res.diagnostics.plastic, PlasticActivity::Elastic);
        approx_eq(res.stress.get(0, 1), 760.0 * gamma, 1e-3 * 760.0 * gamma);
        assert_eq!(res.candidate.damage, 0.0);
        assert_eq!(res.candidate.distance_vp_from_identity(), 0.0);
    }

    #[test]
    fn fast_shear_loads_both_networks() {
        let param = ParamMaterial::sample_epoxy();
        let model = PhysicsEvaluator::new(&param).unwrap();
        let prev = MaterialState::new();
        let gamma = 1e-4;
        let ff = deformation_from_strain(&shear(gamma)).unwrap();
        let trial = TrialState {
            ff: &ff,
            previous: &prev,
            dt: 1e-3,
        };
        let res = model.update(&trial).unwrap();
        assert_eq!(res.diagnostics.viscous, ViscousActivity::Flowing);
        approx_eq(res.stress.get(0, 1), (760.0 + 790.0) * gamma, 1e-3 * 1550.0 * gamma);
    }

    #[test]
    fn plastic_flow_preserves_the_decomposition() {
        let param = ParamMaterial::sample_epoxy();
        let model = PhysicsEvaluator::new(&param).unwrap();
        let prev = MaterialState::new();
        let ff = deformation_from_strain(&shear(0.01)).unwrap();
        let trial = TrialState {
            ff: &ff,
            previous: &prev,
            dt: 0.1,
        };
        let res = model.update(&trial).unwrap();
        assert_eq!(res.diagnostics.converged, true);
        assert_eq!(res.diagnostics.plastic, PlasticActivity::Plastic { capped: false });
        assert!(res.diagnostics.dgamma_p > 0.0);
        assert!(res.candidate.damage > 0.0 && res.candidate.damage < 1.0);
        assert!(res.candidate.distance_vp_from_identity() > 0.0);
        assert!(res.candidate.decomposition_error().unwrap() < 1e-12);
    }

    #[test]
    fn max_iterations_gives_local_non_convergence() {
        let mut param = ParamMaterial::sample_epoxy();
        param.local_solver = Some(ParamLocalSolver {
            n_max_iterations: 1,
            tolerance: 1e-14,
        });
        let model = PhysicsEvaluator::new(&param).unwrap();
        let prev = MaterialState::new();
        let ff = deformation_from_strain(&shear(0.05)).unwrap();
        let trial = TrialState {
            ff: &ff,
            previous: &prev,
            dt: 0.1,
        };
        let res = model.update(&trial).unwrap();
        assert_eq!(res.diagnostics.converged, false);
        assert_eq!(res.diagnostics.iterations, 1);
        assert!(res.diagnostics.residual > 1e-14);
        assert_eq!(res.candidate.damage, prev.damage);
        assert_eq!(res.linearization.is_none(), true);
    }

    #[test]
    fn inverted_deformation_is_a_domain_error() {
        let model = PhysicsEvaluator::new(&ParamMaterial::sample_epoxy()).unwrap();
        let prev = MaterialState::new();
        let ff = deformation_from_strain(&Vector::from(&[-2.0, 0.0, 0.0, 0.0, 0.0, 0.0])).unwrap();
        let trial = TrialState {
            ff: &ff,
            previous: &prev,
            dt: 0.1,
        };
        let res = model.update(&trial).unwrap();
        assert_eq!(res.diagnostics.converged, false);
        assert_eq!(res.diagnostics.residual, f64::MAX);
    }

    fn check_tangent(eps: &Vector, dt: f64, tol_rel: f64) {
        let model = PhysicsEvaluator::new(&ParamMaterial::sample_epoxy()).unwrap();
        let prev = MaterialState::new();
        let ff = deformation_from_strain(eps).unwrap();
        let trial = TrialState {
            ff: &ff,
            previous: &prev,
            dt,
        };
        let res = model.update(&trial).unwrap();
        let mut dd_ana = Tensor4::new(Mandel::Symmetric);
        let mut dd_num = Tensor4::new(Mandel::Symmetric);
        model.tangent(&mut dd_ana, &trial, &res).unwrap();
        numerical_tangent(&model, &mut dd_num, &trial, 1e-6).unwrap();
        let tol = tol_rel * max_abs(&dd_num);
        for i in 0..6 {
            for j in 0..6 {
                approx_eq(dd_ana.matrix().get(i, j), dd_num.matrix().get(i, j), tol);
            }
        }
    }

    #[test]
    fn analytic_tangent_matches_numerical_elastic() {
        check_tangent(&Vector::from(&[1e-5, -3e-6, 0.0, 2e-5, 0.0, 0.0]), 1e-3, 1e-5);
    }

    #[test]
    fn analytic_tangent_matches_numerical_relaxed() {
        check_tangent(&shear(1e-4), 1e6, 1e-5);
    }

    #[test]
    fn analytic_tangent_matches_numerical_inelastic() {
        check_tangent(&shear(0.01), 0.1, 1e-5);
    }
}
