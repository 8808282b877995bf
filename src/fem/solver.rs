use super::{ControlConvergence, ControlTime, FileIo, MaterialPoints, PointOutput, StepOutput};
use crate::base::{Config, Control, ParamMaterial, N_MANDEL};
use crate::material::{deformation_from_strain, small_strain, LocalDiagnostics, LstmWeights};
use crate::StrError;
use russell_lab::{solve_lin_sys, Matrix, Vector};
use russell_tensor::Tensor2;

/// Indicates why a step attempt failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Failure {
    Local,
    Residual,
    Singular,
    Iterations,
}

impl Failure {
    fn message(&self) -> &'static str {
        match self {
            Failure::Local => "local update did not converge",
            Failure::Residual => "found NaN or Inf in the residual",
            Failure::Singular => "singular tangent",
            Failure::Iterations => "global iterations did not converge",
        }
    }
}

/// Implements a global Newton-Raphson driver over homogeneous material points
///
/// One strain component follows the loading path. The other five components are either zero
/// ([Control::StrainDriven]) or found such that the corresponding stresses vanish
/// ([Control::UniaxialStress]). Each point has its own 5×5 Newton system built from its tangent.
pub struct SolverMaterialPoint<'a> {
    /// Holds configuration parameters
    pub config: &'a Config,

    /// Holds the material points and their committed states
    pub points: MaterialPoints,

    /// Holds the results of each converged step
    pub history: Vec<StepOutput>,
}

impl<'a> SolverMaterialPoint<'a> {
    /// Allocates a new instance (reads the surrogate weights from the path in config, if needed)
    pub fn new(param: &ParamMaterial, config: &'a Config) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate simulation because config.validate() failed");
        }
        Ok(SolverMaterialPoint {
            config,
            points: MaterialPoints::from_config(param, config)?,
            history: Vec::new(),
        })
    }

    /// Allocates a new instance with given surrogate weights
    pub fn new_with_weights(
        param: &ParamMaterial,
        config: &'a Config,
        weights: Option<&LstmWeights>,
    ) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate simulation because config.validate() failed");
        }
        Ok(SolverMaterialPoint {
            config,
            points: MaterialPoints::new(param, config, weights)?,
            history: Vec::new(),
        })
    }

    /// Runs the loading path until the final time
    pub fn solve(&mut self, file_io: &mut FileIo) -> Result<(), StrError> {
        // helper macro to save the summary before returning an error
        macro_rules! run {
            ($e:expr) => {
                match $e {
                    Ok(val) => val,
                    Err(err) => {
                        file_io.switched_at = self.points.switched_at();
                        match file_io.write_self() {
                            Ok(_) => (),
                            Err(e) => println!("ERROR-ON-ERROR: cannot write summary due to: {}", e),
                        }
                        return Err(err);
                    }
                }
            };
        }

        // accessors
        let config = self.config;
        let n_points = self.points.n_points();
        let unknowns = unknown_components(config);
        let n_unknown = unknowns.len();

        // control structures
        let mut control_time = ControlTime::new(config)?;
        let mut control_conv = ControlConvergence::new(config, n_points * n_unknown);
        control_time.initialize();

        // current strains (Mandel) of each point
        let mut strains: Vec<Vector> = Vec::with_capacity(n_points);
        for id in 0..n_points {
            strains.push(small_strain(&self.points.committed(id)?.ff_total).vector().clone());
        }

        // time loop
        control_conv.print_header();
        let index = config.loading.component.mandel_index();
        let mut n_attempts = 0;
        while !control_time.finished() {
            // check the number of attempts
            if n_attempts >= config.n_max_time_steps {
                run!(Err("the maximum number of time steps has been reached"));
            }
            n_attempts += 1;

            // open the step
            let dt = control_time.next_dt();
            let t_new = control_time.t() + dt;
            let mode = run!(self.points.begin_step(dt));
            control_conv.print_timestep(self.points.timestep(), t_new, dt, mode);
            control_conv.reset();

            // trial strains
            let mut trial = strains.clone();
            for eps in trial.iter_mut() {
                eps[index] = config.loading.mandel_strain(t_new);
            }

            // global iterations
            let outcome = run!(self.iterate(&mut control_conv, &mut trial, &unknowns));
            match outcome {
                Ok(iterations) => {
                    let mut diagnostics: Vec<LocalDiagnostics> = Vec::with_capacity(n_points);
                    for id in 0..n_points {
                        diagnostics.push(run!(self.points.response(id)).diagnostics);
                    }
                    run!(self.points.accept_step());
                    control_conv.add_converged();
                    control_time.on_success(dt);
                    strains = trial;
                    let mut points = Vec::with_capacity(n_points);
                    for id in 0..n_points {
                        points.push(PointOutput::new(run!(self.points.committed(id)), &diagnostics[id]));
                    }
                    let output = StepOutput {
                        timestep: self.points.timestep(),
                        t: control_time.t(),
                        dt,
                        mode,
                        iterations,
                        points,
                    };
                    run!(file_io.write_step(&output));
                    self.history.push(output);
                }
                Err(failure) => {
                    run!(self.points.reject_step());
                    control_conv.add_failed();
                    let dt_new = run!(control_time.on_failure());
                    control_conv.print_failure(failure.message(), dt_new);
                }
            }
        }

        // final output
        control_conv.print_footer();
        file_io.switched_at = self.points.switched_at();
        file_io.write_self()?;
        Ok(())
    }

    /// Performs the Newton-Raphson iterations of one step
    ///
    /// Returns `Ok(Ok(n_iterations))` on convergence, `Ok(Err(failure))` on a recoverable failure.
    fn iterate(
        &mut self,
        control_conv: &mut ControlConvergence,
        strains: &mut [Vector],
        unknowns: &[usize],
    ) -> Result<Result<usize, Failure>, StrError> {
        let n_points = strains.len();
        let n_unknown = unknowns.len();
        let mut rr = Vector::new(n_points * n_unknown);
        let mut mdu = Vector::new(n_points * n_unknown);
        for iteration in 0..=self.config.n_max_iterations {
            // evaluate all points
            let ffs = strains
                .iter()
                .map(|eps| deformation_from_strain(eps))
                .collect::<Result<Vec<Tensor2>, StrError>>()?;
            if !self.points.evaluate_all(&ffs)? {
                return Ok(Err(Failure::Local));
            }

            // residual: stresses of the unknown components
            for id in 0..n_points {
                let stress = self.points.response(id)?.stress.vector();
                for (a, &i) in unknowns.iter().enumerate() {
                    rr[id * n_unknown + a] = stress[i];
                }
            }
            if control_conv.analyze_rr(iteration, &rr).is_err() {
                return Ok(Err(Failure::Residual));
            }
            if control_conv.converged_on_norm_rr() {
                control_conv.print_iteration();
                return Ok(Ok(iteration));
            }
            if iteration == self.config.n_max_iterations {
                control_conv.print_iteration();
                break;
            }

            // per-point Newton corrections
            for id in 0..n_points {
                let dd = self.points.response(id)?.tangent.matrix();
                let mut kk = Matrix::new(n_unknown, n_unknown);
                let mut b = Vector::new(n_unknown);
                for (a, &i) in unknowns.iter().enumerate() {
                    b[a] = rr[id * n_unknown + a];
                    for (c, &j) in unknowns.iter().enumerate() {
                        kk.set(a, c, dd.get(i, j));
                    }
                }
                if solve_lin_sys(&mut b, &mut kk).is_err() || b.as_data().iter().any(|v| !v.is_finite()) {
                    return Ok(Err(Failure::Singular));
                }
                for a in 0..n_unknown {
                    mdu[id * n_unknown + a] = b[a];
                }
            }
            if control_conv.analyze_mdu(iteration, &mdu).is_err() {
                return Ok(Err(Failure::Residual));
            }
            control_conv.print_iteration();

            // the evaluated states match the current strains, so stop before correcting them
            if control_conv.converged() {
                return Ok(Ok(iteration));
            }
            for id in 0..n_points {
                for (a, &i) in unknowns.iter().enumerate() {
                    strains[id][i] -= mdu[id * n_unknown + a];
                }
            }
        }
        Ok(Err(Failure::Iterations))
    }
}

/// Returns the Mandel components solved by the global iterations
fn unknown_components(config: &Config) -> Vec<usize> {
    match config.control {
        Control::StrainDriven => Vec::new(),
        Control::UniaxialStress => {
            let index = config.loading.component.mandel_index();
            (0..N_MANDEL).filter(|i| *i != index).collect()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{unknown_components, SolverMaterialPoint};
    use crate::base::{Component, Config, Control, Loading, LoadingType, ParamMaterial};
    use crate::fem::FileIo;
    use crate::material::Mode;

    #[test]
    fn unknown_components_work() {
        let mut config = Config::new();
        assert_eq!(unknown_components(&config), &[1, 2, 3, 4, 5]);
        config.set_control(Control::StrainDriven);
        assert_eq!(unknown_components(&config).len(), 0);
        let loading = Loading::new(LoadingType::Monotonic, &[0.01], 1e-3, Component::Xy).unwrap();
        config.set_control(Control::UniaxialStress).set_loading(loading).unwrap();
        assert_eq!(unknown_components(&config), &[0, 1, 2, 4, 5]);
    }

    #[test]
    fn new_captures_errors() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        config.dt_shrink = 2.0;
        assert_eq!(
            SolverMaterialPoint::new(&param, &config).err(),
            Some("cannot allocate simulation because config.validate() failed")
        );
    }

    #[test]
    fn strain_driven_shear_works() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        let loading = Loading::new(LoadingType::Monotonic, &[0.002], 1e-3, Component::Xy).unwrap();
        config
            .set_loading(loading)
            .unwrap()
            .set_control(Control::StrainDriven)
            .set_dt(0.5, 1e-6, 0.5);
        let mut solver = SolverMaterialPoint::new(&param, &config).unwrap();
        let mut file_io = FileIo::new();
        solver.solve(&mut file_io).unwrap();
        assert_eq!(solver.history.len(), 4);
        let last = solver.history.last().unwrap();
        assert_eq!(last.mode, Mode::Physics);
        assert_eq!(last.iterations, 0);
        assert!(f64::abs(last.t - 2.0) < 1e-12);
        // σ12 > 0 and all normal stresses remain ~0 in pure shear (small strain)
        let sigma = &last.points[0].stress;
        assert!(sigma[3] > 0.0);
    }

    #[test]
    fn uniaxial_stress_works() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        let loading = Loading::new(LoadingType::Monotonic, &[0.002], 1e-3, Component::Xx).unwrap();
        config.set_loading(loading).unwrap().set_dt(0.5, 1e-6, 0.5);
        let mut solver = SolverMaterialPoint::new(&param, &config).unwrap();
        let mut file_io = FileIo::new();
        solver.solve(&mut file_io).unwrap();
        let last = solver.history.last().unwrap();
        let sigma = &last.points[0].stress;
        let eps = &last.points[0].strain;
        assert!(sigma[0] > 0.0);
        // either criterion may stop the iterations; tol_mdu_rel = 1e-10 bounds the residual by ~‖D‖ 1e-10
        for i in 1..6 {
            assert!(f64::abs(sigma[i]) < 1e-6);
        }
        // lateral contraction
        assert!(eps[1] < 0.0);
        assert!(f64::abs(eps[1] - eps[2]) < 1e-10);
        assert!(last.iterations > 0);
    }

    #[test]
    fn uniaxial_stress_converges_on_the_increment() {
        let param = ParamMaterial::sample_epoxy();
        let mut config = Config::new();
        let loading = Loading::new(LoadingType::Monotonic, &[0.002], 1e-3, Component::Xx).unwrap();
        config.set_loading(loading).unwrap();
        config.set_dt(0.5, 1e-6, 0.5);
        config.set_tol_mdu_rel(0.5);
        let mut solver = SolverMaterialPoint::new(&param, &config).unwrap();
        let mut file_io = FileIo::new();
        solver.solve(&mut file_io).unwrap();
        assert!(solver.history.len() > 0);

        // the second correction is always below half of the first one
        for out in &solver.history {
            assert_eq!(out.iterations, 1);
            let sigma = &out.points[0].stress;
            for i in 1..6 {
                assert!(f64::abs(sigma[i]) < 1e-2 * sigma[0]);
            }
        }
    }
}
