use vevpd::prelude::*;

// Uniaxial cyclic loading of homogeneous material points
//
// TEST GOAL
//
// Verifies the global Newton-Raphson driver with mixed control: the axial strain follows a
// cyclic path while the remaining stress components vanish. Also checks the JSON output.
//
// CONFIGURATION AND PARAMETERS
//
// * Epoxy sample parameters
// * Two points; cyclic-to-zero axial strain with amplitudes 0.01 and 0.02 at 1e-3 1/s
// * Δt = 1 s

const NAME: &str = "test_uniaxial_cyclic";

#[test]
fn test_uniaxial_cyclic() -> Result<(), StrError> {
    // configuration
    let param = ParamMaterial::sample_epoxy();
    let mut config = Config::new();
    let loading = Loading::new(LoadingType::CyclicToZero, &[0.01, 0.02], 1e-3, Component::Xx)?;
    config
        .set_n_points(2)?
        .set_loading(loading)?
        .set_control(Control::UniaxialStress)
        .set_dt(1.0, 1e-6, 1.0)
        .set_n_max_iterations(30);

    // solve
    let mut file_io = FileIo::new_enabled(NAME, Some(DEFAULT_TEST_DIR))?;
    let mut solver = SolverMaterialPoint::new(&param, &config)?;
    solver.solve(&mut file_io)?;

    // check the history
    let n = solver.history.len();
    assert!(n >= 60);
    let mut damage_prev = 0.0;
    let mut max_axial: f64 = 0.0;
    for out in &solver.history {
        let a = &out.points[0];
        let b = &out.points[1];
        assert_eq!(a.stress.as_data(), b.stress.as_data());
        for i in 1..6 {
            assert!(f64::abs(a.stress[i]) < 1e-6); // residual or increment criterion
        }
        assert!(a.damage >= damage_prev);
        damage_prev = a.damage;
        max_axial = f64::max(max_axial, a.stress[0]);
    }
    let last = &solver.history[n - 1];
    assert!(f64::abs(last.t - config.loading.final_time()) < 1e-10);
    assert!(f64::abs(last.points[0].strain[0]) < 1e-12);
    assert!(max_axial > param.viscoplastic.sigma0);
    assert!(last.points[0].eps_p > 0.0);
    assert!(last.points[0].damage > 0.0);

    // check the output files
    let summary = FileIo::read_json(&file_io.path_summary())?;
    assert_eq!(summary.indices.len(), n);
    assert_eq!(summary.switched_at, None);
    let out = StepOutput::read_json(&file_io.path_state(n - 1))?;
    assert_eq!(out.timestep, n);
    assert_eq!(out.points[0].damage, last.points[0].damage);
    Ok(())
}
