/// Defines the directory where the simulation result files are saved
pub const DEFAULT_OUT_DIR: &str = "/tmp/vevpd/results";

/// Defines an auxiliary directory where the test result files are saved
pub const DEFAULT_TEST_DIR: &str = "/tmp/vevpd/test";

/// Boltzmann constant k in J/K
pub const BOLTZMANN: f64 = 1.380649e-23;

/// Defines the smallest allowed dt_min (Config)
pub const CONFIG_MIN_DT_MIN: f64 = 1e-12;

/// Defines the smallest allowed tolerance (Config and local solver)
pub const CONFIG_MIN_TOL: f64 = 1e-15;

/// Number of components of a symmetric second-order tensor in Mandel representation (3D)
pub const N_MANDEL: usize = 6;

/// Number of inputs per sample fed to the recurrent surrogate: strain and strain increment
pub const N_SURROGATE_INPUT: usize = 2 * N_MANDEL;
