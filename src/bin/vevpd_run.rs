use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use structopt::StructOpt;
use vevpd::prelude::*;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "vevpd_run",
    about = "Runs the material point simulation described in a JSON input file"
)]
struct Options {
    /// Input file with the material parameters and the configuration
    input: String,

    /// Output directory (default: /tmp/vevpd/results)
    #[structopt(long)]
    out_dir: Option<String>,

    /// Filename stem of the output files
    #[structopt(long, default_value = "vevpd")]
    stem: String,
}

/// Holds the contents of the input file
#[derive(Deserialize)]
struct Input {
    param: ParamMaterial,
    config: Config,
}

fn main() -> Result<(), StrError> {
    // parse options
    let options = Options::from_args();

    // load input
    let file = File::open(&options.input).map_err(|_| "cannot open the input file")?;
    let input: Input = serde_json::from_reader(BufReader::new(file)).map_err(|_| "cannot parse the input file")?;
    if input.config.verbose_timesteps {
        println!("{}", input.config);
    }

    // run
    let mut file_io = FileIo::new_enabled(&options.stem, options.out_dir.as_deref())?;
    let mut solver = SolverMaterialPoint::new(&input.param, &input.config)?;
    solver.solve(&mut file_io)?;

    // message
    let path_summary = file_io.path_summary();
    let thin_line = format!("{:─^1$}", "", path_summary.len());
    println!("\n\n{}", thin_line);
    println!("converged steps = {}", solver.history.len());
    println!("physics evaluations = {}", solver.points.n_physics_calls());
    println!("surrogate evaluations = {}", solver.points.n_surrogate_calls());
    if let Some(last) = solver.history.last() {
        let damage = last.points.iter().fold(0.0, |acc: f64, p| acc.max(p.damage));
        println!("final time = {:?}", last.t);
        println!("max damage = {:?}", damage);
    }
    println!("the summary file is:");
    println!("{}", path_summary);
    println!("{}\n\n", thin_line);
    Ok(())
}
