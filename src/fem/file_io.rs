use super::StepOutput;
use crate::base::DEFAULT_OUT_DIR;
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Assists in generating output files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileIo {
    /// Holds a flag to enable/disable the file generation
    enabled: bool,

    /// Defines the output directory
    output_dir: String,

    /// Defines the filename stem
    filename_stem: String,

    /// Holds the count of files written
    output_count: usize,

    /// Holds the indices of the output files
    pub indices: Vec<usize>,

    /// Holds the simulation times corresponding to each output file
    pub times: Vec<f64>,

    /// Holds the timestep at which the surrogate took over, if any
    pub switched_at: Option<usize>,
}

impl FileIo {
    /// Allocates a new instance with deactivated generation of files
    pub fn new() -> Self {
        FileIo {
            enabled: false,
            output_dir: String::new(),
            filename_stem: String::new(),
            output_count: 0,
            indices: Vec::new(),
            times: Vec::new(),
            switched_at: None,
        }
    }

    /// Allocates a new instance with enabled generation of files
    ///
    /// # Input
    ///
    /// * `filename_stem` -- the last part of the filename without extension, e.g., "my_simulation"
    /// * `output_directory` -- the directory to save the output files.
    ///   None means that the default directory will be used; see [DEFAULT_OUT_DIR]
    pub fn new_enabled(filename_stem: &str, output_directory: Option<&str>) -> Result<Self, StrError> {
        // output directory
        let out_dir = match output_directory {
            Some(d) => d,
            None => DEFAULT_OUT_DIR,
        };

        // create directory
        fs::create_dir_all(out_dir).map_err(|_| "cannot create output directory")?;

        // new structure
        Ok(FileIo {
            enabled: true,
            output_dir: out_dir.to_string(),
            filename_stem: filename_stem.to_string(),
            output_count: 0,
            indices: Vec::new(),
            times: Vec::new(),
            switched_at: None,
        })
    }

    /// Returns true if the file generation is enabled
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Generates the filename path for the summary file
    pub fn path_summary(&self) -> String {
        if self.enabled {
            format!("{}/{}-summary.json", self.output_dir, self.filename_stem)
        } else {
            "".to_string()
        }
    }

    /// Generates the filename path for the step files
    pub fn path_state(&self, index: usize) -> String {
        if self.enabled {
            format!("{}/{}-{:0>20}.json", self.output_dir, self.filename_stem, index)
        } else {
            "".to_string()
        }
    }

    /// Reads a JSON file containing this struct
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let summary = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(summary)
    }

    /// Writes a JSON file with this struct
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }

    /// Writes the results of a converged step to a file
    ///
    /// **Note:** No output is generated if the file generation is disabled.
    pub(crate) fn write_step(&mut self, output: &StepOutput) -> Result<(), StrError> {
        if self.enabled {
            let path = self.path_state(self.output_count);
            output.write_json(&path)?;
            self.indices.push(self.output_count);
            self.times.push(output.t);
            self.output_count += 1;
        }
        Ok(())
    }

    /// Writes this struct to a file
    pub(crate) fn write_self(&self) -> Result<(), StrError> {
        if self.enabled {
            let path = self.path_summary();
            self.write_json(&path)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::FileIo;
    use crate::base::DEFAULT_TEST_DIR;
    use crate::fem::StepOutput;
    use crate::material::Mode;

    #[test]
    fn disabled_file_io_works() {
        let mut file_io = FileIo::new();
        assert_eq!(file_io.enabled(), false);
        assert_eq!(file_io.path_summary(), "");
        assert_eq!(file_io.path_state(0), "");
        let output = StepOutput {
            timestep: 1,
            t: 0.1,
            dt: 0.1,
            mode: Mode::Physics,
            iterations: 1,
            points: Vec::new(),
        };
        file_io.write_step(&output).unwrap();
        file_io.write_self().unwrap();
        assert_eq!(file_io.indices.len(), 0);
    }

    #[test]
    fn enabled_file_io_works() {
        let dir = format!("{}/file_io", DEFAULT_TEST_DIR);
        let mut file_io = FileIo::new_enabled("enabled", Some(&dir)).unwrap();
        assert_eq!(file_io.path_summary(), format!("{}/enabled-summary.json", dir));
        assert_eq!(
            file_io.path_state(7),
            format!("{}/enabled-00000000000000000007.json", dir)
        );
        for k in 0..2 {
            let output = StepOutput {
                timestep: k + 1,
                t: 0.1 * (k + 1) as f64,
                dt: 0.1,
                mode: Mode::Ml,
                iterations: 1,
                points: Vec::new(),
            };
            file_io.write_step(&output).unwrap();
        }
        file_io.switched_at = Some(0);
        file_io.write_self().unwrap();
        let summary = FileIo::read_json(&file_io.path_summary()).unwrap();
        assert_eq!(summary.indices, &[0, 1]);
        assert_eq!(summary.switched_at, Some(0));
        let last = StepOutput::read_json(&file_io.path_state(1)).unwrap();
        assert_eq!(last.timestep, 2);
        assert_eq!(last.mode, Mode::Ml);
    }
}
