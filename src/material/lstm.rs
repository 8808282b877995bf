use crate::base::{N_MANDEL, N_SURROGATE_INPUT};
use crate::StrError;
use russell_lab::{mat_vec_mul, Matrix, Vector};
use russell_tensor::{Mandel, Tensor2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Number of recurrent layers
pub const LSTM_N_LAYERS: usize = 2;

/// Holds the weights of one LSTM layer (gate order: input, forget, cell, output)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LstmLayerWeights {
    /// Input weights (4H × I)
    pub w_ih: Vec<Vec<f64>>,

    /// Recurrent weights (4H × H)
    pub w_hh: Vec<Vec<f64>>,

    /// Input bias (4H)
    pub b_ih: Vec<f64>,

    /// Recurrent bias (4H)
    pub b_hh: Vec<f64>,
}

/// Holds the pre-trained weights of the two-layer recurrent surrogate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LstmWeights {
    /// Number of inputs per sample (strain and strain increment)
    pub input_size: usize,

    /// Hidden width H
    pub hidden_size: usize,

    /// Recurrent layers
    pub layers: Vec<LstmLayerWeights>,

    /// Dense head weights (6 × H)
    pub head_weight: Vec<Vec<f64>>,

    /// Dense head bias (6)
    pub head_bias: Vec<f64>,

    /// Scale dividing the strain inputs
    pub strain_scale: f64,

    /// Scale multiplying the network output to obtain stresses
    pub stress_scale: f64,
}

/// Holds the recurrent memory of one material point
///
/// `hh` and `cc` hold the hidden and cell states (one per layer) at the beginning of the
/// window; `buffer` holds the inputs of the window except the newest one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecurrentMemory {
    pub hh: Vec<Vector>,
    pub cc: Vec<Vector>,
    pub buffer: VecDeque<Vector>,
}

/// Implements one LSTM layer with pre-summed biases
struct LstmLayer {
    w_ih: Matrix,
    w_hh: Matrix,
    bias: Vector,
}

/// Implements the two-layer LSTM with a dense output head
pub struct Lstm {
    hidden_size: usize,
    layers: Vec<LstmLayer>,
    head_weight: Matrix,
    head_bias: Vector,
    strain_scale: f64,
    stress_scale: f64,
}

fn check_matrix(m: &Vec<Vec<f64>>, nrow: usize, ncol: usize) -> bool {
    m.len() == nrow && m.iter().all(|row| row.len() == ncol)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-x))
}

impl LstmWeights {
    /// Validates the dimensions of all arrays
    pub fn validate(&self) -> Result<(), StrError> {
        if self.input_size != N_SURROGATE_INPUT {
            return Err("the surrogate input size must be 12 (strain and strain increment)");
        }
        if self.hidden_size < 1 {
            return Err("the surrogate hidden size must be ≥ 1");
        }
        if self.layers.len() != LSTM_N_LAYERS {
            return Err("the surrogate must have exactly two recurrent layers");
        }
        let nh = self.hidden_size;
        for (i, layer) in self.layers.iter().enumerate() {
            let ni = if i == 0 { self.input_size } else { nh };
            if !check_matrix(&layer.w_ih, 4 * nh, ni) || !check_matrix(&layer.w_hh, 4 * nh, nh) {
                return Err("the recurrent weight matrices have incorrect dimensions");
            }
            if layer.b_ih.len() != 4 * nh || layer.b_hh.len() != 4 * nh {
                return Err("the recurrent bias vectors have incorrect dimensions");
            }
        }
        if !check_matrix(&self.head_weight, N_MANDEL, nh) || self.head_bias.len() != N_MANDEL {
            return Err("the output head has incorrect dimensions");
        }
        if !(self.strain_scale > 0.0) || !(self.stress_scale > 0.0) {
            return Err("the surrogate scales must be > 0.0");
        }
        Ok(())
    }

    /// Returns deterministic sample weights with small values
    ///
    /// The head maps the hidden state to a stress response; useful for tests and demonstrations.
    pub fn sample(hidden_size: usize) -> Self {
        let nh = hidden_size;
        let value = |seed: usize, i: usize, j: usize| -> f64 {
            0.3 * f64::sin(0.7 * (seed as f64) + 1.3 * (i as f64) + 2.1 * (j as f64) + 0.4)
        };
        let mut layers = Vec::new();
        for k in 0..LSTM_N_LAYERS {
            let ni = if k == 0 { N_SURROGATE_INPUT } else { nh };
            let w_ih = (0..4 * nh).map(|i| (0..ni).map(|j| value(10 * k + 1, i, j)).collect()).collect();
            let w_hh = (0..4 * nh).map(|i| (0..nh).map(|j| value(10 * k + 2, i, j)).collect()).collect();
            let b_ih = (0..4 * nh).map(|i| 0.1 * value(10 * k + 3, i, 0)).collect();
            let b_hh = (0..4 * nh).map(|i| 0.1 * value(10 * k + 4, i, 0)).collect();
            layers.push(LstmLayerWeights { w_ih, w_hh, b_ih, b_hh });
        }
        LstmWeights {
            input_size: N_SURROGATE_INPUT,
            hidden_size,
            layers,
            head_weight: (0..N_MANDEL).map(|i| (0..nh).map(|j| value(99, i, j)).collect()).collect(),
            head_bias: vec![0.0; N_MANDEL],
            strain_scale: 0.01,
            stress_scale: 10.0,
        }
    }

    /// Reads a JSON file containing the weights
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let file = File::open(path).map_err(|_| "cannot open the surrogate weights file")?;
        let buffered = BufReader::new(file);
        let weights: LstmWeights =
            serde_json::from_reader(buffered).map_err(|_| "cannot parse the surrogate weights file")?;
        weights.validate()?;
        Ok(weights)
    }

    /// Writes a JSON file with the weights
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
}

impl Lstm {
    /// Allocates a new instance from validated weights
    pub fn new(weights: &LstmWeights) -> Result<Self, StrError> {
        weights.validate()?;
        let layers = weights
            .layers
            .iter()
            .map(|w| {
                let mut bias = Vector::new(w.b_ih.len());
                for i in 0..bias.dim() {
                    bias[i] = w.b_ih[i] + w.b_hh[i];
                }
                LstmLayer {
                    w_ih: Matrix::from(&w.w_ih),
                    w_hh: Matrix::from(&w.w_hh),
                    bias,
                }
            })
            .collect();
        Ok(Lstm {
            hidden_size: weights.hidden_size,
            layers,
            head_weight: Matrix::from(&weights.head_weight),
            head_bias: Vector::from(&weights.head_bias),
            strain_scale: weights.strain_scale,
            stress_scale: weights.stress_scale,
        })
    }

    /// Returns a memory with zero hidden and cell states and an empty buffer
    pub fn zero_memory(&self) -> RecurrentMemory {
        RecurrentMemory {
            hh: vec![Vector::new(self.hidden_size); LSTM_N_LAYERS],
            cc: vec![Vector::new(self.hidden_size); LSTM_N_LAYERS],
            buffer: VecDeque::new(),
        }
    }

    /// Builds the scaled input sample from the current and previous strains (Mandel)
    pub fn input(&self, eps: &Vector, eps_prev: &Vector) -> Vector {
        let mut x = Vector::new(N_SURROGATE_INPUT);
        for i in 0..N_MANDEL {
            x[i] = eps[i] / self.strain_scale;
            x[N_MANDEL + i] = (eps[i] - eps_prev[i]) / self.strain_scale;
        }
        x
    }

    /// Advances the hidden and cell states by one sample
    pub fn step(&self, hh: &mut [Vector], cc: &mut [Vector], x: &Vector) -> Result<(), StrError> {
        let nh = self.hidden_size;
        let mut gates = Vector::new(4 * nh);
        let mut recurrent = Vector::new(4 * nh);
        let mut input = x.clone();
        for (k, layer) in self.layers.iter().enumerate() {
            mat_vec_mul(&mut gates, 1.0, &layer.w_ih, &input)?;
            mat_vec_mul(&mut recurrent, 1.0, &layer.w_hh, &hh[k])?;
            for i in 0..nh {
                let gi = sigmoid(gates[i] + recurrent[i] + layer.bias[i]);
                let gf = sigmoid(gates[nh + i] + recurrent[nh + i] + layer.bias[nh + i]);
                let gg = f64::tanh(gates[2 * nh + i] + recurrent[2 * nh + i] + layer.bias[2 * nh + i]);
                let go = sigmoid(gates[3 * nh + i] + recurrent[3 * nh + i] + layer.bias[3 * nh + i]);
                cc[k][i] = gf * cc[k][i] + gi * gg;
                hh[k][i] = go * f64::tanh(cc[k][i]);
            }
            input = hh[k].clone();
        }
        Ok(())
    }

    /// Maps the hidden state of the top layer to the stress
    pub fn output(&self, hh_top: &Vector) -> Result<Tensor2, StrError> {
        let mut y = Vector::new(N_MANDEL);
        mat_vec_mul(&mut y, 1.0, &self.head_weight, hh_top)?;
        let mut stress = Tensor2::new(Mandel::Symmetric);
        let sigma = stress.vector_mut();
        for i in 0..N_MANDEL {
            sigma[i] = self.stress_scale * (y[i] + self.head_bias[i]);
        }
        Ok(stress)
    }

    /// Runs the window stored in the memory followed by a new sample
    ///
    /// Returns the stress and the memory advanced by one sample (the memory passed in is untouched).
    pub fn forward(
        &self,
        memory: &RecurrentMemory,
        x: &Vector,
        window: usize,
    ) -> Result<(Tensor2, RecurrentMemory), StrError> {
        if memory.hh.len() != LSTM_N_LAYERS || memory.cc.len() != LSTM_N_LAYERS {
            return Err("the recurrent memory is inconsistent with the network");
        }
        let mut hh = memory.hh.clone();
        let mut cc = memory.cc.clone();
        for past in memory.buffer.iter() {
            self.step(&mut hh, &mut cc, past)?;
        }
        self.step(&mut hh, &mut cc, x)?;
        let stress = self.output(&hh[LSTM_N_LAYERS - 1])?;

        let mut next = memory.clone();
        next.buffer.push_back(x.clone());
        while next.buffer.len() + 1 > window {
            match next.buffer.pop_front() {
                Some(oldest) => self.step(&mut next.hh, &mut next.cc, &oldest)?,
                None => break,
            }
        }
        Ok((stress, next))
    }

    /// Replays a strain history (Mandel, oldest first) starting from zero memory
    ///
    /// The oldest samples advance the hidden/cell states; the newest `window − 1` samples fill the buffer.
    pub fn replay(&self, history: &VecDeque<Vector>, window: usize) -> Result<RecurrentMemory, StrError> {
        let mut memory = self.zero_memory();
        let mut eps_prev = Vector::new(N_MANDEL);
        for eps in history {
            if eps.dim() != N_MANDEL {
                return Err("the recorded strains must have 6 Mandel components");
            }
            let x = self.input(eps, &eps_prev);
            memory.buffer.push_back(x);
            while memory.buffer.len() + 1 > window {
                match memory.buffer.pop_front() {
                    Some(oldest) => self.step(&mut memory.hh, &mut memory.cc, &oldest)?,
                    None => break,
                }
            }
            eps_prev = eps.clone();
        }
        Ok(memory)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
