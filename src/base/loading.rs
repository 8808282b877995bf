use crate::StrError;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

/// Specifies the strain component driven by the loading path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Component {
    Xx,
    Yy,
    Zz,
    /// Engineering shear strain γxy
    Xy,
    /// Engineering shear strain γyz
    Yz,
    /// Engineering shear strain γxz
    Xz,
}

/// Specifies the shape of the loading path
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LoadingType {
    /// Loads through the amplitudes in sequence: 0 → a₁ → a₂ → …
    Monotonic,

    /// Unloads to zero after each amplitude: 0 → a₁ → 0 → a₂ → 0 …
    CyclicToZero,

    /// Fully reversed cycles: 0 → a₁ → −a₁ → a₂ → −a₂ … → 0
    FullyReversed,

    /// Loads to the first amplitude and holds the strain for the given duration
    Relaxation { hold: f64 },
}

/// Holds a strain-controlled loading path applied at constant rate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Loading {
    /// Shape of the path
    pub kind: LoadingType,

    /// Sequence of strain amplitudes
    pub amplitudes: Vec<f64>,

    /// Absolute strain rate (1/s)
    pub rate: f64,

    /// Driven component
    pub component: Component,
}

impl Component {
    /// Returns the index of the component in the Mandel vector
    pub fn mandel_index(&self) -> usize {
        match self {
            Component::Xx => 0,
            Component::Yy => 1,
            Component::Zz => 2,
            Component::Xy => 3,
            Component::Yz => 4,
            Component::Xz => 5,
        }
    }

    /// Returns the factor converting the path value into the Mandel component
    ///
    /// Shear values are engineering strains γ, thus εᵢⱼ = γ/2 and the Mandel value is γ/√2.
    pub fn mandel_factor(&self) -> f64 {
        match self {
            Component::Xx | Component::Yy | Component::Zz => 1.0,
            _ => 1.0 / SQRT_2,
        }
    }
}

impl Loading {
    /// Allocates a new instance
    pub fn new(kind: LoadingType, amplitudes: &[f64], rate: f64, component: Component) -> Result<Self, StrError> {
        let loading = Loading {
            kind,
            amplitudes: amplitudes.to_vec(),
            rate,
            component,
        };
        loading.validate()?;
        Ok(loading)
    }

    /// Validates all data
    pub fn validate(&self) -> Result<(), StrError> {
        if self.amplitudes.len() < 1 {
            return Err("the loading path requires at least one amplitude");
        }
        if self.amplitudes.iter().any(|a| !a.is_finite()) {
            return Err("the loading amplitudes must be finite");
        }
        if !(self.rate > 0.0) || !self.rate.is_finite() {
            return Err("the loading rate must be > 0.0");
        }
        if let LoadingType::Relaxation { hold } = self.kind {
            if hold < 0.0 {
                return Err("the relaxation hold time must be ≥ 0.0");
            }
        }
        Ok(())
    }

    /// Returns the turning points of the path, starting from zero
    fn turning_points(&self) -> Vec<f64> {
        let mut points = vec![0.0];
        match self.kind {
            LoadingType::Monotonic => points.extend(self.amplitudes.iter()),
            LoadingType::CyclicToZero => {
                for a in &self.amplitudes {
                    points.push(*a);
                    points.push(0.0);
                }
            }
            LoadingType::FullyReversed => {
                for a in &self.amplitudes {
                    points.push(*a);
                    points.push(-*a);
                }
                points.push(0.0);
            }
            LoadingType::Relaxation { .. } => points.push(self.amplitudes[0]),
        }
        points
    }

    /// Returns the hold time at the end of the path
    fn hold_time(&self) -> f64 {
        match self.kind {
            LoadingType::Relaxation { hold } => hold,
            _ => 0.0,
        }
    }

    /// Returns the total duration of the path
    pub fn final_time(&self) -> f64 {
        let points = self.turning_points();
        let mut t = 0.0;
        for i in 1..points.len() {
            t += f64::abs(points[i] - points[i - 1]) / self.rate;
        }
        t + self.hold_time()
    }

    /// Returns the prescribed strain value (path units) at time t
    ///
    /// Times beyond the end of the path return the last value.
    pub fn strain(&self, t: f64) -> f64 {
        let points = self.turning_points();
        let mut t_start = 0.0;
        for i in 1..points.len() {
            let delta = points[i] - points[i - 1];
            let duration = f64::abs(delta) / self.rate;
            if t <= t_start + duration {
                if duration <= 0.0 {
                    return points[i];
                }
                return points[i - 1] + delta * (t - t_start) / duration;
            }
            t_start += duration;
        }
        points[points.len() - 1]
    }

    /// Returns the prescribed Mandel strain component at time t
    pub fn mandel_strain(&self, t: f64) -> f64 {
        self.strain(t) * self.component.mandel_factor()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
