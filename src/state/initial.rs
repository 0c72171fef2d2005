#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stochastic model attached to one estimated parameter.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProcessNoise {
    /// Constant parameter: no process noise
    #[default]
    None,
    /// Random walk with variance rate q (unit².s⁻¹)
    RandomWalk {
        q: f64,
    },
    /// Mean reverting Gauss-Markov process with correlation time
    /// tau_s (s) and stationary deviation sigma (unit)
    GaussMarkov {
        tau_s: f64,
        sigma: f64,
    },
}

/// Initial setup of one filter state: created with this value and
/// variance, then propagated per [ProcessNoise].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InitialState {
    /// False turns the parameter family contribution off entirely
    pub estimate: bool,
    /// Initial value
    pub value: f64,
    /// Initial variance
    pub variance: f64,
    /// [ProcessNoise] model
    pub process_noise: ProcessNoise,
}

impl InitialState {
    /// [InitialState] that is not estimated at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Estimated [InitialState] with given value, variance and [ProcessNoise].
    pub fn new(value: f64, variance: f64, process_noise: ProcessNoise) -> Self {
        Self {
            estimate: true,
            value,
            variance,
            process_noise,
        }
    }

    /// New [InitialState] with updated initial value.
    pub fn with_value(&self, value: f64) -> Self {
        let mut s = self.clone();
        s.value = value;
        s
    }
}
