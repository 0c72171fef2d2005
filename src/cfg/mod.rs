#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    prelude::{Constellation, SV},
    state::{InitialState, ProcessNoise},
};

/// Per parameter family estimation setup. Initial values and variances
/// are indexed (axis, frequency, unknown index); the last declared
/// entry applies to all further indexes.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateSpec {
    /// False removes this family from the design matrix entirely
    pub estimate: bool,
    /// Initial values, per index
    pub values: Vec<f64>,
    /// Initial variances, per index
    pub variances: Vec<f64>,
    /// [ProcessNoise] model shared by the family
    pub process_noise: ProcessNoise,
}

impl StateSpec {
    /// Family that is not estimated.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Estimated family with one (value, variance) pair for all indexes.
    pub fn new(value: f64, variance: f64, process_noise: ProcessNoise) -> Self {
        Self {
            estimate: true,
            values: vec![value],
            variances: vec![variance],
            process_noise,
        }
    }

    fn pick(list: &[f64], index: usize) -> f64 {
        match list.len() {
            0 => 0.0,
            len if index < len => list[index],
            len => list[len - 1],
        }
    }

    /// [InitialState] of the family member at this index.
    pub fn initial_state(&self, index: usize) -> InitialState {
        InitialState {
            estimate: self.estimate,
            value: Self::pick(&self.values, index),
            variance: Self::pick(&self.variances, index),
            process_noise: self.process_noise,
        }
    }
}

/// Reference receiver setup: the pivot anchors the otherwise rank
/// deficient network clock datum.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pivot {
    /// First receiver encountered becomes the pivot
    #[default]
    Auto,
    /// Pivot by receiver identifier
    Receiver(String),
}

/// Cycle slip detectors allowed to reinitialize ambiguities.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlipExclusions {
    pub lli: bool,
    pub gf: bool,
    pub mw: bool,
    pub emw: bool,
    pub cj: bool,
    pub scdia: bool,
}

impl Default for SlipExclusions {
    fn default() -> Self {
        Self {
            lli: true,
            gf: true,
            mw: true,
            emw: false,
            cj: false,
            scdia: false,
        }
    }
}

fn default_constellations() -> Vec<Constellation> {
    vec![Constellation::GPS]
}

fn default_outage_limit() -> u32 {
    12
}

fn default_reject_limit() -> u32 {
    10
}

fn default_iono_ceiling() -> f64 {
    10_000.0
}

fn default_reinit_on_slips() -> bool {
    true
}

fn default_clock_wrap_tolerance() -> f64 {
    1.0E-5
}

/// Network estimation setup. The defaults estimate receiver and
/// satellite clocks, wet troposphere and phase ambiguities; every other
/// family starts disabled.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Receiver clock bias [StateSpec]
    #[cfg_attr(feature = "serde", serde(default = "default_rec_clock"))]
    pub rec_clock: StateSpec,

    /// Receiver clock drift [StateSpec]
    #[cfg_attr(feature = "serde", serde(default))]
    pub rec_clock_rate: StateSpec,

    /// Gauss-Markov receiver clock drift [StateSpec]
    #[cfg_attr(feature = "serde", serde(default))]
    pub rec_clock_rate_gm: StateSpec,

    /// Receiver position [StateSpec] (axis indexed)
    #[cfg_attr(feature = "serde", serde(default))]
    pub rec_position: StateSpec,

    /// Wet troposphere zenith delay [StateSpec]
    #[cfg_attr(feature = "serde", serde(default = "default_tropo"))]
    pub tropo: StateSpec,

    /// Gauss-Markov troposphere twin [StateSpec]
    #[cfg_attr(feature = "serde", serde(default))]
    pub tropo_gm: StateSpec,

    /// Troposphere horizontal gradients [StateSpec] (2 indexes)
    #[cfg_attr(feature = "serde", serde(default))]
    pub tropo_gradients: StateSpec,

    /// Gauss-Markov gradient twin [StateSpec]
    #[cfg_attr(feature = "serde", serde(default))]
    pub tropo_gradients_gm: StateSpec,

    /// Satellite clock bias [StateSpec]
    #[cfg_attr(feature = "serde", serde(default = "default_sat_clock"))]
    pub sat_clock: StateSpec,

    /// Satellite clock drift [StateSpec]
    #[cfg_attr(feature = "serde", serde(default))]
    pub sat_clock_rate: StateSpec,

    /// Gauss-Markov satellite clock drift [StateSpec]
    #[cfg_attr(feature = "serde", serde(default))]
    pub sat_clock_rate_gm: StateSpec,

    /// Phase ambiguity [StateSpec] (frequency indexed)
    #[cfg_attr(feature = "serde", serde(default = "default_ambiguity"))]
    pub ambiguity: StateSpec,

    /// Per frequency ambiguity rate [StateSpec]. When disabled,
    /// ambiguities across frequencies move together and removal
    /// cascades to every tracked frequency.
    #[cfg_attr(feature = "serde", serde(default))]
    pub ambiguity_rate: StateSpec,

    /// Orbit correction coefficients [StateSpec] (unknown indexed)
    #[cfg_attr(feature = "serde", serde(default))]
    pub orbit: StateSpec,

    /// Earth orientation parameters [StateSpec] (xp, yp, ut1)
    #[cfg_attr(feature = "serde", serde(default))]
    pub eop: StateSpec,

    /// Earth orientation parameter rates [StateSpec]
    #[cfg_attr(feature = "serde", serde(default))]
    pub eop_rate: StateSpec,

    /// [Pivot] receiver selection
    #[cfg_attr(feature = "serde", serde(default))]
    pub pivot: Pivot,

    /// Constellations being processed
    #[cfg_attr(feature = "serde", serde(default = "default_constellations"))]
    pub constellations: Vec<Constellation>,

    /// Satellites excluded from processing
    #[cfg_attr(feature = "serde", serde(default))]
    pub excluded_satellites: Vec<SV>,

    /// Receivers excluded from processing
    #[cfg_attr(feature = "serde", serde(default))]
    pub excluded_receivers: Vec<String>,

    /// Ambiguity removal after this many epochs without phase use
    #[cfg_attr(feature = "serde", serde(default = "default_outage_limit"))]
    pub outage_limit: u32,

    /// Ambiguity removal after this many epochs since last rejection
    #[cfg_attr(feature = "serde", serde(default = "default_reject_limit"))]
    pub reject_limit: u32,

    /// Ionosphere slant delay removal above this posterior variance
    #[cfg_attr(feature = "serde", serde(default = "default_iono_ceiling"))]
    pub iono_variance_ceiling: f64,

    /// Allow cycle slip detectors to reinitialize ambiguities
    #[cfg_attr(feature = "serde", serde(default = "default_reinit_on_slips"))]
    pub reinit_on_all_slips: bool,

    /// Detectors allowed to trigger reinitialization
    #[cfg_attr(feature = "serde", serde(default))]
    pub slip_exclusions: SlipExclusions,

    /// Receiver clock wraparound tolerance (s): the correction window
    /// spans c × 1ms ± c × tolerance
    #[cfg_attr(feature = "serde", serde(default = "default_clock_wrap_tolerance"))]
    pub clock_wrap_tolerance_s: f64,
}

fn default_rec_clock() -> StateSpec {
    StateSpec::new(0.0, 1.0E4, ProcessNoise::RandomWalk { q: 100.0 })
}

fn default_sat_clock() -> StateSpec {
    StateSpec::new(0.0, 1.0E4, ProcessNoise::RandomWalk { q: 1.0 })
}

fn default_tropo() -> StateSpec {
    StateSpec::new(0.0, 0.25, ProcessNoise::RandomWalk { q: 1.0E-8 })
}

fn default_ambiguity() -> StateSpec {
    StateSpec::new(0.0, 1.0E4, ProcessNoise::None)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rec_clock: default_rec_clock(),
            rec_clock_rate: StateSpec::disabled(),
            rec_clock_rate_gm: StateSpec::disabled(),
            rec_position: StateSpec::disabled(),
            tropo: default_tropo(),
            tropo_gm: StateSpec::disabled(),
            tropo_gradients: StateSpec::disabled(),
            tropo_gradients_gm: StateSpec::disabled(),
            sat_clock: default_sat_clock(),
            sat_clock_rate: StateSpec::disabled(),
            sat_clock_rate_gm: StateSpec::disabled(),
            ambiguity: default_ambiguity(),
            ambiguity_rate: StateSpec::disabled(),
            orbit: StateSpec::disabled(),
            eop: StateSpec::disabled(),
            eop_rate: StateSpec::disabled(),
            pivot: Pivot::default(),
            constellations: default_constellations(),
            excluded_satellites: Vec::new(),
            excluded_receivers: Vec::new(),
            outage_limit: default_outage_limit(),
            reject_limit: default_reject_limit(),
            iono_variance_ceiling: default_iono_ceiling(),
            reinit_on_all_slips: default_reinit_on_slips(),
            slip_exclusions: SlipExclusions::default(),
            clock_wrap_tolerance_s: default_clock_wrap_tolerance(),
        }
    }
}
