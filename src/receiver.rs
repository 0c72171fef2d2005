use nalgebra::Vector3;

use crate::prelude::{Constellation, SV};

/// Dual frequency ionosphere free combination carried by one
/// [SignalObservation]. One combination of interest is processed per
/// constellation, others are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Combination {
    /// L1/L2 ionosphere free combination
    If12,
    /// L1/L5 ionosphere free combination
    If15,
}

impl Combination {
    /// Total number of tracked combinations (ambiguity cascade range).
    pub const COUNT: u16 = 2;

    /// Combination of interest for this [Constellation]:
    /// Galileo navigates on L1/L5, everything else on L1/L2.
    pub fn of_interest(constellation: Constellation) -> Self {
        if constellation == Constellation::Galileo {
            Self::If15
        } else {
            Self::If12
        }
    }

    /// Frequency index, used in ambiguity [crate::prelude::StateKey]s
    /// and [crate::prelude::SignalKey]s.
    pub fn index(&self) -> u16 {
        match self {
            Self::If12 => 0,
            Self::If15 => 1,
        }
    }
}

/// One signal combination observed on a receiver/satellite pair.
/// Residuals are observed minus modeled, all geophysical models
/// already applied by the preprocessor.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalObservation {
    /// [Combination] this observation was formed from
    pub combination: Combination,
    /// Code (pseudo range) residual (m)
    pub code_residual_m: f64,
    /// Carrier phase residual (m)
    pub phase_residual_m: f64,
    /// Code noise variance (m²)
    pub code_variance: f64,
    /// Phase noise variance (m²)
    pub phase_variance: f64,
}

/// All signals observed on one receiver/satellite pair this epoch,
/// with the modeled geometry attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// [SV] being tracked
    pub sv: SV,
    /// Raised by the preprocessor to exclude this observation
    pub excluded: bool,
    /// Receiver to satellite line of sight unit vector (ECEF)
    pub line_of_sight: Vector3<f64>,
    /// Wet troposphere mapping function at this elevation
    pub map_wet: f64,
    /// North and East gradient mapping values
    pub map_wet_gradients: (f64, f64),
    /// Observed [SignalObservation]s
    pub signals: Vec<SignalObservation>,
}

impl Observation {
    /// The signal carrying this [Combination], if observed.
    pub fn signal(&self, combination: Combination) -> Option<&SignalObservation> {
        self.signals.iter().find(|s| s.combination == combination)
    }
}

/// Standalone solution block of one [Receiver]: quantities derived
/// outside the network filter, used by the clock jitter corrector.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReceiverSolution {
    /// Code derived receiver clock bias (m), independent of the filter
    pub clock_bias_m: f64,
    /// Previous epoch's clock bias delta to the reference receiver (m),
    /// zero before first use
    pub previous_delta_m: f64,
}

/// One network receiver and its current epoch observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    /// Unique receiver identifier
    pub id: String,
    /// Raised by configuration to exclude this receiver
    pub excluded: bool,
    /// Apriori position (ECEF, m), used for EOP partials
    pub apriori_position_ecef_m: Vector3<f64>,
    /// Apriori position uncertainty per axis (m), seeded from the
    /// position initial variance when unset
    pub apriori_sigma_m: Vector3<f64>,
    /// Standalone [ReceiverSolution]
    pub solution: ReceiverSolution,
    /// Per satellite [Observation]s for this epoch
    pub observations: Vec<Observation>,
}

impl Receiver {
    /// New [Receiver] with given identifier and apriori position.
    pub fn new(id: &str, apriori_position_ecef_m: Vector3<f64>) -> Self {
        Self {
            id: id.to_string(),
            excluded: false,
            apriori_position_ecef_m,
            apriori_sigma_m: Vector3::zeros(),
            solution: Default::default(),
            observations: Vec::new(),
        }
    }
}

/// Constellation bias group: group 0 is the primary (GPS) datum, other
/// constellations estimate an additional inter-system bias.
pub(crate) fn bias_group(constellation: Constellation) -> u16 {
    match constellation {
        Constellation::GPS => 0,
        Constellation::Glonass => 1,
        Constellation::Galileo => 2,
        Constellation::BeiDou => 3,
        Constellation::QZSS => 4,
        _ => 5,
    }
}
