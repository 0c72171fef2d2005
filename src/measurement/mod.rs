use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::{
    prelude::{Epoch, SV},
    state::{InitialState, StateKey, StateRegistry},
    tracking::SignalKey,
};

mod kalman;
mod lsq;

pub(crate) use kalman::filter_update;
pub(crate) use lsq::bootstrap;

/// Nature of one measurement row, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementKind {
    /// Code (pseudo range) measurement
    Code,
    /// Carrier phase measurement
    Phase,
    /// Datum anchoring pseudo measurement
    Pseudo,
}

/// Identifies one scalar measurement row.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementKey {
    pub kind: MeasurementKind,
    pub sv: Option<SV>,
    pub receiver: Option<String>,
    pub index: u16,
}

impl MeasurementKey {
    pub fn new(kind: MeasurementKind, sv: Option<SV>, receiver: Option<&str>, index: u16) -> Self {
        Self {
            kind,
            sv,
            receiver: receiver.map(|r| r.to_string()),
            index,
        }
    }
}

impl std::fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(sv) = self.sv {
            write!(f, " {}", sv)?;
        }
        if let Some(receiver) = &self.receiver {
            write!(f, " {}", receiver)?;
        }
        write!(f, " #{}", self.index)
    }
}

/// One scalar observation equation: a sparse coefficient row over
/// [StateKey]s, an observed residual and a noise variance.
#[derive(Debug, Clone)]
pub struct MeasurementEntry {
    /// [MeasurementKey] identity
    pub key: MeasurementKey,
    /// Observed value (pre model residual)
    value: f64,
    /// Noise variance
    variance: f64,
    /// Sparse design row: referenced key, coefficient, creation setup
    coefficients: Vec<(StateKey, f64, InitialState)>,
    /// Tracking state addressed by this row, reset after an accepted
    /// update (phase rows only)
    pub tracker: Option<SignalKey>,
}

impl MeasurementEntry {
    /// New empty [MeasurementEntry].
    pub fn new(key: MeasurementKey) -> Self {
        Self {
            key,
            value: 0.0,
            variance: 0.0,
            coefficients: Vec::new(),
            tracker: None,
        }
    }

    /// Sets the observed value.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Sets the noise variance.
    pub fn set_noise(&mut self, variance: f64) {
        self.variance = variance;
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn noise_variance(&self) -> f64 {
        self.variance
    }

    /// Adds one design coefficient. Families that are not estimated are
    /// silently skipped: a configuration omission is not an error.
    pub fn add_coefficient(&mut self, key: StateKey, coefficient: f64, init: &InitialState) {
        if !init.estimate {
            return;
        }
        self.coefficients.push((key, coefficient, init.clone()));
    }

    /// Iterates (key, coefficient) pairs of the design row.
    pub fn coefficients(&self) -> impl Iterator<Item = (&StateKey, f64)> {
        self.coefficients.iter().map(|(key, coeff, _)| (key, *coeff))
    }

    /// Design coefficient on this [StateKey], if referenced.
    pub fn coefficient(&self, key: &StateKey) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|(k, _, _)| k == key)
            .map(|(_, coeff, _)| *coeff)
    }
}

/// Consolidated linear system, stacked from a [MeasurementEntry] list
/// against stable slot indexes.
#[derive(Debug, Clone)]
pub struct CombinedMeasurements {
    /// Sampling [Epoch]
    pub epoch: Epoch,
    /// Stacked design matrix (rows × live slots)
    pub h: DMatrix<f64>,
    /// Stacked residual vector
    pub y: DVector<f64>,
    /// Diagonal noise variances
    pub r: DVector<f64>,
    /// Row identities
    pub keys: Vec<MeasurementKey>,
    /// Row tracking back references
    pub trackers: Vec<Option<SignalKey>>,
}

impl CombinedMeasurements {
    /// Number of stacked rows.
    pub fn len(&self) -> usize {
        self.y.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merges independently constructed entries into one consolidated
/// system. Every referenced [StateKey] not yet live is created here
/// (auto creation); the registry is flagged pending bootstrap when that
/// happens.
pub(crate) fn combine(
    registry: &mut StateRegistry,
    entries: &[MeasurementEntry],
    epoch: Epoch,
) -> CombinedMeasurements {
    let mut created = 0;

    for entry in entries {
        for (key, _, init) in &entry.coefficients {
            let (_, fresh) = registry.upsert(key, init);
            if fresh {
                created += 1;
            }
        }
    }

    if created > 0 {
        debug!("{} combine: {} new states pending bootstrap", epoch, created);
    }

    let rows = entries.len();
    let size = registry.len();

    let mut h = DMatrix::<f64>::zeros(rows, size);
    let mut y = DVector::<f64>::zeros(rows);
    let mut r = DVector::<f64>::zeros(rows);
    let mut keys = Vec::with_capacity(rows);
    let mut trackers = Vec::with_capacity(rows);

    for (row, entry) in entries.iter().enumerate() {
        for (key, coefficient, _) in &entry.coefficients {
            if let Some(column) = registry.index_of(key) {
                h[(row, column)] += *coefficient;
            }
        }
        y[row] = entry.value;
        r[row] = entry.variance;
        keys.push(entry.key.clone());
        trackers.push(entry.tracker.clone());
    }

    CombinedMeasurements {
        epoch,
        h,
        y,
        r,
        keys,
        trackers,
    }
}
