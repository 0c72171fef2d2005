use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::{
    prelude::Duration,
    state::{InitialState, ProcessNoise, StateKey},
};

/// Declared first order coupling between two live slots:
/// d(integrated)/dt = factor × rate.
#[derive(Debug, Clone, PartialEq)]
struct Transition {
    integrated: StateKey,
    rate: StateKey,
    factor: f64,
}

/// [StateRegistry] maps stable [StateKey]s to live slots of the state
/// vector and covariance matrix. Slots are created on first reference,
/// persist across epochs, and are removed with covariance compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRegistry {
    /// [StateKey] to slot index
    slots: HashMap<StateKey, usize>,
    /// Per key setup, kept for process noise propagation
    setup: HashMap<StateKey, InitialState>,
    /// State vector
    x: DVector<f64>,
    /// Covariance matrix, indexed consistently with the slot map
    p: DMatrix<f64>,
    /// Declared value/rate couplings
    transitions: Vec<Transition>,
    /// Keys created since the last bootstrap
    fresh: Vec<StateKey>,
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            setup: HashMap::new(),
            x: DVector::zeros(0),
            p: DMatrix::zeros(0, 0),
            transitions: Vec::new(),
            fresh: Vec::new(),
        }
    }
}

impl StateRegistry {
    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no slot is live.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True if this [StateKey] owns a live slot.
    pub fn contains(&self, key: &StateKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Slot index of this [StateKey].
    pub fn index_of(&self, key: &StateKey) -> Option<usize> {
        self.slots.get(key).copied()
    }

    /// Iterates all live [StateKey]s (unordered).
    pub fn keys(&self) -> impl Iterator<Item = &StateKey> {
        self.slots.keys()
    }

    /// All live [StateKey]s, in a stable order (for diagnostics and
    /// deterministic traversals).
    pub fn keys_sorted(&self) -> Vec<StateKey> {
        self.slots
            .keys()
            .sorted_by_key(|k| k.to_string())
            .cloned()
            .collect()
    }

    /// Current value of this [StateKey].
    pub fn value(&self, key: &StateKey) -> Option<f64> {
        let index = self.index_of(key)?;
        Some(self.x[index])
    }

    /// Current value and variance of this [StateKey].
    pub fn value_and_variance(&self, key: &StateKey) -> Option<(f64, f64)> {
        let index = self.index_of(key)?;
        Some((self.x[index], self.p[(index, index)]))
    }

    /// Overwrites the value of this [StateKey], without touching the
    /// covariance. Returns false if the key has no live slot.
    pub fn set_value(&mut self, key: &StateKey, value: f64) -> bool {
        match self.index_of(key) {
            Some(index) => {
                self.x[index] = value;
                true
            },
            None => false,
        }
    }

    /// Creates a slot for this [StateKey] if it has none, initialized
    /// from [InitialState] with zero cross covariance. No-op if the key
    /// is already live. Returns (slot index, created).
    pub fn upsert(&mut self, key: &StateKey, init: &InitialState) -> (usize, bool) {
        if let Some(index) = self.index_of(key) {
            return (index, false);
        }

        let index = self.len();

        let x = std::mem::replace(&mut self.x, DVector::zeros(0));
        self.x = x.insert_row(index, init.value);

        let p = std::mem::replace(&mut self.p, DMatrix::zeros(0, 0));
        let mut p = p.insert_row(index, 0.0).insert_column(index, 0.0);
        p[(index, index)] = init.variance;
        self.p = p;

        self.slots.insert(key.clone(), index);
        self.setup.insert(key.clone(), init.clone());
        self.fresh.push(key.clone());

        debug!("new state {} x={:.3e} p={:.3e}", key, init.value, init.variance);

        (index, true)
    }

    /// Removes this [StateKey]'s slot, collapsing the corresponding
    /// covariance row/column and renumbering the survivors. Logged and
    /// non fatal if the key has no live slot. A removed key referenced
    /// again later is treated as brand new.
    pub fn remove(&mut self, key: &StateKey) -> bool {
        let index = match self.slots.remove(key) {
            Some(index) => index,
            None => {
                debug!("remove: {} has no live slot", key);
                return false;
            },
        };

        let x = std::mem::replace(&mut self.x, DVector::zeros(0));
        self.x = x.remove_row(index);

        let p = std::mem::replace(&mut self.p, DMatrix::zeros(0, 0));
        self.p = p.remove_row(index).remove_column(index);

        for slot in self.slots.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }

        self.setup.remove(key);
        self.fresh.retain(|k| k != key);
        self.transitions
            .retain(|t| t.integrated != *key && t.rate != *key);

        debug!("removed state {}", key);

        true
    }

    /// Declares that `rate` is the time derivative companion of
    /// `integrated`, with given coupling factor. The rate slot is
    /// created from [InitialState] if needed; nothing is declared when
    /// the rate family is not estimated.
    pub fn link_transition(
        &mut self,
        integrated: &StateKey,
        rate: &StateKey,
        factor: f64,
        init: &InitialState,
    ) {
        if !init.estimate {
            return;
        }

        self.upsert(rate, init);

        let exists = self
            .transitions
            .iter()
            .any(|t| t.integrated == *integrated && t.rate == *rate);

        if !exists {
            self.transitions.push(Transition {
                integrated: integrated.clone(),
                rate: rate.clone(),
                factor,
            });
        }
    }

    /// Advances all live slots across the elapsed interval: linear
    /// couplings move the integrated values, random walks inflate the
    /// variances, Gauss-Markov slots decay toward zero and relax toward
    /// their stationary variance. Unobserved keys still decay, which is
    /// what lets their uncertainty grow until pruned or re-observed.
    pub fn advance(&mut self, dt: Duration) {
        let dt_s = dt.to_seconds();
        if dt_s <= 0.0 || self.is_empty() {
            return;
        }

        let size = self.len();
        let mut f = DMatrix::<f64>::identity(size, size);

        for transition in &self.transitions {
            let integrated = self.slots.get(&transition.integrated);
            let rate = self.slots.get(&transition.rate);
            if let (Some(&i), Some(&j)) = (integrated, rate) {
                f[(i, j)] += transition.factor * dt_s;
            }
        }

        for (key, &index) in &self.slots {
            if let Some(setup) = self.setup.get(key) {
                if let ProcessNoise::GaussMarkov { tau_s, .. } = setup.process_noise {
                    if tau_s > 0.0 {
                        f[(index, index)] = (-dt_s / tau_s).exp();
                    }
                }
            }
        }

        self.x = &f * &self.x;
        self.p = &f * &self.p * f.transpose();

        for (key, &index) in &self.slots {
            let setup = match self.setup.get(key) {
                Some(setup) => setup,
                None => continue,
            };
            match setup.process_noise {
                ProcessNoise::None => {},
                ProcessNoise::RandomWalk { q } => {
                    self.p[(index, index)] += q * dt_s;
                },
                ProcessNoise::GaussMarkov { tau_s, sigma } => {
                    if tau_s > 0.0 {
                        let stationary = sigma * sigma;
                        self.p[(index, index)] += stationary * (1.0 - (-2.0 * dt_s / tau_s).exp());
                    }
                },
            }
        }
    }

    /// True when slots created since the last bootstrap are pending a
    /// least squares initialization.
    pub fn pending_bootstrap(&self) -> bool {
        !self.fresh.is_empty()
    }

    /// Slot indexes pending initialization.
    pub(crate) fn fresh_indexes(&self) -> Vec<usize> {
        self.fresh
            .iter()
            .filter_map(|key| self.index_of(key))
            .collect()
    }

    pub(crate) fn clear_fresh(&mut self) {
        self.fresh.clear();
    }

    pub(crate) fn vector(&self) -> &DVector<f64> {
        &self.x
    }

    pub(crate) fn covariance(&self) -> &DMatrix<f64> {
        &self.p
    }

    pub(crate) fn set_estimate(&mut self, x: DVector<f64>, p: DMatrix<f64>) {
        debug_assert_eq!(x.nrows(), self.len());
        debug_assert_eq!(p.nrows(), self.len());
        self.x = x;
        self.p = p;
    }

    pub(crate) fn set_slot(&mut self, index: usize, value: f64, variance: f64) {
        self.x[index] = value;
        self.p[(index, index)] = variance;
    }

    /// Dimension invariant, verified by the test bench after every epoch.
    pub fn dims_consistent(&self) -> bool {
        self.x.nrows() == self.slots.len()
            && self.p.nrows() == self.slots.len()
            && self.p.ncols() == self.slots.len()
    }
}
