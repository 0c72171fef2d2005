use std::collections::HashMap;

use crate::prelude::SV;

/// Cycle slip flags, one per detector, raised by the observation
/// preprocessor and consumed by the ambiguity pruning policy.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SlipFlags {
    /// Raw phase jump (loss of lock indicator)
    pub lli: bool,
    /// Geometry free combination jump
    pub gf: bool,
    /// Melbourne-Wübbena combination jump
    pub mw: bool,
    /// Extra wide lane combination jump
    pub emw: bool,
    /// Single frequency jump
    pub cj: bool,
    /// Composite detector
    pub scdia: bool,
}

impl SlipFlags {
    /// True if any detector fired.
    pub fn any(&self) -> bool {
        self.lli || self.gf || self.mw || self.emw || self.cj || self.scdia
    }
}

/// Addresses the tracking state of one signal:
/// (receiver, satellite, frequency index).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    pub receiver: String,
    pub sv: SV,
    pub frequency: u16,
}

impl SignalKey {
    pub fn new(receiver: &str, sv: SV, frequency: u16) -> Self {
        Self {
            receiver: receiver.to_string(),
            sv,
            frequency,
        }
    }
}

/// Per signal tracking state.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SignalTracker {
    /// Epochs since this signal's phase was last used
    pub outage_count: u32,
    /// Epochs since this signal's phase was last rejected
    pub reject_count: u32,
    /// [SlipFlags] raised by the preprocessor
    pub slip: SlipFlags,
}

/// Mutable side table of [SignalTracker]s, owned by the observation
/// collaborator and mutated by the estimator. Replaces live pointers
/// inside filter keys with explicit (receiver, satellite, frequency)
/// addressing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackerTable {
    inner: HashMap<SignalKey, SignalTracker>,
}

impl TrackerTable {
    /// Read access to one [SignalTracker].
    pub fn get(&self, key: &SignalKey) -> Option<&SignalTracker> {
        self.inner.get(key)
    }

    /// Mutable access, creating a blank [SignalTracker] on first use.
    pub fn tracker_mut(&mut self, key: &SignalKey) -> &mut SignalTracker {
        self.inner.entry(key.clone()).or_default()
    }

    /// Increments every tracked signal's outage counter, once per epoch.
    pub fn increment_outages(&mut self) {
        for tracker in self.inner.values_mut() {
            tracker.outage_count += 1;
        }
    }

    /// Number of tracked signals.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates all (key, tracker) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&SignalKey, &SignalTracker)> {
        self.inner.iter()
    }
}
