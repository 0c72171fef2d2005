#![doc = include_str!("../README.md")]
#![cfg_attr(docrs, feature(doc_cfg))]

extern crate gnss_rs as gnss;

// private modules
mod cfg;
mod clock;
mod constants;
mod error;
mod estimator;
mod measurement;
mod nav;
mod prune;
mod receiver;
mod state;
mod tracking;

#[cfg(test)]
mod tests;

// prelude
pub mod prelude {
    pub use crate::cfg::{Config, Pivot, SlipExclusions, StateSpec};
    pub use crate::constants::{CLOCK_WRAP_DISTANCE_M, SPEED_OF_LIGHT_M_S};
    pub use crate::error::Error;
    pub use crate::estimator::{EpochSummary, NetworkEstimator};
    pub use crate::measurement::{
        CombinedMeasurements, MeasurementEntry, MeasurementKey, MeasurementKind,
    };
    pub use crate::nav::{EopSource, EopTable, EopValues, NavigationData, OrbitPartials};
    pub use crate::receiver::{
        Combination, Observation, Receiver, ReceiverSolution, SignalObservation,
    };
    pub use crate::state::{InitialState, ProcessNoise, StateKey, StateRegistry, StateType};
    pub use crate::tracking::{SignalKey, SignalTracker, SlipFlags, TrackerTable};
    // re-export
    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::{Duration, Epoch, TimeScale};
    pub use nalgebra::{DMatrix, DVector, Vector3};
}
