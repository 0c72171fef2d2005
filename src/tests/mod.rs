use log::LevelFilter;
use std::sync::Once;

use nalgebra::Vector3;

use crate::prelude::*;

mod network;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        env_logger::builder()
            .is_test(true)
            .filter_level(LevelFilter::Debug)
            .init();
    });
}

/// Reference test epoch
pub fn t0() -> Epoch {
    Epoch::from_gpst_seconds(1.0E9)
}

/// One GPS L1/L2 observation with plain geometry.
pub fn gps_observation(sv: SV, code_residual_m: f64, phase_residual_m: f64) -> Observation {
    Observation {
        sv,
        excluded: false,
        line_of_sight: Vector3::new(0.0, 0.0, 1.0),
        map_wet: 1.0,
        map_wet_gradients: (0.1, 0.05),
        signals: vec![SignalObservation {
            combination: Combination::If12,
            code_residual_m,
            phase_residual_m,
            code_variance: 1.0,
            phase_variance: 0.01,
        }],
    }
}

/// One network receiver observing given satellites.
pub fn receiver(id: &str, observations: Vec<Observation>) -> Receiver {
    let mut rec = Receiver::new(id, Vector3::new(1.0E6, 2.0E6, 3.0E6));
    rec.observations = observations;
    rec
}

/// Clock + ambiguity only setup: exactly determined by a 3 receivers /
/// 1 satellite network, troposphere turned off.
pub fn clocks_only_config() -> Config {
    let mut cfg = Config::default();
    cfg.tropo = StateSpec::disabled();
    cfg
}
