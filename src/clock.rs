use log::debug;

use crate::{
    cfg::Config,
    constants::CLOCK_WRAP_DISTANCE_M,
    prelude::SPEED_OF_LIGHT_M_S,
    receiver::Receiver,
    state::{StateKey, StateRegistry},
};

/// Checks and corrects receiver clock jitter and millisecond counter
/// wraparounds, comparing each receiver's code derived clock bias
/// against the reference receiver's. The correction adjusts the stored
/// filter value directly, without perturbing the covariance.
pub(crate) fn correct_receiver_clocks(
    cfg: &Config,
    registry: &mut StateRegistry,
    receivers: &mut [Receiver],
    pivot_id: &str,
) {
    let reference_bias_m = match receivers.iter().find(|rec| rec.id == pivot_id) {
        Some(reference) => reference.solution.clock_bias_m,
        None => return,
    };

    let tolerance_m = SPEED_OF_LIGHT_M_S * cfg.clock_wrap_tolerance_s;

    for rec in receivers.iter_mut() {
        let key = StateKey::rec_sys_bias(&rec.id, 0);

        let old_bias = match registry.value(&key) {
            Some(value) => value,
            None => continue,
        };

        let delta_bias = rec.solution.clock_bias_m - reference_bias_m;
        let delta_delta = delta_bias - rec.solution.previous_delta_m;

        if !cfg.rec_clock.estimate {
            // fixed parameter: pass the standalone estimate through,
            // bypassing the recursive update
            registry.set_value(&key, old_bias + delta_delta);
            debug!("adjusting {} clock by {:.3}", rec.id, delta_delta);
        } else if (delta_delta.abs() - CLOCK_WRAP_DISTANCE_M).abs() < tolerance_m {
            // undo a millisecond counter rollover, signed with the jump
            let wrap = if delta_delta > 0.0 {
                CLOCK_WRAP_DISTANCE_M
            } else {
                -CLOCK_WRAP_DISTANCE_M
            };
            registry.set_value(&key, old_bias + wrap);
            debug!("{} clock wraparound corrected by {:.3}", rec.id, wrap);
        }
        // otherwise the filter dynamics absorb the change

        rec.solution.previous_delta_m = delta_bias;
    }
}
