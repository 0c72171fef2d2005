use log::debug;

use crate::{
    cfg::Config,
    receiver::Combination,
    state::{StateKey, StateRegistry, StateType},
    tracking::{SignalKey, TrackerTable},
};

/// Removes ambiguity states deemed old or bad, at epoch start. They are
/// recreated as brand new states when the signal reappears, which is
/// the simple recovery path for cycle slips.
pub(crate) fn remove_bad_ambiguities(
    cfg: &Config,
    registry: &mut StateRegistry,
    trackers: &mut TrackerTable,
) {
    for key in registry.keys_sorted() {
        if key.state_type != StateType::Ambiguity {
            continue;
        }

        let (sv, receiver) = match (key.sv, &key.receiver) {
            (Some(sv), Some(receiver)) => (sv, receiver.clone()),
            _ => continue,
        };

        let signal = SignalKey::new(&receiver, sv, key.index);
        let tracker = *trackers.tracker_mut(&signal);

        if tracker.outage_count >= cfg.outage_limit {
            trackers.tracker_mut(&signal).outage_count = 0;

            debug!("ambiguity removed due to long outage: {}", key);
            registry.remove(&key);
            continue;
        }

        if tracker.reject_count >= cfg.reject_limit {
            trackers.tracker_mut(&signal).reject_count = 0;

            debug!("ambiguity removed due to high reject count: {}", key);
            registry.remove(&key);
            cascade(cfg, registry, sv, &receiver);
            continue;
        }

        if cfg.reinit_on_all_slips && tracker.slip.any() {
            // detectors are evaluated on the first frequency signal
            let first = SignalKey::new(&receiver, sv, 0);
            let slip = trackers.tracker_mut(&first).slip;
            let excl = &cfg.slip_exclusions;

            let fired = (excl.lli && slip.lli)
                || (excl.gf && slip.gf)
                || (excl.mw && slip.mw)
                || (excl.emw && slip.emw)
                || (excl.cj && slip.cj)
                || (excl.scdia && slip.scdia);

            if fired {
                debug!("ambiguity removed due to cycle slip detection: {}", key);
                registry.remove(&key);
                cascade(cfg, registry, sv, &receiver);
            }
        }
    }
}

/// When ambiguities across frequencies share one process model (the per
/// frequency rate family is disabled), removal extends to this
/// receiver/satellite's ambiguity on every other tracked frequency.
fn cascade(
    cfg: &Config,
    registry: &mut StateRegistry,
    sv: crate::prelude::SV,
    receiver: &str,
) {
    if cfg.ambiguity_rate.estimate {
        return;
    }

    for frequency in 0..Combination::COUNT {
        let key = StateKey::ambiguity(sv, receiver, frequency);
        if registry.contains(&key) {
            debug!("ambiguity removal cascades to: {}", key);
            registry.remove(&key);
        }
    }
}

/// Removes ionosphere slant delay states whose posterior variance grew
/// past the configured ceiling: the state diverged beyond recoverable
/// confidence.
pub(crate) fn remove_bad_ionospheres(cfg: &Config, registry: &mut StateRegistry) {
    for key in registry.keys_sorted() {
        if key.state_type != StateType::IonoStec {
            continue;
        }

        if let Some((_, variance)) = registry.value_and_variance(&key) {
            if variance > cfg.iono_variance_ceiling {
                debug!(
                    "ionosphere removed due to high variance: {} p={:.1}",
                    key, variance,
                );
                registry.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        prelude::{Constellation, SV},
        state::{InitialState, ProcessNoise},
    };

    fn ambiguity_init() -> InitialState {
        InitialState::new(0.0, 1.0E4, ProcessNoise::None)
    }

    fn setup(sv: SV, receiver: &str, frequencies: &[u16]) -> StateRegistry {
        let mut registry = StateRegistry::default();
        for &frequency in frequencies {
            registry.upsert(
                &StateKey::ambiguity(sv, receiver, frequency),
                &ambiguity_init(),
            );
        }
        registry.clear_fresh();
        registry
    }

    #[test]
    fn outage_boundary() {
        let g01 = SV::new(Constellation::GPS, 1);
        let cfg = Config::default();

        let mut registry = setup(g01, "AREG", &[0]);
        let mut trackers = TrackerTable::default();

        let signal = SignalKey::new("AREG", g01, 0);

        // one below the limit: retained
        trackers.tracker_mut(&signal).outage_count = cfg.outage_limit - 1;
        remove_bad_ambiguities(&cfg, &mut registry, &mut trackers);
        assert!(registry.contains(&StateKey::ambiguity(g01, "AREG", 0)));

        // exactly at the limit: removed, counter reset
        trackers.tracker_mut(&signal).outage_count = cfg.outage_limit;
        remove_bad_ambiguities(&cfg, &mut registry, &mut trackers);
        assert!(!registry.contains(&StateKey::ambiguity(g01, "AREG", 0)));
        assert_eq!(trackers.get(&signal).unwrap().outage_count, 0);
    }

    #[test]
    fn pruning_is_idempotent() {
        let g01 = SV::new(Constellation::GPS, 1);
        let cfg = Config::default();

        let mut registry = setup(g01, "AREG", &[0]);
        let mut trackers = TrackerTable::default();

        let signal = SignalKey::new("AREG", g01, 0);
        trackers.tracker_mut(&signal).outage_count = cfg.outage_limit;

        remove_bad_ambiguities(&cfg, &mut registry, &mut trackers);
        let after_first = registry.len();

        remove_bad_ambiguities(&cfg, &mut registry, &mut trackers);
        assert_eq!(
            registry.len(),
            after_first,
            "second pass with no new data must remove nothing",
        );
    }

    #[test]
    fn reject_removal_cascades_across_frequencies() {
        let g01 = SV::new(Constellation::GPS, 1);
        let mut cfg = Config::default();
        cfg.ambiguity_rate = crate::cfg::StateSpec::disabled();

        let mut registry = setup(g01, "AREG", &[0, 1]);
        let mut trackers = TrackerTable::default();

        trackers
            .tracker_mut(&SignalKey::new("AREG", g01, 0))
            .reject_count = cfg.reject_limit;

        remove_bad_ambiguities(&cfg, &mut registry, &mut trackers);

        assert!(!registry.contains(&StateKey::ambiguity(g01, "AREG", 0)));
        assert!(
            !registry.contains(&StateKey::ambiguity(g01, "AREG", 1)),
            "frequencies move together: removal must cascade",
        );
    }

    #[test]
    fn no_cascade_with_per_frequency_rates() {
        let g01 = SV::new(Constellation::GPS, 1);
        let mut cfg = Config::default();
        cfg.ambiguity_rate = crate::cfg::StateSpec::new(0.0, 1.0, ProcessNoise::None);

        let mut registry = setup(g01, "AREG", &[0, 1]);
        let mut trackers = TrackerTable::default();

        trackers
            .tracker_mut(&SignalKey::new("AREG", g01, 0))
            .reject_count = cfg.reject_limit;

        remove_bad_ambiguities(&cfg, &mut registry, &mut trackers);

        assert!(!registry.contains(&StateKey::ambiguity(g01, "AREG", 0)));
        assert!(registry.contains(&StateKey::ambiguity(g01, "AREG", 1)));
    }

    #[test]
    fn slip_detection_on_first_frequency() {
        let g01 = SV::new(Constellation::GPS, 1);
        let cfg = Config::default();

        let mut registry = setup(g01, "AREG", &[0, 1]);
        let mut trackers = TrackerTable::default();

        // GF jump flagged on L1, enabled by default exclusions
        let tracker = trackers.tracker_mut(&SignalKey::new("AREG", g01, 0));
        tracker.slip.gf = true;

        // the second frequency tracker carries the same flag through
        // its own `any` gate
        trackers
            .tracker_mut(&SignalKey::new("AREG", g01, 1))
            .slip
            .gf = true;

        remove_bad_ambiguities(&cfg, &mut registry, &mut trackers);

        assert!(!registry.contains(&StateKey::ambiguity(g01, "AREG", 0)));
        assert!(!registry.contains(&StateKey::ambiguity(g01, "AREG", 1)));
    }

    #[test]
    fn iono_variance_ceiling() {
        let g01 = SV::new(Constellation::GPS, 1);
        let cfg = Config::default();

        let mut registry = StateRegistry::default();

        let healthy = StateKey::iono_stec(g01, "AREG");
        let diverged = StateKey::iono_stec(g01, "CEBR");

        registry.upsert(&healthy, &InitialState::new(1.0, 9_999.0, ProcessNoise::None));
        registry.upsert(&diverged, &InitialState::new(1.0, 10_001.0, ProcessNoise::None));
        registry.clear_fresh();

        remove_bad_ionospheres(&cfg, &mut registry);

        assert!(registry.contains(&healthy));
        assert!(!registry.contains(&diverged));
        assert!(registry.dims_consistent());
    }
}
