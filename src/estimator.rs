use std::collections::HashMap;

use log::{debug, info, warn};

use crate::{
    cfg::{Config, Pivot},
    clock::correct_receiver_clocks,
    constants::{R2MAS, S2MTS, SECONDS_PER_DAY},
    error::Error,
    measurement::{
        bootstrap, combine, filter_update, MeasurementEntry, MeasurementKey, MeasurementKind,
    },
    nav::{station_eop_partials, EopSource, NavigationData},
    prelude::{Constellation, Duration, Epoch, SV},
    prune::{remove_bad_ambiguities, remove_bad_ionospheres},
    receiver::{bias_group, Combination, Receiver},
    state::{InitialState, ProcessNoise, StateKey, StateRegistry},
    tracking::{SignalKey, TrackerTable},
};

/// Datum anchoring pseudo measurement noise (m)
const PSEUDO_MEAS_SIGMA_M: f64 = 1.0E-6;

/// Initial deviation of the anchored datum states (m)
const ANCHOR_SIGMA_M: f64 = 1.0E-4;

/// Outcome of one successfully filtered epoch.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    /// Sampling [Epoch]
    pub epoch: Epoch,
    /// Stacked measurements this epoch (pseudo measurements included)
    pub measurements: usize,
    /// Live filter states after the update
    pub states: usize,
    /// True if brand new states were least squares initialized
    pub bootstrapped: bool,
}

/// [NetworkEstimator] jointly estimates clocks, positions, troposphere,
/// ambiguities, orbit corrections and Earth orientation parameters for
/// a whole receiver network, one epoch at a time.
///
/// Epoch pipeline: prune diverged/stale states, increment outage
/// counters, build one code and one phase measurement per receiver,
/// satellite and signal of interest, anchor the clock datum on the
/// pivot receiver, predict, combine, bootstrap brand new states, run
/// the Kalman update, then correct receiver clock wraparounds.
///
/// Failed epochs ([Error::NoReferenceReceiver], singular matrices)
/// leave the filter exactly as it was and are retried on the next
/// epoch's data.
pub struct NetworkEstimator {
    cfg: Config,
    registry: StateRegistry,
    /// Reference receiver, selected once per lifetime
    pivot: Option<String>,
    prev_epoch: Option<Epoch>,
}

impl NetworkEstimator {
    /// Builds a new [NetworkEstimator] from this [Config].
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            registry: StateRegistry::default(),
            pivot: None,
            prev_epoch: None,
        }
    }

    /// Current [Config].
    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Read access to the filter [StateRegistry], for downstream
    /// consumers (correction encoding, diagnostics).
    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    /// Mutable access to the filter [StateRegistry], for external
    /// contributors (ionosphere estimation).
    pub fn registry_mut(&mut self) -> &mut StateRegistry {
        &mut self.registry
    }

    /// Selected reference receiver, once established.
    pub fn pivot(&self) -> Option<&str> {
        self.pivot.as_deref()
    }

    /// Runs one estimation epoch over the network.
    pub fn run_epoch<E: EopSource>(
        &mut self,
        t: Epoch,
        receivers: &mut [Receiver],
        trackers: &mut TrackerTable,
        nav: &NavigationData<E>,
    ) -> Result<EpochSummary, Error> {
        info!("{} network estimation", t);

        remove_bad_ambiguities(&self.cfg, &mut self.registry, trackers);
        remove_bad_ionospheres(&self.cfg, &mut self.registry);

        trackers.increment_outages();

        self.seed_apriori_sigmas(receivers);

        let snapshot = self.registry.clone();
        let had_pivot = self.pivot.is_some();

        let visibility = Self::count_covisibility(&self.cfg, receivers);
        let entries = self.build_entries(t, receivers, trackers, nav, &visibility);

        let pivot_id = match &self.pivot {
            Some(id) => id.clone(),
            None => {
                warn!("{} no reference receiver found, skipping filter", t);
                self.rollback(snapshot, had_pivot);
                return Err(Error::NoReferenceReceiver);
            },
        };

        let dt = match self.prev_epoch {
            Some(prev) => t - prev,
            None => Duration::ZERO,
        };
        self.registry.advance(dt);

        let combined = combine(&mut self.registry, &entries, t);

        let bootstrapped = self.registry.pending_bootstrap();
        if bootstrapped {
            if let Err(e) = bootstrap(&mut self.registry, &combined) {
                warn!("{} bootstrap failed: {}", t, e);
                self.rollback(snapshot, had_pivot);
                return Err(e);
            }
        }

        if let Err(e) = filter_update(&mut self.registry, &combined) {
            warn!("{} filter update failed: {}", t, e);
            self.rollback(snapshot, had_pivot);
            return Err(e);
        }

        correct_receiver_clocks(&self.cfg, &mut self.registry, receivers, &pivot_id);

        // signals whose phase entered the accepted update are in active
        // use again
        for signal in combined.trackers.iter().flatten() {
            let tracker = trackers.tracker_mut(signal);
            tracker.outage_count = 0;
            tracker.reject_count = 0;
        }

        self.prev_epoch = Some(t);

        Ok(EpochSummary {
            epoch: t,
            measurements: combined.len(),
            states: self.registry.len(),
            bootstrapped,
        })
    }

    /// Restores the epoch start snapshot. A pivot selected during the
    /// failed epoch is unselected too: its datum anchor states were
    /// erased with the rollback, and the anchors are only injected at
    /// selection time.
    fn rollback(&mut self, snapshot: StateRegistry, had_pivot: bool) {
        self.registry = snapshot;
        if !had_pivot {
            self.pivot = None;
        }
    }

    /// Counts how many receivers jointly observe each satellite: one
    /// receiver alone cannot separate its clock from the satellite's.
    fn count_covisibility(cfg: &Config, receivers: &[Receiver]) -> HashMap<SV, usize> {
        let mut visibility = HashMap::new();
        for rec in receivers {
            for obs in &rec.observations {
                if cfg.constellations.contains(&obs.sv.constellation) {
                    *visibility.entry(obs.sv).or_insert(0) += 1;
                }
            }
        }
        visibility
    }

    /// Seeds unset apriori position deviations from the configured
    /// initial variance.
    fn seed_apriori_sigmas(&self, receivers: &mut [Receiver]) {
        for axis in 0..3 {
            let init = self.cfg.rec_position.initial_state(axis);
            if !init.estimate {
                continue;
            }
            for rec in receivers.iter_mut() {
                if rec.apriori_sigma_m[axis] == 0.0 {
                    rec.apriori_sigma_m[axis] = init.variance.sqrt();
                }
            }
        }
    }

    /// Builds all measurement entries for this epoch, receiver major,
    /// satellite/signal minor. Selects the pivot receiver on first
    /// match and injects its two datum anchoring pseudo measurements.
    pub(crate) fn build_entries<E: EopSource>(
        &mut self,
        t: Epoch,
        receivers: &[Receiver],
        trackers: &mut TrackerTable,
        nav: &NavigationData<E>,
        visibility: &HashMap<SV, usize>,
    ) -> Vec<MeasurementEntry> {
        let mut entries = Vec::new();

        for rec in receivers {
            if rec.excluded || self.cfg.excluded_receivers.contains(&rec.id) {
                debug!("{} excluded from processing", rec.id);
                continue;
            }

            for obs in &rec.observations {
                let constellation = obs.sv.constellation;

                if !self.cfg.constellations.contains(&constellation) {
                    continue;
                }

                let joint = visibility.get(&obs.sv).copied().unwrap_or(0);

                if joint < 2 || obs.excluded || self.cfg.excluded_satellites.contains(&obs.sv) {
                    debug!("{}({}) cannot contribute this epoch", rec.id, obs.sv);
                    continue;
                }

                let combination = Combination::of_interest(constellation);

                let signal = match obs.signal(combination) {
                    Some(signal) => signal,
                    None => continue,
                };

                let frequency = combination.index();

                if self.pivot.is_none() {
                    let matches = match &self.cfg.pivot {
                        Pivot::Auto => true,
                        Pivot::Receiver(id) => *id == rec.id,
                    };
                    if matches {
                        info!("{} selected as reference receiver", rec.id);
                        self.pivot = Some(rec.id.clone());
                        self.anchor_datum(&mut entries, rec, constellation);
                    }
                }

                let is_pivot = self.pivot.as_deref() == Some(rec.id.as_str());

                let mut code = MeasurementEntry::new(MeasurementKey::new(
                    MeasurementKind::Code,
                    Some(obs.sv),
                    Some(&rec.id),
                    frequency,
                ));
                let mut phase = MeasurementEntry::new(MeasurementKey::new(
                    MeasurementKind::Phase,
                    Some(obs.sv),
                    Some(&rec.id),
                    frequency,
                ));

                let mut code_adjust = 0.0;
                let mut phase_adjust = 0.0;

                // receiver clock, with optional drift companions, plus
                // inter-system bias away from the primary constellation.
                // The pivot's clock is the datum, not estimated.
                if !is_pivot {
                    let init = self.cfg.rec_clock.initial_state(0);
                    if init.estimate {
                        let clock = StateKey::rec_sys_bias(&rec.id, 0);

                        code.add_coefficient(clock.clone(), 1.0, &init);
                        phase.add_coefficient(clock.clone(), 1.0, &init);

                        self.registry.link_transition(
                            &clock,
                            &StateKey::rec_sys_bias_rate(&rec.id, 0),
                            1.0,
                            &self.cfg.rec_clock_rate.initial_state(0),
                        );
                        self.registry.link_transition(
                            &clock,
                            &StateKey::rec_sys_bias_rate_gm(&rec.id, 0),
                            1.0,
                            &self.cfg.rec_clock_rate_gm.initial_state(0),
                        );

                        if constellation != Constellation::GPS {
                            let isb =
                                StateKey::rec_sys_bias(&rec.id, bias_group(constellation));
                            code.add_coefficient(isb.clone(), 1.0, &init);
                            phase.add_coefficient(isb, 1.0, &init);
                        }
                    }
                }

                // receiver position
                for axis in 0..3 {
                    let init = self.cfg.rec_position.initial_state(axis);
                    let key = StateKey::rec_position(&rec.id, axis as u16);
                    let coefficient = -obs.line_of_sight[axis];
                    code.add_coefficient(key.clone(), coefficient, &init);
                    phase.add_coefficient(key, coefficient, &init);
                }

                // wet troposphere delay and gradients
                let init = self.cfg.tropo.initial_state(0);
                code.add_coefficient(StateKey::tropo(&rec.id, 0), obs.map_wet, &init);
                phase.add_coefficient(StateKey::tropo(&rec.id, 0), obs.map_wet, &init);

                let init = self.cfg.tropo_gm.initial_state(0);
                code.add_coefficient(StateKey::tropo_gm(&rec.id, 0), obs.map_wet, &init);
                phase.add_coefficient(StateKey::tropo_gm(&rec.id, 0), obs.map_wet, &init);

                let gradients = [obs.map_wet_gradients.0, obs.map_wet_gradients.1];

                for i in 0..2 {
                    let init = self.cfg.tropo_gradients.initial_state(i);
                    let key = StateKey::tropo(&rec.id, (i + 1) as u16);
                    code.add_coefficient(key.clone(), gradients[i], &init);
                    phase.add_coefficient(key, gradients[i], &init);

                    let init = self.cfg.tropo_gradients_gm.initial_state(i);
                    let key = StateKey::tropo_gm(&rec.id, (i + 1) as u16);
                    code.add_coefficient(key.clone(), gradients[i], &init);
                    phase.add_coefficient(key, gradients[i], &init);
                }

                // satellite clock, with optional drift companions
                let init = self.cfg.sat_clock.initial_state(0);
                if init.estimate {
                    let clock = StateKey::sat_clock(obs.sv);

                    code.add_coefficient(clock.clone(), -1.0, &init);
                    phase.add_coefficient(clock.clone(), -1.0, &init);

                    self.registry.link_transition(
                        &clock,
                        &StateKey::sat_clock_rate(obs.sv),
                        1.0,
                        &self.cfg.sat_clock_rate.initial_state(0),
                    );
                    self.registry.link_transition(
                        &clock,
                        &StateKey::sat_clock_rate_gm(obs.sv),
                        1.0,
                        &self.cfg.sat_clock_rate_gm.initial_state(0),
                    );
                }

                // phase ambiguity
                let init = self.cfg.ambiguity.initial_state(frequency as usize);
                if init.estimate {
                    phase.add_coefficient(
                        StateKey::ambiguity(obs.sv, &rec.id, frequency),
                        1.0,
                        &init,
                    );

                    let signal_key = SignalKey::new(&rec.id, obs.sv, frequency);
                    trackers.tracker_mut(&signal_key);
                    phase.tracker = Some(signal_key);
                }

                // orbit correction coefficients
                if self.cfg.orbit.estimate {
                    if let Some(orbit) = nav.orbit_partials.get(&obs.sv) {
                        let projected = orbit.project(&obs.line_of_sight);

                        for (i, name) in orbit.parameters.iter().enumerate() {
                            let init = self.cfg.orbit.initial_state(i);
                            if !init.estimate {
                                continue;
                            }

                            let label = format!("{:02}_{}", i, name);
                            let key = StateKey::orbit_correction(obs.sv, &label);

                            code.add_coefficient(key.clone(), projected[i], &init);
                            phase.add_coefficient(key, projected[i], &init);
                        }
                    }
                }

                // Earth orientation: the filter estimates corrections
                // to the published values, injected into the residual
                if self.cfg.eop.estimate {
                    let partials = station_eop_partials(&rec.apriori_position_ecef_m);
                    let eop_partials = partials * obs.line_of_sight;

                    let erp_0 = nav.eop.eop_at(t);
                    let erp_1 = nav.eop.eop_at(t + Duration::from_seconds(1.0));

                    for (i, label) in ["xp", "yp", "ut1"].iter().enumerate() {
                        let init = self.cfg.eop.initial_state(i);
                        if !init.estimate {
                            continue;
                        }

                        let scale = if i < 2 { R2MAS } else { S2MTS };
                        let init = init.with_value(erp_0.vals()[i] * scale);

                        code_adjust += eop_partials[i] * init.value;
                        phase_adjust += eop_partials[i] * init.value;

                        code.add_coefficient(StateKey::eop(label), eop_partials[i], &init);
                        phase.add_coefficient(StateKey::eop(label), eop_partials[i], &init);

                        let rate_init = self.cfg.eop_rate.initial_state(i);
                        if rate_init.estimate {
                            // forward difference, scaled to per day
                            let rate_init = rate_init.with_value(
                                (erp_1.vals()[i] - erp_0.vals()[i]) * scale * SECONDS_PER_DAY,
                            );

                            self.registry.link_transition(
                                &StateKey::eop(label),
                                &StateKey::eop_rate(label),
                                1.0 / SECONDS_PER_DAY,
                                &rate_init,
                            );
                        }
                    }
                }

                code.set_value(signal.code_residual_m + code_adjust);
                phase.set_value(signal.phase_residual_m + phase_adjust);

                code.set_noise(signal.code_variance);
                phase.set_noise(signal.phase_variance);

                entries.push(code);
                entries.push(phase);
            }
        }

        entries
    }

    /// Anchors the pivot receiver's primary clock bias and inter-system
    /// bias to zero through two near perfect pseudo measurements,
    /// resolving the rank deficient network clock datum. All other
    /// clock states are estimated relative to this datum.
    fn anchor_datum(
        &mut self,
        entries: &mut Vec<MeasurementEntry>,
        rec: &Receiver,
        constellation: Constellation,
    ) {
        let anchor = InitialState::new(0.0, ANCHOR_SIGMA_M * ANCHOR_SIGMA_M, ProcessNoise::None);

        let mut pseudo = MeasurementEntry::new(MeasurementKey::new(
            MeasurementKind::Pseudo,
            None,
            Some(&rec.id),
            0,
        ));
        pseudo.set_value(0.0);
        pseudo.set_noise(PSEUDO_MEAS_SIGMA_M * PSEUDO_MEAS_SIGMA_M);
        pseudo.add_coefficient(StateKey::ref_sys_bias(&rec.id, 0), 1.0, &anchor);
        entries.push(pseudo);

        let mut pseudo = MeasurementEntry::new(MeasurementKey::new(
            MeasurementKind::Pseudo,
            None,
            Some(&rec.id),
            1,
        ));
        pseudo.set_value(0.0);
        pseudo.set_noise(PSEUDO_MEAS_SIGMA_M * PSEUDO_MEAS_SIGMA_M);
        pseudo.add_coefficient(
            StateKey::rec_sys_bias(&rec.id, bias_group(constellation)),
            1.0,
            &anchor,
        );
        entries.push(pseudo);
    }
}
