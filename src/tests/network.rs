use std::collections::HashMap;

use rstest::*;

use crate::{
    constants::{MAS2R, R2MAS},
    prelude::*,
    tests::{clocks_only_config, gps_observation, init_logger, receiver, t0},
};

#[fixture]
fn g01() -> SV {
    SV::new(Constellation::GPS, 1)
}

fn empty_nav() -> NavigationData<EopTable> {
    NavigationData::new(Default::default(), EopTable::new(vec![]))
}

/// 3 receivers tracking one satellite: exactly determined clock +
/// ambiguity network.
fn three_receivers(g01: SV) -> Vec<Receiver> {
    vec![
        receiver("R1", vec![gps_observation(g01, 1.0, 1.0)]),
        receiver("R2", vec![gps_observation(g01, 3.0, 3.5)]),
        receiver("R3", vec![gps_observation(g01, -2.0, -2.0)]),
    ]
}

#[rstest]
fn auto_pivot_network_solution(g01: SV) {
    init_logger();

    let mut estimator = NetworkEstimator::new(clocks_only_config());
    let mut receivers = three_receivers(g01);
    let mut trackers = TrackerTable::default();
    let nav = empty_nav();

    let summary = estimator
        .run_epoch(t0(), &mut receivers, &mut trackers, &nav)
        .unwrap_or_else(|e| panic!("epoch failed: {}", e));

    assert_eq!(
        estimator.pivot(),
        Some("R1"),
        "first receiver in iteration order must become the pivot",
    );

    // 3 code + 3 phase + 2 datum pseudo measurements
    assert_eq!(summary.measurements, 8);
    assert_eq!(summary.states, 8);
    assert!(summary.bootstrapped);

    let registry = estimator.registry();
    assert!(registry.dims_consistent());

    // datum anchored to zero
    let (datum, datum_var) = registry
        .value_and_variance(&StateKey::ref_sys_bias("R1", 0))
        .unwrap();
    assert!(datum.abs() < 1.0E-6);
    assert!(datum_var < 1.0E-6);

    let pivot_clock = registry.value(&StateKey::rec_sys_bias("R1", 0)).unwrap();
    assert!(pivot_clock.abs() < 1.0E-6);

    // pivot code: -sat = 1.0
    let sat_clock = registry.value(&StateKey::sat_clock(g01)).unwrap();
    assert!((sat_clock + 1.0).abs() < 1.0E-6);

    // R2 code: clk - sat = 3.0
    let r2_clock = registry.value(&StateKey::rec_sys_bias("R2", 0)).unwrap();
    assert!((r2_clock - 2.0).abs() < 1.0E-6);

    // R2 phase: clk - sat + amb = 3.5
    let r2_amb = registry
        .value(&StateKey::ambiguity(g01, "R2", 0))
        .unwrap();
    assert!((r2_amb - 0.5).abs() < 1.0E-6);

    // phase usage resets the outage counters
    for id in ["R1", "R2", "R3"] {
        let tracker = trackers.get(&SignalKey::new(id, g01, 0)).unwrap();
        assert_eq!(tracker.outage_count, 0);
        assert_eq!(tracker.reject_count, 0);
    }
}

#[rstest]
fn missing_pivot_leaves_registry_untouched(g01: SV) {
    init_logger();

    let mut cfg = clocks_only_config();
    cfg.pivot = Pivot::Receiver("XXXX".to_string());

    let mut estimator = NetworkEstimator::new(cfg);

    // filter memory from previous sessions
    estimator.registry_mut().upsert(
        &StateKey::sat_clock(g01),
        &InitialState::new(1.0, 2.0, ProcessNoise::None),
    );

    let before = estimator.registry().clone();

    let mut receivers = three_receivers(g01);
    let mut trackers = TrackerTable::default();
    let nav = empty_nav();

    let result = estimator.run_epoch(t0(), &mut receivers, &mut trackers, &nav);
    assert_eq!(result.unwrap_err(), Error::NoReferenceReceiver);

    assert_eq!(
        *estimator.registry(),
        before,
        "failed epoch must not corrupt state for the next retry",
    );

    // independently retried: pivot joins the network later
    receivers.push(receiver("XXXX", vec![gps_observation(g01, 0.0, 0.0)]));
    // XXXX iterates last but is the only valid pivot
    estimator
        .run_epoch(t0() + Duration::from_seconds(30.0), &mut receivers, &mut trackers, &nav)
        .unwrap_or_else(|e| panic!("retry failed: {}", e));

    assert_eq!(estimator.pivot(), Some("XXXX"));
}

#[rstest]
fn failed_selection_epoch_reselects_pivot(g01: SV) {
    init_logger();

    let mut estimator = NetworkEstimator::new(clocks_only_config());
    let mut trackers = TrackerTable::default();
    let nav = empty_nav();

    // a duplicated zero noise observation yields two identical rows
    // with no measurement noise: the innovation covariance is exactly
    // singular, after the pivot was already selected this epoch
    let mut receivers = three_receivers(g01);
    let mut bad = gps_observation(g01, 3.0, 3.5);
    bad.signals[0].code_variance = 0.0;
    bad.signals[0].phase_variance = 0.0;
    receivers[1].observations = vec![bad.clone(), bad];

    let result = estimator.run_epoch(t0(), &mut receivers, &mut trackers, &nav);
    assert_eq!(result.unwrap_err(), Error::SingularInnovation);

    assert!(estimator.registry().is_empty());
    assert!(
        estimator.pivot().is_none(),
        "a selection made by a rolled back epoch must not survive it",
    );

    // healthy data next epoch: selection runs again, datum re-anchored
    let mut receivers = three_receivers(g01);
    estimator
        .run_epoch(
            t0() + Duration::from_seconds(30.0),
            &mut receivers,
            &mut trackers,
            &nav,
        )
        .unwrap_or_else(|e| panic!("retry failed: {}", e));

    assert_eq!(estimator.pivot(), Some("R1"));

    let registry = estimator.registry();
    assert!(registry.contains(&StateKey::ref_sys_bias("R1", 0)));
    assert!(registry.contains(&StateKey::rec_sys_bias("R1", 0)));
    assert!(registry.dims_consistent());
}

#[rstest]
fn lone_receiver_cannot_form_network(g01: SV) {
    init_logger();

    let mut estimator = NetworkEstimator::new(clocks_only_config());

    let mut receivers = vec![receiver("R1", vec![gps_observation(g01, 1.0, 1.0)])];
    let mut trackers = TrackerTable::default();
    let nav = empty_nav();

    // the only satellite is seen by a single receiver
    let result = estimator.run_epoch(t0(), &mut receivers, &mut trackers, &nav);
    assert_eq!(result.unwrap_err(), Error::NoReferenceReceiver);
    assert!(estimator.registry().is_empty());
}

#[rstest]
fn datum_pseudo_measurements(g01: SV) {
    init_logger();

    let mut estimator = NetworkEstimator::new(clocks_only_config());

    let receivers = vec![
        receiver("R1", vec![gps_observation(g01, 1.0, 1.0)]),
        receiver("R2", vec![gps_observation(g01, 2.0, 2.0)]),
    ];

    let mut trackers = TrackerTable::default();
    let nav = empty_nav();

    let mut visibility = HashMap::new();
    visibility.insert(g01, 2);

    let entries = estimator.build_entries(t0(), &receivers, &mut trackers, &nav, &visibility);
    assert_eq!(entries.len(), 6);

    // pivot selection injects the two anchors first
    for (entry, key) in entries.iter().take(2).zip([
        StateKey::ref_sys_bias("R1", 0),
        StateKey::rec_sys_bias("R1", 0),
    ]) {
        assert_eq!(entry.key.kind, MeasurementKind::Pseudo);
        assert_eq!(entry.value(), 0.0);
        assert_eq!(entry.noise_variance(), 1.0E-6 * 1.0E-6);
        assert_eq!(entry.coefficient(&key), Some(1.0));
    }

    // the pivot's clock is the datum: no clock coefficient
    let pivot_code = &entries[2];
    assert_eq!(pivot_code.key.kind, MeasurementKind::Code);
    assert_eq!(pivot_code.coefficient(&StateKey::rec_sys_bias("R1", 0)), None);
    assert_eq!(pivot_code.coefficient(&StateKey::sat_clock(g01)), Some(-1.0));

    // every other receiver estimates a relative clock
    let other_code = &entries[4];
    assert_eq!(other_code.coefficient(&StateKey::rec_sys_bias("R2", 0)), Some(1.0));

    // phase rows carry the ambiguity and its tracking back reference
    let other_phase = &entries[5];
    assert_eq!(other_phase.key.kind, MeasurementKind::Phase);
    assert_eq!(
        other_phase.coefficient(&StateKey::ambiguity(g01, "R2", 0)),
        Some(1.0),
    );
    assert_eq!(other_phase.tracker, Some(SignalKey::new("R2", g01, 0)));
}

#[rstest]
fn eop_and_orbit_contributions(g01: SV) {
    init_logger();

    let mut cfg = clocks_only_config();
    cfg.eop = StateSpec::new(0.0, 1.0, ProcessNoise::None);
    cfg.eop_rate = StateSpec::new(0.0, 1.0, ProcessNoise::None);
    cfg.orbit = StateSpec::new(0.0, 1.0, ProcessNoise::None);

    let mut estimator = NetworkEstimator::new(cfg);

    let receivers = vec![
        receiver("R1", vec![gps_observation(g01, 1.0, 1.0)]),
        receiver("R2", vec![gps_observation(g01, 2.0, 2.0)]),
    ];

    let mut orbit_partials = HashMap::new();
    orbit_partials.insert(
        g01,
        OrbitPartials {
            parameters: vec!["radial".to_string(), "along".to_string()],
            partials: DMatrix::from_row_slice(2, 3, &[0.0, 0.0, 2.0, 0.0, 1.0, 1.0]),
        },
    );

    // xp grows by 1E-9 rad over 10 seconds
    let eop = EopTable::new(vec![
        (t0(), EopValues::new(1.0E-7, 2.0E-7, 0.05)),
        (
            t0() + Duration::from_seconds(10.0),
            EopValues::new(1.1E-7, 2.0E-7, 0.05),
        ),
    ]);

    let nav = NavigationData::new(orbit_partials, eop);

    let mut trackers = TrackerTable::default();
    let mut visibility = HashMap::new();
    visibility.insert(g01, 2);

    let entries = estimator.build_entries(t0(), &receivers, &mut trackers, &nav, &visibility);

    let code = entries
        .iter()
        .find(|e| e.key.kind == MeasurementKind::Code)
        .unwrap();

    // orbit unknowns: partial rows projected onto the line of sight
    assert_eq!(
        code.coefficient(&StateKey::orbit_correction(g01, "00_radial")),
        Some(2.0),
    );
    assert_eq!(
        code.coefficient(&StateKey::orbit_correction(g01, "01_along")),
        Some(1.0),
    );

    // station EOP partials at (1E6, 2E6, 3E6) projected on e = +Z
    let xp_coeff = code.coefficient(&StateKey::eop("xp")).unwrap();
    let yp_coeff = code.coefficient(&StateKey::eop("yp")).unwrap();
    let ut1_coeff = code.coefficient(&StateKey::eop("ut1")).unwrap();

    assert!((xp_coeff - (-1.0E6 * MAS2R)).abs() < 1.0E-18);
    assert!((yp_coeff - 2.0E6 * MAS2R).abs() < 1.0E-18);
    assert_eq!(ut1_coeff, 0.0);

    // published values offset the residual: the filter estimates a
    // correction, not the absolute parameter
    let apriori_offset = xp_coeff * (1.0E-7 * R2MAS) + yp_coeff * (2.0E-7 * R2MAS);
    assert!((code.value() - (1.0 + apriori_offset)).abs() < 1.0E-9);

    // rate companion seeded from the one second forward difference,
    // scaled to per day
    let xp_rate = estimator
        .registry()
        .value(&StateKey::eop_rate("xp"))
        .unwrap();
    let expected = 1.0E-9 * R2MAS * 86_400.0;
    assert!((xp_rate - expected).abs() < expected * 1.0E-6);
}

#[rstest]
fn removed_ambiguity_reinitializes_next_epoch(g01: SV) {
    init_logger();

    let cfg = clocks_only_config();
    let outage_limit = cfg.outage_limit;

    let mut estimator = NetworkEstimator::new(cfg);
    let mut receivers = three_receivers(g01);
    let mut trackers = TrackerTable::default();
    let nav = empty_nav();

    estimator
        .run_epoch(t0(), &mut receivers, &mut trackers, &nav)
        .unwrap_or_else(|e| panic!("first epoch failed: {}", e));

    let amb = StateKey::ambiguity(g01, "R2", 0);
    assert!(estimator.registry().contains(&amb));

    // long outage on R2: pruned at next epoch start, then immediately
    // recreated by the reappearing phase measurement
    trackers
        .tracker_mut(&SignalKey::new("R2", g01, 0))
        .outage_count = outage_limit;

    let summary = estimator
        .run_epoch(
            t0() + Duration::from_seconds(30.0),
            &mut receivers,
            &mut trackers,
            &nav,
        )
        .unwrap_or_else(|e| panic!("second epoch failed: {}", e));

    assert!(
        summary.bootstrapped,
        "recreated ambiguity must be least squares seeded, not remembered",
    );

    let (value, variance) = estimator
        .registry()
        .value_and_variance(&amb)
        .unwrap();
    assert!((value - 0.5).abs() < 1.0E-6);
    assert!(variance > 0.0);
    assert!(estimator.registry().dims_consistent());
}
