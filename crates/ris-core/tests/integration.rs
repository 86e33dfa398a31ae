//! Integration tests exercising the full pipeline:
//! build codebook → derive targets → match → pack → encode.

use ris_core::{
    BitPolicy, CoreError, CycleDriver, DitherTable, DriverConfig, FrameEncoder, FrameFormat,
    Mapper, PhaseStateSet, Schedule, build_codebook, circular_distance, export_table,
    import_table, match_phase, phase_gradient, target_phases, to_bits,
};

fn binary() -> PhaseStateSet {
    PhaseStateSet::new(vec![0.0, 180.0]).unwrap()
}

/// Default board: {0,180}, L=4, threshold 0.6 gives a usable, symmetric codebook.
#[test]
fn default_codebook_is_symmetric() {
    let cb = build_codebook(&binary(), 4, 0.6).unwrap();
    assert!(!cb.is_empty());
    assert!(cb.len() <= 16);
    assert!(
        cb.entries()
            .iter()
            .any(|e| circular_distance(e.phase, 0.0) < 1.0),
        "expected an entry near 0°"
    );
    assert!(
        cb.entries()
            .iter()
            .any(|e| circular_distance(e.phase, 180.0) < 1.0),
        "expected an entry near 180°"
    );
    for entry in cb.entries() {
        assert!(entry.magnitude > 0.6);
        assert!((0.0..360.0).contains(&entry.phase));
    }
}

/// Every retained entry clears the threshold, across several set sizes.
#[test]
fn magnitude_invariant_holds_for_many_configurations() {
    let sets = [
        vec![0.0, 180.0],
        vec![0.0, 90.0, 180.0, 270.0],
        vec![0.0, 120.0, 240.0],
    ];
    for states in sets {
        let set = PhaseStateSet::new(states.clone()).unwrap();
        for l in 1..=5 {
            for threshold in [0.0, 0.3, 0.6, 0.9] {
                let cb = build_codebook(&set, l, threshold).unwrap();
                assert!(cb.len() <= states.len().pow(l as u32));
                for entry in cb.entries() {
                    assert!(
                        entry.magnitude > threshold,
                        "{states:?} L={l} entry {} magnitude {} <= {threshold}",
                        entry.index,
                        entry.magnitude
                    );
                    assert_eq!(entry.states.len(), l);
                }
                // enumeration order is preserved
                assert!(cb.entries().windows(2).all(|w| w[0].index < w[1].index));
            }
        }
    }
}

/// Steering 30° at half-wavelength spacing gives a 90° per-column gradient.
#[test]
fn steering_gradient_scenario() {
    let delta = phase_gradient(30.0, 0.5);
    assert!((delta - 90.0).abs() < 1e-6, "delta = {delta}");
    let targets = target_phases(0.0, delta, 16, None);
    assert!((targets[1] - 90.0).abs() < 1e-6);
}

/// Threshold above the achievable peak: empty codebook, then NoMatchAvailable.
#[test]
fn unreachable_threshold_never_yields_default_entry() {
    let cb = build_codebook(&binary(), 4, 0.8).unwrap();
    assert!(cb.is_empty());
    match match_phase(90.0, &cb) {
        Err(CoreError::NoMatchAvailable { target_phase }) => assert_eq!(target_phase, 90.0),
        other => panic!("expected NoMatchAvailable, got {other:?}"),
    }
    assert!(matches!(
        CycleDriver::new(DriverConfig::default(), cb),
        Err(CoreError::EmptyCodebook { .. })
    ));
}

/// 359.999° resolves to an entry near 0°, not one ~360° away.
#[test]
fn wraparound_target_matches_zero_entry() {
    let cb = build_codebook(&binary(), 4, 0.6).unwrap();
    let entry = match_phase(359.999, &cb).unwrap();
    assert!(circular_distance(entry.phase, 359.999) < 0.01);
    assert_eq!(entry.index, 6);
}

#[test]
fn matching_is_deterministic_across_builds() {
    let a = build_codebook(&binary(), 4, 0.4).unwrap();
    let b = build_codebook(&binary(), 4, 0.4).unwrap();
    for step in 0..72 {
        let target = step as f64 * 5.0;
        assert_eq!(match_phase(target, &a).unwrap(), match_phase(target, &b).unwrap());
    }
}

#[test]
fn bits_ignore_phase_and_magnitude() {
    let cb = build_codebook(&binary(), 4, 0.4).unwrap();
    let rule = BitPolicy::Midpoint.resolve(cb.phase_states());
    for entry in cb.entries() {
        let mut altered = entry.clone();
        altered.phase = (entry.phase + 123.0) % 360.0;
        altered.magnitude = 0.99;
        assert_eq!(to_bits(entry, rule), to_bits(&altered, rule));
    }
}

#[test]
fn full_cycle_matches_mapper() {
    let cb = build_codebook(&binary(), 4, 0.6).unwrap();
    let targets = target_phases(180.0, phase_gradient(30.0, 0.5), 16, None);
    let expected = Mapper::new(&cb, BitPolicy::Midpoint).resolve(&targets).unwrap();

    let mut driver = CycleDriver::new(
        DriverConfig {
            schedule: Schedule::Qpsk {
                phases: vec![180.0],
            },
            ..DriverConfig::default()
        },
        cb,
    )
    .unwrap();
    let cycle = driver.next_cycle().unwrap();
    assert_eq!(cycle.pattern, expected);
    assert_eq!(cycle.frame.as_str(), "9,12,6,3,9,12,6,3,9,12,6,3,9,12,6,3");
}

/// Exact-value bit policy (the 1-bit board variant) over a four-level set.
#[test]
fn equals_policy_on_four_level_codebook() {
    let set = PhaseStateSet::new(vec![0.0, 90.0, 180.0, 270.0]).unwrap();
    let cb = build_codebook(&set, 3, 0.6).unwrap();
    let mut driver = CycleDriver::new(
        DriverConfig {
            position_count: 8,
            bit_policy: BitPolicy::Equals { value: 180.0 },
            ..DriverConfig::default()
        },
        cb,
    )
    .unwrap();
    let cycle = driver.next_cycle().unwrap();
    assert_eq!(cycle.pattern.len(), 8);
    assert!(cycle.pattern.values().iter().all(|&v| v < 8));
}

#[test]
fn imported_table_drives_cycles() {
    let built = build_codebook(&binary(), 4, 0.6).unwrap();
    let table = import_table(&export_table(&built).unwrap()).unwrap();

    let config = DriverConfig {
        dither: Some(DitherTable::new(vec![90.0; 16]).unwrap()),
        encoder: FrameEncoder::new(FrameFormat::Hex, 20),
        ..DriverConfig::default()
    };
    let mut from_table = CycleDriver::new(config.clone(), table).unwrap();
    let mut generated = CycleDriver::new(config, built).unwrap();
    for _ in 0..8 {
        assert_eq!(
            from_table.get_next_frame().unwrap(),
            generated.get_next_frame().unwrap()
        );
    }
}
