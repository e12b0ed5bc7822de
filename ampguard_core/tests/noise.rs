mod common;

use ampguard_core::mocks::NullSink;
use ampguard_core::{
    AdcCfg, CalibrationFailure, CalibrationState, ControllerCfg, NoiseAnalyzer, NoiseCfg,
    NoiseLevel, NoisePolicy, Sampler, SystemReadiness,
};
use ampguard_traits::clock::test_clock::TestClock;
use common::{ScriptedAdc, ZERO_CODE, rig};
use rstest::rstest;

fn amps_per_count() -> f32 {
    AdcCfg::default().volts_per_count() / 0.1
}

fn calibrated_at_zero_code() -> [CalibrationState; 3] {
    [CalibrationState {
        zero_voltage: f32::from(ZERO_CODE) * AdcCfg::default().volts_per_count(),
        connected: true,
    }; 3]
}

#[rstest]
#[case::quiet(3, true)]
#[case::just_under_ceiling(62, true)]
#[case::above_ceiling(63, false)]
fn basic_ceiling_gates_startup(#[case] jitter: u16, #[case] ok: bool) {
    let adc = ScriptedAdc::quiet();
    for ch in 0..3 {
        adc.set_jitter(ch, jitter);
    }
    let mut r = rig(adc, ControllerCfg::default());
    let readiness = r.monitor.startup().unwrap().clone();

    let noise = f32::from(jitter) * amps_per_count();
    assert_eq!(readiness.calibration_ok(), ok, "noise {noise}");
    if ok {
        let profile = r.monitor.state().noise.unwrap();
        assert!(matches!(profile.level, NoiseLevel::Global(n) if (n - noise).abs() < 1e-3));
        for t in profile.thresholds {
            assert!((t - (noise * 1.5 + 0.2)).abs() < 1e-3);
        }
        assert_eq!(r.relay.last(), Some(true));
    } else {
        assert!(matches!(
            readiness,
            SystemReadiness::Degraded(CalibrationFailure::NoiseTooHigh { .. })
        ));
        assert!(!r.relay.ever_energized());
    }
}

#[test]
fn advanced_policy_tracks_per_phase_max() {
    let adc = ScriptedAdc::quiet();
    adc.set_jitter(0, 10);
    adc.set_jitter(1, 20);
    adc.set_jitter(2, 100);
    let clock = TestClock::new();
    let cfg = NoiseCfg::advanced();
    let mut sampler = Sampler::new(adc, AdcCfg::default());
    let channels = ControllerCfg::default().channels;

    let profile = NoiseAnalyzer::new(&cfg, &clock, 10)
        .analyze_noise(
            &mut sampler,
            &channels,
            &calibrated_at_zero_code(),
            &mut NullSink,
        )
        .unwrap();

    let apc = amps_per_count();
    let NoiseLevel::PerPhase(max) = profile.level else {
        panic!("expected per-phase level, got {:?}", profile.level);
    };
    for (m, j) in max.iter().zip([10.0f32, 20.0, 100.0]) {
        assert!((m - j * apc).abs() < 1e-3);
    }
    for (t, m) in profile.thresholds.iter().zip(max) {
        assert!((t - m * 1.5).abs() < 1e-5);
    }
    // ~0.8 A of noise on L3 would fail the basic gate but never the advanced one
    assert!(NoisePolicy::advanced().accept(&profile).is_ok());
    assert_eq!(clock.elapsed_ms(), 100);
}

#[test]
fn disconnected_phase_contributes_nothing() {
    let adc = ScriptedAdc::quiet();
    adc.set_jitter(2, 500);
    let clock = TestClock::new();
    let cfg = NoiseCfg::basic();
    let mut sampler = Sampler::new(adc, AdcCfg::default());
    let channels = ControllerCfg::default().channels;
    let mut cal = calibrated_at_zero_code();
    cal[2].connected = false;

    let profile = NoiseAnalyzer::new(&cfg, &clock, 0)
        .analyze_noise(&mut sampler, &channels, &cal, &mut NullSink)
        .unwrap();

    // average over the two live phases only
    let NoiseLevel::Global(n) = profile.level else {
        panic!("expected global level");
    };
    assert!((n - 3.0 * amps_per_count()).abs() < 1e-3);
}
