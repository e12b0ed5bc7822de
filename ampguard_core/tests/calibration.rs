mod common;

use ampguard_core::mocks::RecordingSink;
use ampguard_core::{
    AdcCfg, CalibrationCfg, CalibrationFailure, CalibrationMode, CalibrationStage, Calibrator,
    ControllerCfg, CycleStatus, DiagnosticEvent, Phase, Sampler, StagePass, SystemReadiness,
};
use ampguard_traits::clock::test_clock::TestClock;
use common::{ScriptedAdc, ZERO_CODE, rig};
use rstest::rstest;

#[rstest]
#[case::flat(0, 0)]
#[case::barely_flat(0, 4)]
fn flat_sensor_is_reported_missing(#[case] ch: usize, #[case] span: u16) {
    let adc = ScriptedAdc::quiet();
    adc.set_jitter(ch, span / 2);
    let mut r = rig(adc, ControllerCfg::default());

    let readiness = r.monitor.startup().unwrap().clone();
    assert_eq!(
        readiness,
        SystemReadiness::Degraded(CalibrationFailure::SensorMissing(vec![Phase::L1]))
    );
    assert!(!readiness.calibration_ok());
    assert!(!r.monitor.state().calibration[0].connected);
    assert!(r.monitor.state().calibration[1].connected);
    // relay only ever told to open
    assert!(!r.relay.ever_energized());
    assert_eq!(r.sink.count("calibration_failed"), 1);
}

#[test]
fn railed_sensors_get_default_zero() {
    let adc = ScriptedAdc::quiet();
    adc.set_base(1, 4095);
    adc.set_base(2, 0);
    let mut r = rig(adc, ControllerCfg::default());

    r.monitor.startup().unwrap();
    let st = r.monitor.state();
    assert_eq!(
        st.readiness,
        SystemReadiness::Degraded(CalibrationFailure::SensorMissing(vec![
            Phase::L2,
            Phase::L3
        ]))
    );
    for p in [Phase::L2, Phase::L3] {
        let c = st.calibration[p.index()];
        assert!(!c.connected);
        assert!((c.zero_voltage - 2.5).abs() < 1e-6);
    }
}

#[test]
fn degraded_controller_never_measures_and_repeats_diagnostic() {
    let adc = ScriptedAdc::quiet();
    adc.set_jitter(2, 0);
    let mut r = rig(adc.clone(), ControllerCfg::default());
    r.monitor.startup().unwrap();
    let reads_after_startup = adc.reads(0);

    for _ in 0..60 {
        match r.monitor.step().unwrap() {
            CycleStatus::Degraded(CalibrationFailure::SensorMissing(p)) => {
                assert_eq!(p, vec![Phase::L3]);
            }
            other => panic!("expected Degraded, got {other:?}"),
        }
    }
    assert_eq!(adc.reads(0), reads_after_startup);
    // cycles 0, 25 and 50
    assert_eq!(r.sink.count("degraded"), 3);
    assert_eq!(r.sink.count("readings"), 0);
}

#[test]
fn zero_voltage_is_mean_raw_times_volts_per_count() {
    let adc = ScriptedAdc::quiet();
    adc.set_base(0, 3000);
    adc.set_base(1, 2047);
    adc.set_base(2, 1111);
    let mut r = rig(adc, ControllerCfg::default());

    r.monitor.startup().unwrap();
    let vpc = AdcCfg::default().volts_per_count();
    let got: Vec<f32> = r
        .monitor
        .state()
        .calibration
        .iter()
        .map(|c| c.zero_voltage)
        .collect();
    for (z, raw) in got.iter().zip([3000.0f32, 2047.0, 1111.0]) {
        assert!((z - raw * vpc).abs() < 1e-4, "{z} vs {}", raw * vpc);
    }
}

#[test]
fn two_stage_discards_warmup_and_second_pass_wins() {
    let cfg = CalibrationCfg {
        mode: CalibrationMode::TwoStage {
            coarse: StagePass {
                samples: 50,
                delay_ms: 5,
                discard: 10,
            },
            fine: StagePass {
                samples: 200,
                delay_ms: 20,
                discard: 10,
            },
        },
        ..CalibrationCfg::default()
    };
    let adc = ScriptedAdc::quiet();
    let clock = TestClock::new();
    let mut sampler = Sampler::new(adc.clone(), AdcCfg::default());
    let mut sink = RecordingSink::new();
    let channels = ControllerCfg::default().channels;

    let outcome = Calibrator::new(&cfg, &clock)
        .run(&mut sampler, &channels, &mut sink)
        .unwrap();
    assert!(outcome.verdict.is_ok());

    // presence + (discard + samples) for both passes
    assert_eq!(adc.reads(0), 20 + (10 + 50) + (10 + 200));
    // every wait went through the injected clock
    assert_eq!(clock.elapsed_ms(), 3 * 19 * 10 + 60 * 5 + 210 * 20);

    let zeros: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            DiagnosticEvent::ZeroPoint { phase, stage, .. } => Some((phase, stage)),
            _ => None,
        })
        .collect();
    assert_eq!(zeros.len(), 6);
    assert!(zeros[..3].iter().all(|(_, s)| *s == CalibrationStage::Coarse));
    assert!(zeros[3..].iter().all(|(_, s)| *s == CalibrationStage::Fine));
    let vpc = AdcCfg::default().volts_per_count();
    for c in outcome.states {
        assert!((c.zero_voltage - f32::from(ZERO_CODE) * vpc).abs() < 1e-4);
    }
}

#[test]
fn progress_reaches_one_hundred_percent() {
    let mut r = rig(ScriptedAdc::quiet(), ControllerCfg::default());
    r.monitor.startup().unwrap();
    let zero_progress: Vec<u8> = r
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            DiagnosticEvent::CalibrationProgress {
                stage: CalibrationStage::Zero,
                percent,
            } => Some(percent),
            _ => None,
        })
        .collect();
    assert_eq!(zero_progress.len(), 10);
    assert_eq!(zero_progress.last(), Some(&100));
}
