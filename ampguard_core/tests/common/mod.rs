#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};

use ampguard_core::mocks::RecordingSink;
use ampguard_core::{AdcCfg, ControllerCfg, Monitor};
use ampguard_traits::clock::test_clock::TestClock;
use ampguard_traits::{AnalogInput, LoadSwitch};

/// Midscale bias of the simulated sensors.
pub const ZERO_CODE: u16 = 2048;

/// Code offset for `amps` on a 0.1 V/A sensor with the default 3.3 V / 12-bit ADC.
pub fn counts_for(amps: f32) -> u16 {
    let vpc = AdcCfg::default().volts_per_count();
    (amps * 0.1 / vpc).round() as u16
}

#[derive(Debug, Default)]
pub struct AdcState {
    pub base: [u16; 8],
    /// Alternating +j / -j around `base`, per channel.
    pub jitter: [u16; 8],
    pub reads: [usize; 8],
    pub fail: bool,
}

/// ADC whose per-channel level can be changed while the controller owns it.
#[derive(Clone, Default)]
pub struct ScriptedAdc {
    pub state: Arc<Mutex<AdcState>>,
}

impl ScriptedAdc {
    /// Three live sensors at midscale with ±3 counts of noise.
    pub fn quiet() -> Self {
        let adc = Self::default();
        {
            let mut s = adc.state.lock().unwrap();
            for ch in 0..3 {
                s.base[ch] = ZERO_CODE;
                s.jitter[ch] = 3;
            }
        }
        adc
    }

    pub fn set_base(&self, ch: usize, code: u16) {
        self.state.lock().unwrap().base[ch] = code;
    }

    pub fn set_jitter(&self, ch: usize, j: u16) {
        self.state.lock().unwrap().jitter[ch] = j;
    }

    /// Drive `amps` through the sensor on `ch`.
    pub fn set_amps(&self, ch: usize, amps: f32) {
        self.set_base(ch, ZERO_CODE + counts_for(amps));
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    pub fn reads(&self, ch: usize) -> usize {
        self.state.lock().unwrap().reads[ch]
    }
}

impl AnalogInput for ScriptedAdc {
    fn read_raw(&mut self, channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
        let mut s = self.state.lock().unwrap();
        if s.fail {
            return Err(Box::new(std::io::Error::other("adc offline")));
        }
        let ch = usize::from(channel);
        let n = s.reads[ch];
        s.reads[ch] += 1;
        let (b, j) = (s.base[ch], s.jitter[ch]);
        Ok(if n % 2 == 0 {
            b.saturating_add(j)
        } else {
            b.saturating_sub(j)
        })
    }
}

/// Relay that records every write.
#[derive(Clone, Default)]
pub struct SpyRelay {
    pub writes: Arc<Mutex<Vec<bool>>>,
}

impl SpyRelay {
    pub fn last(&self) -> Option<bool> {
        self.writes.lock().unwrap().last().copied()
    }

    pub fn ever_energized(&self) -> bool {
        self.writes.lock().unwrap().iter().any(|&w| w)
    }
}

impl LoadSwitch for SpyRelay {
    fn set_load(&mut self, connected: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.writes.lock().unwrap().push(connected);
        Ok(())
    }
}

pub struct Rig {
    pub adc: ScriptedAdc,
    pub relay: SpyRelay,
    pub clock: TestClock,
    pub sink: RecordingSink,
    pub monitor: Monitor,
}

/// Build a monitor over shared fakes so the test can keep poking at them.
pub fn rig(adc: ScriptedAdc, cfg: ControllerCfg) -> Rig {
    let relay = SpyRelay::default();
    let clock = TestClock::new();
    let sink = RecordingSink::new();
    let monitor = Monitor::builder()
        .with_adc(adc.clone())
        .with_relay(relay.clone())
        .with_config(cfg)
        .with_clock(Arc::new(clock.clone()))
        .with_sink(sink.clone())
        .build()
        .expect("monitor build");
    Rig {
        adc,
        relay,
        clock,
        sink,
        monitor,
    }
}
