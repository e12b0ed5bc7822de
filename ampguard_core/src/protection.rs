//! Load-control state machine: trip, lockout, bounded auto-restart.
//!
//! `ProtectionStateMachine` holds only limits; the mutable `ProtectionState`
//! lives in the controller and is passed in by exclusive reference. The relay
//! is written only from here.

use ampguard_traits::LoadSwitch;
use eyre::WrapErr;

use crate::config::ProtectionCfg;
use crate::fault::FaultKind;
use crate::hw_error::map_hw_error;
use crate::status::LoadStatus;
use crate::util::elapsed_ms;

/// Trip counter saturates here.
pub const TRIP_COUNT_CAP: u16 = 999;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProtectionState {
    pub load_connected: bool,
    pub trip_count: u16,
    pub last_trip_ms: Option<u64>,
    /// Most recent fault; kept after reconnect for reporting.
    pub last_trip_reason: FaultKind,
}

/// What `update` changed this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Tripped(FaultKind),
    /// `amnesty` is set when the reset window had passed and the counter was zeroed.
    Reconnected { amnesty: bool },
    /// Counter zeroed after extended stable operation while connected.
    CounterReset,
}

#[derive(Debug, Clone)]
pub struct ProtectionStateMachine {
    cfg: ProtectionCfg,
}

impl ProtectionStateMachine {
    pub fn new(cfg: ProtectionCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &ProtectionCfg {
        &self.cfg
    }

    /// Energize the load after a successful calibration.
    pub fn arm<R: LoadSwitch>(
        &self,
        st: &mut ProtectionState,
        relay: &mut R,
    ) -> crate::Result<()> {
        drive(relay, true)?;
        st.load_connected = true;
        tracing::info!("load connected");
        Ok(())
    }

    /// Open the relay regardless of state.
    pub fn disarm<R: LoadSwitch>(
        &self,
        st: &mut ProtectionState,
        relay: &mut R,
    ) -> crate::Result<()> {
        drive(relay, false)?;
        st.load_connected = false;
        Ok(())
    }

    /// Advance the machine by one control cycle.
    pub fn update<R: LoadSwitch>(
        &self,
        st: &mut ProtectionState,
        now_ms: u64,
        fault: FaultKind,
        avg_current: f32,
        relay: &mut R,
    ) -> crate::Result<Transition> {
        if st.load_connected {
            if fault.is_fault() {
                drive(relay, false)?;
                st.load_connected = false;
                st.last_trip_ms = Some(now_ms);
                st.trip_count = st.trip_count.saturating_add(1).min(TRIP_COUNT_CAP);
                st.last_trip_reason = fault;
                tracing::warn!(%fault, trip_count = st.trip_count, "load tripped");
                return Ok(Transition::Tripped(fault));
            }
            if st.trip_count > 0 && self.since_trip(st, now_ms) > self.cfg.trip_reset_ms {
                st.trip_count = 0;
                tracing::info!("trip counter reset after stable operation");
                return Ok(Transition::CounterReset);
            }
            return Ok(Transition::None);
        }

        if !self.restart_allowed(st, now_ms, fault, avg_current) {
            return Ok(Transition::None);
        }
        let amnesty = self.since_trip(st, now_ms) > self.cfg.trip_reset_ms;
        drive(relay, true)?;
        st.load_connected = true;
        if amnesty {
            st.trip_count = 0;
        }
        tracing::info!(amnesty, trip_count = st.trip_count, "load reconnected");
        Ok(Transition::Reconnected { amnesty })
    }

    /// All auto-restart conditions at once.
    pub fn restart_allowed(
        &self,
        st: &ProtectionState,
        now_ms: u64,
        fault: FaultKind,
        avg_current: f32,
    ) -> bool {
        let elapsed = self.since_trip(st, now_ms);
        !fault.is_fault()
            && avg_current < self.cfg.restart_threshold_a
            && elapsed > self.cfg.lockout_ms
            && (st.trip_count < self.cfg.max_trip_count || elapsed > self.cfg.trip_reset_ms)
    }

    /// Tripped with the budget spent and the reset window still open.
    pub fn is_locked_out(&self, st: &ProtectionState, now_ms: u64) -> bool {
        !st.load_connected
            && st.trip_count >= self.cfg.max_trip_count
            && self.since_trip(st, now_ms) <= self.cfg.trip_reset_ms
    }

    pub fn load_status(&self, st: &ProtectionState, now_ms: u64) -> LoadStatus {
        if st.load_connected {
            LoadStatus::Connected
        } else if self.is_locked_out(st, now_ms) {
            LoadStatus::LockedOut
        } else {
            LoadStatus::Tripped
        }
    }

    fn since_trip(&self, st: &ProtectionState, now_ms: u64) -> u64 {
        st.last_trip_ms.map_or(u64::MAX, |t| elapsed_ms(now_ms, t))
    }
}

fn drive<R: LoadSwitch>(relay: &mut R, connected: bool) -> crate::Result<()> {
    relay
        .set_load(connected)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err_with(|| format!("set relay load={connected}"))
}
