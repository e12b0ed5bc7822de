//! CLI argument definitions and shared statics.

use ampguard_core::Phase;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "ampguard",
    version,
    about = "Three-phase overcurrent and imbalance protection"
)]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/ampguard.toml")]
    pub config: PathBuf,

    /// Print diagnostic events and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Where the analog samples come from when not on real hardware.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Replay raw ADC codes from a CSV trace (headers: l1,l2,l3)
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Simulated balanced load per phase, in amperes
    #[arg(long, value_name = "AMPS", default_value_t = 0.0)]
    pub sim_load: f32,

    /// Unplug the simulated sensor on this phase (L1, L2, L3)
    #[arg(long, value_name = "PHASE")]
    pub sim_missing: Option<Phase>,

    /// Simulated read noise, in ADC counts
    #[arg(long, value_name = "COUNTS", default_value_t = 3)]
    pub sim_jitter: u16,
}

/// Extra current injected on one phase after the load has been connected.
#[derive(Args, Debug, Clone, Default)]
pub struct FaultArgs {
    /// Phase that receives the injected current (L1, L2, L3)
    #[arg(long, value_name = "PHASE")]
    pub inject_fault: Option<Phase>,

    /// Injected current, in amperes
    #[arg(long, value_name = "AMPS", default_value_t = 8.0, requires = "inject_fault")]
    pub fault_amps: f32,

    /// Sensor reads with the load connected before the fault appears (about one per cycle)
    #[arg(
        long,
        value_name = "CYCLES",
        default_value_t = 10,
        requires = "inject_fault"
    )]
    pub fault_after: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calibrate, then protect the load until Ctrl-C
    Run {
        /// Stop after this many control cycles
        #[arg(long, value_name = "N")]
        max_cycles: Option<u64>,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        fault: FaultArgs,
    },
    /// Run startup calibration only and print zero points and noise profile
    Calibrate {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Check that every phase has a live sensor
    SelfCheck {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_fault_injection() {
        let cli = Cli::try_parse_from([
            "ampguard",
            "run",
            "--max-cycles",
            "20",
            "--inject-fault",
            "l2",
            "--fault-amps",
            "9.5",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Run {
                max_cycles, fault, ..
            } => {
                assert_eq!(max_cycles, Some(20));
                assert_eq!(fault.inject_fault, Some(Phase::L2));
                assert!((fault.fault_amps - 9.5).abs() < f32::EPSILON);
                assert_eq!(fault.fault_after, 10);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn fault_amps_without_phase_is_rejected() {
        assert!(Cli::try_parse_from(["ampguard", "run", "--fault-amps", "3"]).is_err());
    }
}
