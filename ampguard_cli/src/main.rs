mod cli;
mod console;
mod error_fmt;
mod monitor;
mod plant;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ampguard_config::{Config, Logging};
use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Commands, FaultArgs, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = real_main(cli) {
        tracing::error!(error = ?err, "ampguard failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    // dropping the guard flushes the file writer
    let _file_guard = init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), variant = ?cfg.system.variant, "config loaded");

    match cli.cmd {
        Commands::Run {
            max_cycles,
            source,
            fault,
        } => {
            let io = plant::make_io(&cfg, &source, &fault)?;
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;

            let summary = monitor::run_monitor(&cfg, io, cli.json, &shutdown, max_cycles)?;
            console::print_summary(&summary, cli.json);
        }
        Commands::Calibrate { source } => {
            let io = plant::make_io(&cfg, &source, &FaultArgs::default())?;
            monitor::calibrate(&cfg, io, cli.json)?;
        }
        Commands::SelfCheck { source } => {
            let io = plant::make_io(&cfg, &source, &FaultArgs::default())?;
            monitor::self_check(&cfg, io, cli.json)?;
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = ampguard_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout stays clean for event lines.
///
/// Filter precedence: `RUST_LOG`, then `--log-level`, then `[logging].level`, then `info`.
fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    logging: &Logging,
) -> Result<Option<WorkerGuard>> {
    let level = cli_level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => {
            EnvFilter::try_new(level).wrap_err_with(|| format!("bad log level {level:?}"))?
        }
    };

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let mut guard = None;
    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name"))?;
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("create log directory {}", dir.display()))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .ok();
    Ok(guard)
}
