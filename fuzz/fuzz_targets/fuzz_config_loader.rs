#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = ampguard_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // Anything the schema accepts must map onto a controller config without panicking.
    let core = ampguard_core::ControllerCfg::from(&cfg);
    let _ = ampguard_core::builder::validate(&core);
    let _ = cfg.drift_enabled();
});
