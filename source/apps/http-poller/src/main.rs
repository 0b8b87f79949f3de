// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host-mode simulation of the HTTP poller firmware
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: tests/poller.rs exercises the same wiring
//!
//! Runs the controller against the scripted host runtime with a simulated clock. Set
//! `HTTP_POLLER_CONFIG` to a TOML file to override timings; `RUST_LOG` controls verbosity.

use std::path::PathBuf;

use http_poller::{build_controller, log_startup_diagnostics};
use log::{error, info};
use nexus_chan::ControllerConfig;
use nexus_hal::Platform;
use nexus_hostcall::fake::{CannedResponse, FakeHost};

/// Simulated time per main-loop iteration.
const SIM_STEP_US: u64 = 50_000;
/// Total simulated run time.
const SIM_DURATION_US: u64 = 125_000_000;
const SAMPLE_ITEM: &[u8] =
    br#"{"userId": 1, "id": 1, "title": "delectus aut autem", "completed": false}"#;

#[derive(Default)]
struct SimBoard {
    led_on: bool,
}

impl Platform for SimBoard {
    fn init(&mut self) {
        info!("board initialised");
    }

    fn toggle_led(&mut self) {
        self.led_on = !self.led_on;
    }

    fn pause_us(&mut self, _micros: u64) {}
}

fn load_config() -> Result<ControllerConfig, nexus_chan::ConfigError> {
    match std::env::var_os("HTTP_POLLER_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            info!("loading config from {}", path.display());
            ControllerConfig::from_toml_file(&path)
        }
        None => Ok(ControllerConfig::default()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    let mut host = FakeHost::new();
    host.auto_respond =
        Some(CannedResponse { header_count: 12, ..CannedResponse::ok(SAMPLE_ITEM) });
    log_startup_diagnostics(&mut host);

    let mut controller = match build_controller(host, SimBoard::default(), config) {
        Ok(controller) => controller,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = controller.start() {
        error!("startup failed: {err}");
        std::process::exit(1);
    }

    for _ in 0..SIM_DURATION_US / SIM_STEP_US {
        if controller.host_mut().take_irq() {
            controller.irq().on_interrupt();
        }
        if let Err(err) = controller.tick() {
            error!("fatal: {err}");
            std::process::exit(1);
        }
        controller.host_mut().advance(SIM_STEP_US);
    }

    let stats = controller.stats();
    info!(
        "simulation finished: {} request(s), {} response(s), {} timeout(s)",
        stats.requests, stats.responses, stats.timeouts
    );
    if let Err(err) = controller.shutdown() {
        error!("shutdown failed: {err}");
        std::process::exit(1);
    }
}
