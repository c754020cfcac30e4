// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod cli;
mod daemon;

use std::process::ExitCode;

use clap::Parser;
use landwatch_cli_shared::{cli::Config, logger};
use log::error;

/// Exit code for a configuration problem.
const EXIT_CONFIG: u8 = 1;
/// Exit code for an unreachable snapshot store.
const EXIT_STORE: u8 = 2;

fn main() -> ExitCode {
    let options = cli::Cli::parse();

    let config = match Config::load(options.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("landwatch: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    logger::setup_logger(&config.log);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("landwatch: cannot start the async runtime: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match runtime.block_on(daemon::start(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ daemon::DaemonError::StoreUnreachable(_)) => {
            error!("{err}");
            ExitCode::from(EXIT_STORE)
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}
