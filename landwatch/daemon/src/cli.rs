// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "landwatch", version, about = "Land state watcher daemon")]
pub struct Cli {
    /// Path to a TOML configuration file. Recognized environment variables
    /// override values from the file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
