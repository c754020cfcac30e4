// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use log::LevelFilter;

use crate::cli::LogConfig;

pub fn setup_logger(log_config: &LogConfig) {
    let mut logger_builder = pretty_env_logger::formatted_timed_builder();

    // Assign default log level settings
    logger_builder.filter(None, LevelFilter::Info);

    for item in log_config.filters.iter() {
        logger_builder.filter(Some(item.module.as_str()), item.level);
    }

    // Override log level based on filters if set
    if let Ok(s) = ::std::env::var("RUST_LOG") {
        logger_builder.parse_filters(&s);
    }

    logger_builder.init();
}
