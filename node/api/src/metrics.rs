// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lazy_static::lazy_static;
use prometheus::core::{AtomicU64, GenericGauge};

lazy_static! {
    pub static ref ACTIVE_STREAM_SESSIONS: Box<GenericGauge<AtomicU64>> = {
        let active_stream_sessions = Box::new(
            GenericGauge::<AtomicU64>::new(
                "active_stream_sessions",
                "Number of connected state-stream sessions",
            )
            .expect("Defining the active_stream_sessions metric must succeed"),
        );
        prometheus::default_registry()
            .register(active_stream_sessions.clone())
            .expect(
                "Registering the active_stream_sessions metric with the metrics registry must succeed",
            );
        active_stream_sessions
    };
}
