// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lazy_static::lazy_static;
use prometheus::core::{AtomicU64, GenericCounter, GenericCounterVec, GenericGauge, Opts};

lazy_static! {
    pub static ref LANDS_SYNCED_TOTAL: Box<GenericCounter<AtomicU64>> = {
        let lands_synced_total = Box::new(
            GenericCounter::<AtomicU64>::new(
                "lands_synced_total",
                "Total number of land snapshots fetched, stored and published",
            )
            .expect("Defining the lands_synced_total metric must succeed"),
        );
        prometheus::default_registry()
            .register(lands_synced_total.clone())
            .expect(
                "Registering the lands_synced_total metric with the metrics registry must succeed",
            );
        lands_synced_total
    };
    pub static ref FETCH_FAILURE_TOTAL: Box<GenericCounterVec<AtomicU64>> = {
        let fetch_failure_total = Box::new(
            GenericCounterVec::<AtomicU64>::new(
                Opts::new(
                    "fetch_failure_total",
                    "Total number of failed gateway fetches by reason",
                ),
                &[labels::FETCH_FAILURE_REASON],
            )
            .expect("Defining the fetch_failure_total metric must succeed"),
        );
        prometheus::default_registry()
            .register(fetch_failure_total.clone())
            .expect(
                "Registering the fetch_failure_total metric with the metrics registry must succeed",
            );
        fetch_failure_total
    };
    pub static ref ACTIVE_FETCHES: Box<GenericGauge<AtomicU64>> = {
        let active_fetches = Box::new(
            GenericGauge::<AtomicU64>::new(
                "active_fetches",
                "Number of gateway fetches currently holding a concurrency permit",
            )
            .expect("Defining the active_fetches metric must succeed"),
        );
        prometheus::default_registry()
            .register(active_fetches.clone())
            .expect("Registering the active_fetches metric with the metrics registry must succeed");
        active_fetches
    };
    pub static ref WORKER_RESTARTS_TOTAL: Box<GenericCounter<AtomicU64>> = {
        let worker_restarts_total = Box::new(
            GenericCounter::<AtomicU64>::new(
                "worker_restarts_total",
                "Total number of land workers respawned after a panic",
            )
            .expect("Defining the worker_restarts_total metric must succeed"),
        );
        prometheus::default_registry()
            .register(worker_restarts_total.clone())
            .expect(
                "Registering the worker_restarts_total metric with the metrics registry must succeed",
            );
        worker_restarts_total
    };
}

pub mod labels {
    pub const FETCH_FAILURE_REASON: &str = "reason";
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Metric;

    #[test]
    fn metrics_defined_and_registered() {
        let _ = LANDS_SYNCED_TOTAL.metric();
        let _ = FETCH_FAILURE_TOTAL.with_label_values(&["label"]);
        let _ = ACTIVE_FETCHES.metric();
        let _ = WORKER_RESTARTS_TOTAL.metric();
    }
}
