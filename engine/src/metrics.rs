//! Prometheus metrics for the identity engine.
//!
//! [`EngineMetrics`] owns a dedicated [`Registry`] that the HTTP `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_with_registry, Encoder,
    IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

pub struct EngineMetrics {
    pub registry: Registry,

    /// Successful registrations, labelled by `registered_on` (`ledger` / `local_only`).
    pub registrations: IntCounterVec,
    /// Verification decisions, labelled by `result` (`ledger`, `local_store`, `not_found`).
    pub verifications: IntCounterVec,
    /// Ledger failures absorbed by falling back, labelled by `operation`.
    pub ledger_fallbacks: IntCounterVec,
    /// Registrations refused as duplicates, labelled by `kind` (`account` / `biometric`).
    pub duplicate_rejections: IntCounterVec,
    /// Records in the local store.
    pub local_records: IntGauge,
}

impl EngineMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let registrations = register_int_counter_vec_with_registry!(
            Opts::new("faceid_registrations_total", "Successful registrations"),
            &["registered_on"],
            registry
        )
        .expect("failed to register registrations counter");

        let verifications = register_int_counter_vec_with_registry!(
            Opts::new("faceid_verifications_total", "Verification decisions by outcome"),
            &["result"],
            registry
        )
        .expect("failed to register verifications counter");

        let ledger_fallbacks = register_int_counter_vec_with_registry!(
            Opts::new(
                "faceid_ledger_fallbacks_total",
                "Ledger failures absorbed by falling back to the local store"
            ),
            &["operation"],
            registry
        )
        .expect("failed to register ledger_fallbacks counter");

        let duplicate_rejections = register_int_counter_vec_with_registry!(
            Opts::new(
                "faceid_duplicate_rejections_total",
                "Registrations refused as duplicates"
            ),
            &["kind"],
            registry
        )
        .expect("failed to register duplicate_rejections counter");

        let local_records = register_int_gauge_with_registry!(
            Opts::new("faceid_local_records", "Identity records in the local store"),
            registry
        )
        .expect("failed to register local_records gauge");

        Self {
            registry,
            registrations,
            verifications,
            ledger_fallbacks,
            duplicate_rejections,
            local_records,
        }
    }

    /// Prometheus text exposition of every metric in the registry.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_labelled_counters() {
        let metrics = EngineMetrics::new();
        metrics.registrations.with_label_values(&["local_only"]).inc();
        metrics.duplicate_rejections.with_label_values(&["biometric"]).inc();
        metrics.local_records.set(3);

        let text = metrics.encode().unwrap();
        assert!(text.contains("faceid_registrations_total{registered_on=\"local_only\"} 1"));
        assert!(text.contains("faceid_duplicate_rejections_total{kind=\"biometric\"} 1"));
        assert!(text.contains("faceid_local_records 3"));
    }
}
