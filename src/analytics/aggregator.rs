//! Folding of analytics records into cumulative counters
//!
//! Counters live in the shared [`MetricRegistry`] and are backed by atomics,
//! so folding can run while the exposition endpoint is gathering. Counters
//! only ever grow: a record adds its count, nothing is reset or overwritten.

use std::sync::Arc;
use tracing::trace;

use crate::analytics::models::{AnalyticsRecord, CounterKey};
use crate::metrics::MetricRegistry;

pub struct Aggregator {
    registry: Arc<MetricRegistry>,
}

impl Aggregator {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }

    /// Add every record's count to its `(zone, status, host, path)` counter.
    ///
    /// `zone_name` maps a zone ID to its human-readable name; unknown zones
    /// are labelled with an empty name. Does nothing when the request counter
    /// is denylisted.
    pub fn fold<'z, F>(&self, records: &[AnalyticsRecord], zone_name: F, request_path: &str)
    where
        F: Fn(&str) -> Option<&'z str>,
    {
        let Some(counter) = self.registry.zone_requests() else {
            return;
        };

        for record in records {
            let name = zone_name(&record.zone_tag).unwrap_or_default();
            let key = CounterKey::from_record(record, name, request_path);
            trace!(?key, count = record.count, "Folding analytics record");
            counter
                .with_label_values(&key.label_values())
                .inc_by(record.count);
        }
    }
}
