//! Exportable metric catalog, operator denylist and the Prometheus registry
//!
//! The catalog is closed: every metric this exporter can publish is a
//! variant of [`MetricName`]. Operators may switch metrics off through a
//! denylist, which is validated against the catalog at startup so that a
//! typo fails fast instead of silently dropping data.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Labels carried by the per-zone request counter, in registration order.
pub const ZONE_REQUEST_LABELS: [&str; 4] = ["zone", "status", "host", "path"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricError {
    #[error("metric {0} doesn't exist")]
    Unknown(String),
}

/// Identifier of an exportable metric
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum MetricName {
    /// Requests per zone, edge status, client host and request path
    ZoneRequestStatusCountryHost,
}

impl MetricName {
    pub const ALL: [MetricName; 1] = [MetricName::ZoneRequestStatusCountryHost];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ZoneRequestStatusCountryHost => {
                "cloudflare_zone_requests_status_country_host"
            }
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricName {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| MetricError::Unknown(s.to_string()))
    }
}

/// A set of metric names, used both for the catalog and for the denylist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSet(HashSet<MetricName>);

impl MetricsSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every metric the exporter knows how to produce
    pub fn all() -> Self {
        let mut set = Self::new();
        for metric in MetricName::ALL {
            set.add(metric);
        }
        set
    }

    /// Build a denylist from operator-supplied names.
    ///
    /// Fails on the first name that is not part of [`MetricsSet::all`].
    /// Surrounding whitespace is ignored and empty entries are skipped.
    pub fn denylist<I, S>(names: I) -> Result<Self, MetricError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut denied = Self::new();

        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            // Parsing only succeeds for members of the catalog.
            let metric: MetricName = name.parse()?;
            denied.add(metric);
        }

        Ok(denied)
    }

    pub fn contains(&self, metric: MetricName) -> bool {
        self.0.contains(&metric)
    }

    pub fn add(&mut self, metric: MetricName) {
        self.0.insert(metric);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = MetricName> + '_ {
        self.0.iter().copied()
    }
}

/// Owns the Prometheus registry and every counter registered in it.
///
/// Constructed once at startup and shared (behind an `Arc`) between the
/// aggregator and the exposition endpoint. Denylisted metrics are never
/// created, so nothing can write to them.
pub struct MetricRegistry {
    registry: Registry,
    zone_requests: Option<IntCounterVec>,
}

impl MetricRegistry {
    pub fn new(denied: &MetricsSet) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let zone_requests = if denied.contains(MetricName::ZoneRequestStatusCountryHost) {
            None
        } else {
            let counter = IntCounterVec::new(
                Opts::new(
                    MetricName::ZoneRequestStatusCountryHost.as_str(),
                    "Count of requests for zone per edge HTTP status per country per host",
                ),
                &ZONE_REQUEST_LABELS,
            )?;
            registry.register(Box::new(counter.clone()))?;
            Some(counter)
        };

        Ok(Self {
            registry,
            zone_requests,
        })
    }

    /// The request counter, or `None` when it is denylisted
    pub fn zone_requests(&self) -> Option<&IntCounterVec> {
        self.zone_requests.as_ref()
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new().encode(&families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            tracing::error!(error = %e, "Prometheus encoder produced invalid UTF-8");
            prometheus::Error::Msg(format!("metrics output is not valid UTF-8: {e}"))
        })
    }
}
