//! Data models for analytics

/// One row of the adaptive request groups for a zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsRecord {
    /// Zone ID the row belongs to
    pub zone_tag: String,

    /// HTTP status returned by the edge
    pub edge_response_status: u16,

    /// Host header sent by the client
    pub client_host: String,

    /// Number of requests in this group
    pub count: u64,
}

/// Label tuple of the request counter
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CounterKey {
    pub zone: String,
    pub status: String,
    pub host: String,
    pub path: String,
}

impl CounterKey {
    pub fn from_record(record: &AnalyticsRecord, zone_name: &str, request_path: &str) -> Self {
        Self {
            zone: zone_name.to_string(),
            status: record.edge_response_status.to_string(),
            host: record.client_host.clone(),
            path: request_path.to_string(),
        }
    }

    /// Label values in [`crate::metrics::ZONE_REQUEST_LABELS`] order
    pub fn label_values(&self) -> [&str; 4] {
        [
            self.zone.as_str(),
            self.status.as_str(),
            self.host.as_str(),
            self.path.as_str(),
        ]
    }
}
