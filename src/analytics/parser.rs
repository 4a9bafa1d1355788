//! Flattening of the nested GraphQL analytics payload

use serde::Deserialize;
use serde_json::Value;

use crate::analytics::models::AnalyticsRecord;
use crate::provider::ProviderError;

#[derive(Debug, Deserialize)]
struct AnalyticsData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    zones: Vec<ZoneGroups>,
}

#[derive(Debug, Deserialize)]
struct ZoneGroups {
    #[serde(rename = "zoneTag")]
    zone_tag: String,
    #[serde(rename = "httpRequestsEdgeCountryHost", default)]
    edge_country_host: Option<Vec<RequestGroup>>,
}

#[derive(Debug, Deserialize)]
struct RequestGroup {
    count: u64,
    dimensions: Dimensions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dimensions {
    edge_response_status: u16,
    #[serde(rename = "clientRequestHTTPHost", default)]
    client_request_http_host: String,
}

/// Flatten a `data` payload into one record per request group.
///
/// Zero zones, or a zone with an empty or missing group list, yields no
/// records. The whole payload is rejected only when `viewer.zones` is absent
/// or does not have the expected shape.
pub fn parse(data: Value) -> Result<Vec<AnalyticsRecord>, ProviderError> {
    let data: AnalyticsData = serde_json::from_value(data)
        .map_err(|e| ProviderError::MalformedResponse(format!("unexpected shape: {e}")))?;

    let records = data
        .viewer
        .zones
        .into_iter()
        .flat_map(|zone| {
            let zone_tag = zone.zone_tag;
            zone.edge_country_host
                .unwrap_or_default()
                .into_iter()
                .map(move |group| AnalyticsRecord {
                    zone_tag: zone_tag.clone(),
                    edge_response_status: group.dimensions.edge_response_status,
                    client_host: group.dimensions.client_request_http_host,
                    count: group.count,
                })
        })
        .collect();

    Ok(records)
}
