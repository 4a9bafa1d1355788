//! Analytics query construction and execution against the GraphQL API

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Credentials, ProviderError};
use crate::analytics::TimeWindow;

/// Upper bound on records returned per zone group
pub const DEFAULT_QUERY_LIMIT: u32 = 9999;

const ZONE_REQUESTS_QUERY: &str = r#"
query ($zoneIDs: [String!], $mintime: Time!, $maxtime: Time!, $limit: Int!, $requestPath: String!, $domainNames: [String!]) {
  viewer {
    zones(filter: { zoneTag_in: $zoneIDs }) {
      zoneTag
      httpRequestsEdgeCountryHost: httpRequestsAdaptiveGroups(limit: $limit, filter: {
        datetime_geq: $mintime,
        datetime_lt: $maxtime,
        clientRequestPath_like: $requestPath,
        clientRequestHTTPHost_in: $domainNames
      }) {
        count
        dimensions {
          edgeResponseStatus
          clientRequestHTTPHost
        }
      }
    }
  }
}
"#;

/// One analytics request: a zone batch, a host filter and a path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub zone_ids: Vec<String>,
    pub domain_names: Vec<String>,
    pub request_path: String,
    pub window: TimeWindow,
    pub limit: u32,
}

impl AnalyticsQuery {
    pub fn build(
        zone_ids: Vec<String>,
        domain_names: Vec<String>,
        request_path: impl Into<String>,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Self, ProviderError> {
        if zone_ids.is_empty() {
            return Err(ProviderError::Query(
                "an analytics query needs at least one zone".to_string(),
            ));
        }

        Ok(Self {
            zone_ids,
            domain_names,
            request_path: request_path.into(),
            window,
            limit,
        })
    }

    fn variables(&self) -> Variables<'_> {
        Variables {
            zone_ids: &self.zone_ids,
            mintime: self.window.start,
            maxtime: self.window.end,
            limit: self.limit,
            request_path: &self.request_path,
            domain_names: &self.domain_names,
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'static str,
    variables: Variables<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Variables<'a> {
    #[serde(rename = "zoneIDs")]
    zone_ids: &'a [String],
    mintime: DateTime<Utc>,
    maxtime: DateTime<Utc>,
    limit: u32,
    request_path: &'a str,
    domain_names: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Send `query` to the GraphQL endpoint and return its `data` payload.
///
/// Transport failures, error statuses and GraphQL `errors` all map to
/// [`ProviderError::Query`]; a body that is not a GraphQL response at all
/// maps to [`ProviderError::MalformedResponse`].
pub async fn execute(
    http: &Client,
    endpoint: &str,
    query: &AnalyticsQuery,
    credentials: &Credentials,
) -> Result<Value, ProviderError> {
    let request = GraphqlRequest {
        query: ZONE_REQUESTS_QUERY,
        variables: query.variables(),
    };

    let response = credentials
        .authorize(http.post(endpoint))
        .json(&request)
        .send()
        .await
        .map_err(|e| ProviderError::Query(format!("request to {endpoint} failed: {e}")))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| ProviderError::Query(format!("failed to read response body: {e}")))?;

    let payload: GraphqlResponse = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) if !status.is_success() => {
            return Err(ProviderError::Query(format!(
                "GraphQL endpoint returned {status}"
            )));
        }
        Err(e) => {
            return Err(ProviderError::MalformedResponse(format!(
                "response is not a GraphQL envelope: {e}"
            )));
        }
    };

    if let Some(errors) = payload.errors.filter(|errors| !errors.is_empty()) {
        let messages = errors.iter().map(error_message).collect::<Vec<_>>();
        return Err(ProviderError::Query(messages.join("; ")));
    }

    if !status.is_success() {
        return Err(ProviderError::Query(format!(
            "GraphQL endpoint returned {status}"
        )));
    }

    payload
        .data
        .filter(|data| !data.is_null())
        .ok_or_else(|| ProviderError::MalformedResponse("response carries no data".to_string()))
}
