//! Zone discovery and plan-tier filtering

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::{Credentials, ProviderError};

/// Plan ID Cloudflare assigns to every free-tier zone
pub const FREE_PLAN_ID: &str = "0feeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

const ZONES_PER_PAGE: u32 = 50;

/// API error codes that mean the credentials were rejected
const AUTH_ERROR_CODES: [i64; 4] = [9103, 9106, 9109, 10000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTier {
    Free,
    Paid,
}

impl PlanTier {
    pub fn from_plan_id(plan_id: &str) -> Self {
        if plan_id == FREE_PLAN_ID {
            PlanTier::Free
        } else {
            PlanTier::Paid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub plan_tier: PlanTier,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>, plan_tier: PlanTier) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plan_tier,
        }
    }
}

/// Keep only the zones listed in `ids`, preserving input order.
///
/// An empty allow-list keeps every zone.
pub fn filter_by_id(zones: Vec<Zone>, ids: &[String]) -> Vec<Zone> {
    if ids.is_empty() {
        return zones;
    }
    zones
        .into_iter()
        .filter(|z| ids.iter().any(|id| id == &z.id))
        .collect()
}

/// Drop free-tier zones; the adaptive analytics datasets are paid-only.
pub fn filter_paid_tier(zones: Vec<Zone>) -> Vec<Zone> {
    zones
        .into_iter()
        .filter(|z| z.plan_tier != PlanTier::Free)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ZonesPage {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    errors: Option<Vec<ApiMessage>>,
    #[serde(default)]
    result: Option<Vec<ZoneResult>>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ZoneResult {
    id: String,
    name: String,
    #[serde(default)]
    plan: Option<PlanResult>,
}

#[derive(Debug, Deserialize)]
struct PlanResult {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

impl From<ZoneResult> for Zone {
    fn from(z: ZoneResult) -> Self {
        let plan_tier = z
            .plan
            .map(|p| PlanTier::from_plan_id(&p.id))
            .unwrap_or(PlanTier::Paid);
        Zone::new(z.id, z.name, plan_tier)
    }
}

/// Fetch every zone visible to `credentials`, following pagination
pub async fn list_zones(
    http: &Client,
    api_url: &str,
    credentials: &Credentials,
) -> Result<Vec<Zone>, ProviderError> {
    let endpoint = format!("{}/zones", api_url.trim_end_matches('/'));
    let mut zones = Vec::new();
    let mut page: u32 = 1;

    loop {
        let url = Url::parse_with_params(
            &endpoint,
            &[
                ("page", page.to_string()),
                ("per_page", ZONES_PER_PAGE.to_string()),
            ],
        )
        .map_err(|e| ProviderError::Unavailable(format!("invalid zones URL {endpoint}: {e}")))?;

        let response = credentials
            .authorize(http.get(url))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("failed to request zones: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!(
                "zones endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "zones endpoint returned {status}"
            )));
        }

        let body: ZonesPage = response.json().await.map_err(|e| {
            ProviderError::Unavailable(format!("failed to parse zones response: {e}"))
        })?;

        if body.success == Some(false) {
            let errors = body.errors.unwrap_or_default();
            let messages = errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect::<Vec<_>>()
                .join("; ");
            if errors.iter().any(|e| AUTH_ERROR_CODES.contains(&e.code)) {
                return Err(ProviderError::Auth(messages));
            }
            return Err(ProviderError::Unavailable(messages));
        }

        zones.extend(body.result.unwrap_or_default().into_iter().map(Zone::from));

        let total_pages = body.result_info.map(|i| i.total_pages).unwrap_or(1);
        if page >= total_pages {
            break;
        }
        page += 1;
    }

    debug!(count = zones.len(), pages = page, "Fetched zone list");
    Ok(zones)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(zones: &[Zone]) -> Vec<&str> {
        zones.iter().map(|z| z.id.as_str()).collect()
    }

    #[test]
    fn test_filter_paid_tier() {
        let zones = vec![
            Zone::new("z1", "free.example", PlanTier::Free),
            Zone::new("z2", "paid.example", PlanTier::Paid),
        ];
        let paid = filter_paid_tier(zones);
        assert_eq!(paid, vec![Zone::new("z2", "paid.example", PlanTier::Paid)]);
    }

    #[test]
    fn test_filter_by_id_preserves_order() {
        let zones = vec![
            Zone::new("a", "a.example", PlanTier::Paid),
            Zone::new("b", "b.example", PlanTier::Paid),
            Zone::new("c", "c.example", PlanTier::Paid),
        ];
        let kept = filter_by_id(zones, &["c".to_string(), "a".to_string()]);
        assert_eq!(ids(&kept), vec!["a", "c"]);
    }

    #[test]
    fn test_filter_by_id_empty_allow_list_keeps_all() {
        let zones = vec![
            Zone::new("a", "a.example", PlanTier::Free),
            Zone::new("b", "b.example", PlanTier::Paid),
        ];
        assert_eq!(filter_by_id(zones, &[]).len(), 2);
    }

    #[test]
    fn test_plan_tier_from_plan_id() {
        assert_eq!(PlanTier::from_plan_id(FREE_PLAN_ID), PlanTier::Free);
        assert_eq!(
            PlanTier::from_plan_id("94f3b7b768b0458b56d2cac4fe5ec0f9"),
            PlanTier::Paid
        );
    }

    #[test]
    fn test_zone_without_plan_counts_as_paid() {
        let zone: Zone = ZoneResult {
            id: "z".into(),
            name: "z.example".into(),
            plan: None,
        }
        .into();
        assert_eq!(zone.plan_tier, PlanTier::Paid);
    }
}
