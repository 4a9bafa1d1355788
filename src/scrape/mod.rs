//! Scrape cycle orchestration
//!
//! One cycle lists the zones once, narrows them to the configured paid-tier
//! zones, and then queries every request-path pattern for each batch of at
//! most ten zones. Batches run concurrently and are joined before the cycle
//! ends; paths within a batch run one after another. A failing path only
//! loses its own records for that cycle.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::analytics::{parse, Aggregator, AnalyticsRecord, TimeWindow};
use crate::config::ScrapeConfig;
use crate::metrics::MetricRegistry;
use crate::provider::{
    filter_by_id, filter_paid_tier, AnalyticsProvider, AnalyticsQuery, ProviderError,
};

/// Outcome of one scrape cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Zones left after the ID and tier filters
    pub zones: usize,
    /// Analytics queries attempted
    pub queries: usize,
    /// Queries that failed, timed out or returned an unusable payload
    pub failed_queries: usize,
    /// Records folded into counters
    pub records: usize,
    /// Zone groups that hit the query limit and may be missing rows
    pub truncated: usize,
}

impl CycleReport {
    fn merge(&mut self, other: CycleReport) {
        self.queries += other.queries;
        self.failed_queries += other.failed_queries;
        self.records += other.records;
        self.truncated += other.truncated;
    }
}

struct Inner {
    provider: Arc<dyn AnalyticsProvider>,
    aggregator: Aggregator,
    config: ScrapeConfig,
}

#[derive(Clone)]
pub struct ScrapeOrchestrator {
    inner: Arc<Inner>,
}

impl ScrapeOrchestrator {
    pub fn new(
        provider: Arc<dyn AnalyticsProvider>,
        registry: Arc<MetricRegistry>,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                aggregator: Aggregator::new(registry),
                config,
            }),
        }
    }

    /// Run one full cycle over every configured request path.
    ///
    /// Only a failure to list zones is returned as an error, including a
    /// listing that outlasts the query timeout. Per-path query failures are
    /// logged and counted in the report.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, ProviderError> {
        let config = &self.inner.config;

        // None of the adaptive datasets are available on the free tier
        if config.free_tier {
            debug!("Free tier mode, skipping zone analytics");
            return Ok(CycleReport::default());
        }

        let timeout = config.query_timeout;
        let zones = tokio::time::timeout(timeout, self.inner.provider.list_zones())
            .await
            .map_err(|_| {
                ProviderError::Unavailable(format!("zone listing timed out after {timeout:?}"))
            })??;
        let zone_names: Arc<HashMap<String, String>> = Arc::new(
            zones
                .iter()
                .map(|z| (z.id.clone(), z.name.clone()))
                .collect(),
        );

        let selected = filter_paid_tier(filter_by_id(zones, &config.zone_ids));
        if selected.is_empty() {
            info!("No paid-tier zones selected, nothing to scrape");
            return Ok(CycleReport::default());
        }

        let window = TimeWindow::compute(now, config.scrape_delay_secs);
        debug!(
            zones = selected.len(),
            paths = config.request_paths.len(),
            start = %window.start,
            end = %window.end,
            "Starting scrape cycle"
        );

        let mut report = CycleReport {
            zones: selected.len(),
            ..Default::default()
        };

        let mut batches = JoinSet::new();
        for chunk in selected.chunks(config.batch_size.max(1)) {
            let zone_ids: Vec<String> = chunk.iter().map(|z| z.id.clone()).collect();
            let inner = Arc::clone(&self.inner);
            let zone_names = Arc::clone(&zone_names);
            batches.spawn(async move { inner.scrape_batch(zone_ids, &zone_names, window).await });
        }

        while let Some(joined) = batches.join_next().await {
            match joined {
                Ok(batch) => report.merge(batch),
                Err(e) => error!("Zone batch task aborted: {}", e),
            }
        }

        info!(
            zones = report.zones,
            queries = report.queries,
            failed = report.failed_queries,
            records = report.records,
            truncated = report.truncated,
            "Scrape cycle finished"
        );
        Ok(report)
    }

    /// Run a cycle on every tick of the configured interval.
    ///
    /// The first cycle starts immediately. Returns only when the zone list
    /// cannot be fetched, which leaves the exporter without anything to scrape.
    pub async fn run(self) -> Result<(), ProviderError> {
        let mut ticker = tokio::time::interval(self.inner.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle(Utc::now()).await {
                error!("Failed to list zones, stopping scrape loop: {}", e);
                return Err(e);
            }
        }
    }
}

impl Inner {
    async fn scrape_batch(
        &self,
        zone_ids: Vec<String>,
        zone_names: &HashMap<String, String>,
        window: TimeWindow,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        for request_path in &self.config.request_paths {
            report.queries += 1;
            match self
                .scrape_path(&zone_ids, request_path, zone_names, window)
                .await
            {
                Ok(outcome) => {
                    report.records += outcome.records;
                    report.truncated += outcome.truncated;
                }
                Err(e) => {
                    report.failed_queries += 1;
                    error!(
                        path = %request_path,
                        zones = zone_ids.len(),
                        "Skipping request path for this cycle: {}",
                        e
                    );
                }
            }
        }

        report
    }

    async fn scrape_path(
        &self,
        zone_ids: &[String],
        request_path: &str,
        zone_names: &HashMap<String, String>,
        window: TimeWindow,
    ) -> Result<PathOutcome, ProviderError> {
        let query = AnalyticsQuery::build(
            zone_ids.to_vec(),
            self.config.domain_names.clone(),
            request_path,
            window,
            self.config.query_limit,
        )?;

        let timeout = self.config.query_timeout;
        let data = tokio::time::timeout(timeout, self.provider.fetch_analytics(&query))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))??;

        let records = parse(data)?;
        let truncated = warn_if_truncated(&records, query.limit, request_path);

        self.aggregator.fold(
            &records,
            |id| zone_names.get(id).map(String::as_str),
            request_path,
        );
        Ok(PathOutcome {
            records: records.len(),
            truncated,
        })
    }
}

struct PathOutcome {
    records: usize,
    truncated: usize,
}

/// A zone group that filled the limit was probably cut short by the provider.
///
/// Returns how many zone groups reached the limit.
fn warn_if_truncated(records: &[AnalyticsRecord], limit: u32, request_path: &str) -> usize {
    let mut per_zone: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *per_zone.entry(record.zone_tag.as_str()).or_insert(0) += 1;
    }

    let mut truncated = 0;
    for (zone, rows) in per_zone {
        if rows >= limit as usize {
            truncated += 1;
            warn!(
                zone,
                path = %request_path,
                limit,
                "Analytics result reached the query limit, counts may be incomplete; consider raising QUERY_LIMIT"
            );
        }
    }
    truncated
}
