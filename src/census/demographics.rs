//! Demographics fetcher - per-zip census queries with partial-failure tolerance

use crate::census::types::{DemographicsTable, StatVector, ZipCode, ZipFailure};
use crate::census::utils::{http_get_json, parse_number};
use crate::config::{CensusConfig, FetchPolicy};
use crate::error::{CensusError, FetchError};
use futures::stream::{self, StreamExt};
use indexmap::{IndexMap, IndexSet};
use reqwest::Client;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Geography column the census API appends to every ZCTA response
const ZCTA_GEOGRAPHY: &str = "zip code tabulation area";

/// Fetches one [`StatVector`] per zip code from the census data API.
///
/// Zip codes are queried individually (the API has no multi-ZCTA filter for
/// this dataset) through a bounded pool of concurrent requests. A zip code
/// that fails is logged and skipped; only a run where every zip code fails is
/// an error.
pub struct DemographicsFetcher {
    client: Client,
    config: CensusConfig,
    policy: FetchPolicy,
}

impl DemographicsFetcher {
    pub fn new(client: Client, config: CensusConfig, policy: FetchPolicy) -> Self {
        DemographicsFetcher {
            client,
            config,
            policy,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.vintage,
            self.config.dataset
        )
    }

    /// Fetch demographics for every zip code in `zip_codes`.
    ///
    /// Successful vectors come back in `zip_codes` order regardless of which
    /// request finished first. Zip codes still pending when the fetch deadline
    /// passes are recorded as [`FetchError::DeadlineExceeded`]. Repeated zip
    /// codes are queried once.
    pub async fn fetch(&self, zip_codes: &[ZipCode]) -> Result<DemographicsTable, CensusError> {
        let targets: IndexSet<&ZipCode> = zip_codes.iter().collect();
        if targets.len() < zip_codes.len() {
            debug!(
                "Ignoring {} repeated zip codes",
                zip_codes.len() - targets.len()
            );
        }

        info!(
            "Fetching demographics for {} zip codes ({} variables, {} concurrent)",
            targets.len(),
            self.config.variables.len(),
            self.policy.concurrency.max(1)
        );

        let deadline = Instant::now() + self.policy.fetch_deadline;

        let mut results: Vec<(usize, &ZipCode, Result<StatVector, FetchError>)> =
            stream::iter(targets.iter().copied().enumerate())
                .map(|(idx, zip)| async move {
                    if Instant::now() >= deadline {
                        return (idx, zip, Err(FetchError::DeadlineExceeded));
                    }
                    let result = tokio::time::timeout_at(deadline, self.fetch_zip(zip))
                        .await
                        .unwrap_or(Err(FetchError::DeadlineExceeded));
                    (idx, zip, result)
                })
                .buffer_unordered(self.policy.concurrency.max(1))
                .collect()
                .await;

        results.sort_by_key(|(idx, _, _)| *idx);

        let mut table = DemographicsTable::default();
        for (_, zip, result) in results {
            match result {
                Ok(stats) => {
                    table.stats.insert(zip.clone(), stats);
                }
                Err(error) => {
                    warn!("Skipping zip code {}: {}", zip, error);
                    table.failures.push(ZipFailure {
                        zip_code: zip.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "Demographics complete: {} fetched, {} skipped",
            table.stats.len(),
            table.failures.len()
        );

        if table.stats.is_empty() {
            return Err(CensusError::NoDemographics {
                attempted: targets.len(),
            });
        }

        Ok(table)
    }

    /// Fetch one zip code, retrying transient failures with exponential backoff
    pub async fn fetch_zip(&self, zip: &str) -> Result<StatVector, FetchError> {
        let mut attempt = 0;
        loop {
            match self.query_zip(zip).await {
                Ok(stats) => return Ok(stats),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff_for(attempt);
                    debug!(
                        "Retrying zip code {} in {:?} (attempt {}): {}",
                        zip,
                        delay,
                        attempt + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn query_zip(&self, zip: &str) -> Result<StatVector, FetchError> {
        let codes: Vec<&str> = self.config.variables.values().map(String::as_str).collect();

        let mut request = self.client.get(self.endpoint()).query(&[
            ("get", codes.join(",")),
            ("for", format!("{}:{}", ZCTA_GEOGRAPHY, zip)),
        ]);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key)]);
        }

        let table: Vec<Vec<Value>> = http_get_json(request).await?;
        parse_zcta_row(zip, table, &self.config.variables)
    }
}

/// Turn a census response table (header row + one data row) into a [`StatVector`]
/// keyed by statistic name, in the order of `variables`.
pub fn parse_zcta_row(
    zip: &str,
    table: Vec<Vec<Value>>,
    variables: &IndexMap<String, String>,
) -> Result<StatVector, FetchError> {
    let mut rows = table.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| FetchError::shape("missing header row"))?;
    let data = rows
        .next()
        .ok_or_else(|| FetchError::shape("missing data row"))?;

    if header.len() != data.len() {
        return Err(FetchError::shape(format!(
            "header has {} columns but data row has {}",
            header.len(),
            data.len()
        )));
    }

    let column = |code: &str| header.iter().position(|h| h.as_str() == Some(code));

    // The geography column is optional, but if present it must match the request
    if let Some(idx) = column(ZCTA_GEOGRAPHY) {
        if data[idx].as_str() != Some(zip) {
            return Err(FetchError::shape(format!(
                "response is for zip code {} not {}",
                data[idx], zip
            )));
        }
    }

    let mut stats = StatVector::with_capacity(variables.len());
    for (name, code) in variables {
        let idx = column(code.as_str())
            .ok_or_else(|| FetchError::shape(format!("variable {} missing from response", code)))?;
        stats.insert(name.clone(), parse_number(&data[idx]));
    }

    Ok(stats)
}
