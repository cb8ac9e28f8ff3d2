//! Core data types for the census geo-join pipeline
//! Pure data structures with no behavior

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// 5-digit USPS zip code (ZCTA)
pub type ZipCode = String;

/// Zip-keyed table that keeps insertion order when iterated or serialized
pub type ZipTable<T> = IndexMap<ZipCode, T>;

/// Statistic name -> estimate, in configured order. `None` where the census reports no value.
pub type StatVector = IndexMap<String, Option<f64>>;

/// Population estimate and boundary for one zip code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoRecord {
    pub pop_est: f64,
    pub geometry: geojson::Geometry,
}

/// Output record: geometry and population joined with census demographics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRecord {
    pub geometry: geojson::Geometry,
    pub pop_est: f64,
    pub census_data: StatVector,
}

/// A zip code whose demographics query did not succeed
#[derive(Debug)]
pub struct ZipFailure {
    pub zip_code: ZipCode,
    pub error: FetchError,
}

/// Result of a demographics fetch: successes in target order plus the skipped zip codes
#[derive(Debug, Default)]
pub struct DemographicsTable {
    pub stats: ZipTable<StatVector>,
    pub failures: Vec<ZipFailure>,
}

impl DemographicsTable {
    pub fn attempted(&self) -> usize {
        self.stats.len() + self.failures.len()
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub zips_attempted: usize,
    pub demographics_fetched: usize,
    pub demographics_failed: usize,
    pub geo_features: usize,
    pub joined: usize,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "attempted: {}, demographics: {} ok / {} failed, geo features: {}, joined: {} ({} ms)",
            self.zips_attempted,
            self.demographics_fetched,
            self.demographics_failed,
            self.geo_features,
            self.joined,
            (self.completed_at - self.started_at).num_milliseconds()
        )
    }
}
