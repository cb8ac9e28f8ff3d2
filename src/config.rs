//! Pipeline configuration - upstream endpoints, credentials, target zip codes and fetch policy

use crate::census::types::ZipCode;
use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Queens County zip codes
#[rustfmt::skip]
pub const QUEENS_ZIPS: &[&str] = &[
    "11004", "11005",
    "11101", "11102", "11103", "11104", "11105", "11106", "11109",
    "11351", "11354", "11355", "11356", "11357", "11358", "11359", "11360",
    "11361", "11362", "11363", "11364", "11365", "11366", "11367", "11368",
    "11369", "11370", "11371", "11372", "11373", "11374", "11375", "11377",
    "11378", "11379", "11385",
    "11411", "11412", "11413", "11414", "11415", "11416", "11417", "11418",
    "11419", "11420", "11421", "11422", "11423", "11426", "11427", "11428",
    "11429", "11432", "11433", "11434", "11435", "11436",
    "11691", "11692", "11693", "11694", "11697",
];

/// ACS 5-year variables requested per zip code, as (statistic name, variable code)
pub const ACS_VARIABLES: &[(&str, &str)] = &[
    ("total_population", "B01001_001E"),
    ("male_population", "B01001_002E"),
    ("female_population", "B01001_026E"),
    ("median_age", "B01002_001E"),
    ("median_household_income", "B19013_001E"),
    ("race_total", "B02001_001E"),
    ("white", "B02001_002E"),
    ("black", "B02001_003E"),
    ("american_indian_alaska_native", "B02001_004E"),
    ("asian", "B02001_005E"),
    ("native_hawaiian_pacific", "B02001_006E"),
    ("some_other_race", "B02001_007E"),
    ("two_or_more_races", "B02001_008E"),
    ("hispanic_any_race", "B03003_003E"),
    ("employed_16plus_total", "C24010_001E"),
    // Occupation by sex (civilian employed 16+)
    ("occ_mgmt_male", "C24010_002E"),
    ("occ_service_male", "C24010_003E"),
    ("occ_sales_office_male", "C24010_004E"),
    ("occ_natres_const_maint_male", "C24010_005E"),
    ("occ_prod_transp_mat_male", "C24010_006E"),
    ("occ_total_female", "C24010_007E"),
    ("occ_mgmt_female", "C24010_008E"),
    ("occ_service_female", "C24010_009E"),
    ("occ_sales_office_female", "C24010_010E"),
    ("occ_natres_const_maint_female", "C24010_011E"),
    ("occ_prod_transp_mat_female", "C24010_012E"),
];

pub const DEFAULT_CENSUS_BASE_URL: &str = "https://api.census.gov/data";
pub const DEFAULT_ZCTA_GEOJSON_URL: &str =
    "https://data.cityofnewyork.us/resource/pri4-ifjk.geojson";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FETCH_DEADLINE_SECS: u64 = 300;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Census data API settings
#[derive(Debug, Clone)]
pub struct CensusConfig {
    pub base_url: String,
    pub dataset: String,
    pub vintage: u16,
    pub api_key: Option<String>,
    /// Statistic name -> upstream variable code, in output order
    pub variables: IndexMap<String, String>,
}

impl Default for CensusConfig {
    fn default() -> Self {
        CensusConfig {
            base_url: DEFAULT_CENSUS_BASE_URL.to_string(),
            dataset: "acs/acs5".to_string(),
            vintage: 2023,
            api_key: None,
            variables: ACS_VARIABLES
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect(),
        }
    }
}

/// Zip code geometry/population export settings
#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub url: String,
    pub zip_field: String,
    pub population_field: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        GeoConfig {
            url: DEFAULT_ZCTA_GEOJSON_URL.to_string(),
            zip_field: "modzcta".to_string(),
            population_field: "pop_est".to_string(),
        }
    }
}

/// Timeouts, retries and concurrency for upstream requests
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Maximum in-flight demographics queries
    pub concurrency: usize,
    pub request_timeout: Duration,
    /// Budget for the whole demographics fetch; unfinished zip codes are skipped
    pub fetch_deadline: Duration,
    pub max_retries: u32,
    /// Base delay, doubled on every retry
    pub retry_backoff: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            concurrency: 8,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            fetch_deadline: Duration::from_secs(DEFAULT_FETCH_DEADLINE_SECS),
            max_retries: 2,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl FetchPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Everything the pipeline needs, passed in at construction
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub census: CensusConfig,
    pub geo: GeoConfig,
    pub zip_codes: Vec<ZipCode>,
    pub policy: FetchPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            census: CensusConfig::default(),
            geo: GeoConfig::default(),
            zip_codes: QUEENS_ZIPS.iter().map(|z| z.to_string()).collect(),
            policy: FetchPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to Queens defaults
    pub fn from_env() -> Result<Self> {
        let defaults = PipelineConfig::default();

        Ok(PipelineConfig {
            census: CensusConfig {
                base_url: env_string("CENSUS_BASE_URL", defaults.census.base_url),
                dataset: env_string("CENSUS_DATASET", defaults.census.dataset),
                vintage: env_parse("CENSUS_VINTAGE", defaults.census.vintage)?,
                api_key: env::var("CENSUS_API_KEY").ok().filter(|k| !k.is_empty()),
                variables: defaults.census.variables,
            },
            geo: GeoConfig {
                url: env_string("ZCTA_GEOJSON_URL", defaults.geo.url),
                zip_field: env_string("ZCTA_ZIP_FIELD", defaults.geo.zip_field),
                population_field: env_string(
                    "ZCTA_POPULATION_FIELD",
                    defaults.geo.population_field,
                ),
            },
            zip_codes: defaults.zip_codes,
            policy: FetchPolicy {
                concurrency: env_parse("FETCH_CONCURRENCY", defaults.policy.concurrency)?,
                request_timeout: Duration::from_secs(env_parse(
                    "REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?),
                fetch_deadline: Duration::from_secs(env_parse(
                    "FETCH_DEADLINE_SECS",
                    DEFAULT_FETCH_DEADLINE_SECS,
                )?),
                max_retries: env_parse("MAX_RETRIES", defaults.policy.max_retries)?,
                retry_backoff: Duration::from_millis(env_parse(
                    "RETRY_BACKOFF_MS",
                    DEFAULT_RETRY_BACKOFF_MS,
                )?),
            },
        })
    }
}

fn env_string(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => parse_setting(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_setting<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("{} must be a valid value (got {:?}): {}", key, raw, e))
}
