//! Geo/population fetcher - one GeoJSON export filtered to the target zip codes

use crate::census::types::{GeoRecord, ZipCode, ZipTable};
use crate::census::utils::{http_get_json, parse_number, zip_from_value};
use crate::config::GeoConfig;
use crate::error::FetchError;
use geojson::{FeatureCollection, GeoJson};
use reqwest::Client;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub struct GeoFetcher {
    client: Client,
    config: GeoConfig,
}

impl GeoFetcher {
    pub fn new(client: Client, config: GeoConfig) -> Self {
        GeoFetcher { client, config }
    }

    /// Download the zip code boundary export and keep features in `zip_codes`.
    ///
    /// Any transport, status or parse failure fails the whole fetch.
    #[tracing::instrument(level = "DEBUG", skip_all)]
    pub async fn fetch(&self, zip_codes: &[ZipCode]) -> Result<ZipTable<GeoRecord>, FetchError> {
        info!("Fetching zip code geometries from {}", self.config.url);

        let geojson: GeoJson = http_get_json(self.client.get(&self.config.url)).await?;
        let collection = match geojson {
            GeoJson::FeatureCollection(collection) => collection,
            _ => return Err(FetchError::shape("expected a GeoJSON FeatureCollection")),
        };

        let allowed: HashSet<&str> = zip_codes.iter().map(String::as_str).collect();
        let records = filter_features(collection, &allowed, &self.config);

        info!("Kept {} zip code geometries", records.len());

        Ok(records)
    }
}

/// Extract one [`GeoRecord`] per allowed zip code, in feature order
pub fn filter_features(
    collection: FeatureCollection,
    allowed: &HashSet<&str>,
    config: &GeoConfig,
) -> ZipTable<GeoRecord> {
    let total = collection.features.len();
    let mut records = ZipTable::new();

    for feature in collection.features {
        let zip = match feature.property(&config.zip_field).and_then(zip_from_value) {
            Some(zip) if allowed.contains(zip.as_str()) => zip,
            _ => continue,
        };

        if records.contains_key(&zip) {
            debug!("Ignoring duplicate feature for zip code {}", zip);
            continue;
        }

        let pop_est = match feature.property(&config.population_field).and_then(parse_number) {
            Some(pop) => pop,
            None => {
                warn!(
                    "Skipping zip code {}: missing or non-numeric {}",
                    zip, config.population_field
                );
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(geometry) => geometry,
            None => {
                warn!("Skipping zip code {}: feature has no geometry", zip);
                continue;
            }
        };

        records.insert(zip, GeoRecord { pop_est, geometry });
    }

    debug!("Filtered {} features down to {}", total, records.len());

    records
}
