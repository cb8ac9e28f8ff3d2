//! Census geo pipeline - wires the fetchers and the join together

use crate::census::demographics::DemographicsFetcher;
use crate::census::geo::GeoFetcher;
use crate::census::join::join_by_zip;
use crate::census::types::{DemographicsTable, GeoRecord, JoinedRecord, RunReport, ZipTable};
use crate::census::utils::build_client;
use crate::config::PipelineConfig;
use crate::error::CensusError;
use chrono::Utc;
use tracing::info;

/// Entry point for callers (an HTTP layer, the CLI).
///
/// Holds one pooled HTTP client shared by both fetchers. Nothing is cached
/// between calls.
pub struct CensusGeoPipeline {
    demographics: DemographicsFetcher,
    geo: GeoFetcher,
    config: PipelineConfig,
}

impl CensusGeoPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, CensusError> {
        let client = build_client(&config.policy).map_err(CensusError::Client)?;

        Ok(CensusGeoPipeline {
            demographics: DemographicsFetcher::new(
                client.clone(),
                config.census.clone(),
                config.policy.clone(),
            ),
            geo: GeoFetcher::new(client, config.geo.clone()),
            config,
        })
    }

    /// Demographics for every configured zip code
    pub async fn census_data(&self) -> Result<DemographicsTable, CensusError> {
        self.demographics.fetch(&self.config.zip_codes).await
    }

    /// Geometry and population for every configured zip code
    pub async fn zip_geometries(&self) -> Result<ZipTable<GeoRecord>, CensusError> {
        self.geo
            .fetch(&self.config.zip_codes)
            .await
            .map_err(CensusError::Geo)
    }

    /// Fetch both sources concurrently and inner-join them by zip code
    pub async fn census_geo(&self) -> Result<(ZipTable<JoinedRecord>, RunReport), CensusError> {
        let started_at = Utc::now();
        info!(
            "Building census geo data for {} zip codes",
            self.config.zip_codes.len()
        );

        let (demographics, geo) = tokio::join!(self.census_data(), self.zip_geometries());
        let (demographics, geo) = (demographics?, geo?);

        let zips_attempted = demographics.attempted();
        let demographics_failed = demographics.failures.len();
        let demographics_fetched = demographics.stats.len();
        let geo_features = geo.len();

        let joined = join_by_zip(demographics.stats, geo);

        let report = RunReport {
            started_at,
            completed_at: Utc::now(),
            zips_attempted,
            demographics_fetched,
            demographics_failed,
            geo_features,
            joined: joined.len(),
        };
        info!("Census geo data complete: {}", report);

        Ok((joined, report))
    }

    /// Blocking wrapper around [`Self::census_geo`].
    ///
    /// Starts its own current-thread runtime, so it must not be called from
    /// within an async context.
    pub fn census_geo_blocking(&self) -> Result<ZipTable<JoinedRecord>, CensusError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CensusError::Runtime)?;

        runtime.block_on(self.census_geo()).map(|(joined, _)| joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CensusConfig, GeoConfig};
    use crate::test_utils::{spawn_mock, test_policy};
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use indexmap::IndexMap;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn census(Query(params): Query<HashMap<String, String>>) -> Response {
        let zip = params
            .get("for")
            .and_then(|f| f.strip_prefix("zip code tabulation area:"))
            .unwrap_or_default()
            .to_string();

        match zip.as_str() {
            "11101" => Json(json!([
                ["B01001_001E", "zip code tabulation area"],
                ["100", "11101"]
            ]))
            .into_response(),
            "11103" => Json(json!([
                ["B01001_001E", "zip code tabulation area"],
                ["300", "11103"]
            ]))
            .into_response(),
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    fn zcta_document() -> Value {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [[[-73.94, 40.74], [-73.93, 40.74], [-73.93, 40.75], [-73.94, 40.74]]]
        });
        json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "modzcta": "11101", "pop_est": "105" }, "geometry": polygon },
                { "type": "Feature", "properties": { "modzcta": "11102", "pop_est": "50" }, "geometry": polygon },
                { "type": "Feature", "properties": { "modzcta": "10001", "pop_est": "70" }, "geometry": polygon }
            ]
        })
    }

    fn config(base: &str, geo_path: &str) -> PipelineConfig {
        PipelineConfig {
            census: CensusConfig {
                base_url: base.to_string(),
                variables: IndexMap::from([(
                    "total_population".to_string(),
                    "B01001_001E".to_string(),
                )]),
                ..CensusConfig::default()
            },
            geo: GeoConfig {
                url: format!("{}{}", base, geo_path),
                ..GeoConfig::default()
            },
            zip_codes: vec!["11101".into(), "11102".into(), "11103".into()],
            policy: test_policy(),
        }
    }

    async fn upstream() -> String {
        spawn_mock(
            Router::new()
                .route("/2023/acs/acs5", get(census))
                .route("/zcta.geojson", get(|| async { Json(zcta_document()) }))
                .route("/down.geojson", get(|| async { StatusCode::SERVICE_UNAVAILABLE })),
        )
        .await
    }

    #[tokio::test]
    async fn test_census_geo_inner_join() {
        let base = upstream().await;
        let pipeline = CensusGeoPipeline::new(config(&base, "/zcta.geojson")).unwrap();

        let (joined, report) = pipeline.census_geo().await.unwrap();

        // 11102 has geometry but no demographics, 11103 the reverse
        assert_eq!(joined.keys().collect::<Vec<_>>(), vec!["11101"]);
        let record = &joined["11101"];
        assert_eq!(record.pop_est, 105.0);
        assert_eq!(record.census_data["total_population"], Some(100.0));

        assert_eq!(report.zips_attempted, 3);
        assert_eq!(report.demographics_fetched, 2);
        assert_eq!(report.demographics_failed, 1);
        assert_eq!(report.geo_features, 2);
        assert_eq!(report.joined, 1);
    }

    #[tokio::test]
    async fn test_geo_failure_propagates() {
        let base = upstream().await;
        let pipeline = CensusGeoPipeline::new(config(&base, "/down.geojson")).unwrap();

        let result = pipeline.census_geo().await;

        assert!(matches!(result, Err(CensusError::Geo(_))));
    }

    #[tokio::test]
    async fn test_no_demographics_propagates() {
        let base = upstream().await;
        let mut config = config(&base, "/zcta.geojson");
        config.zip_codes = vec!["11102".into(), "11104".into()];
        let pipeline = CensusGeoPipeline::new(config).unwrap();

        let result = pipeline.census_geo().await;

        assert!(matches!(
            result,
            Err(CensusError::NoDemographics { attempted: 2 })
        ));
    }

    #[test]
    fn test_blocking_entry_point() {
        // Upstream mock needs its own runtime on a separate thread
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                tx.send(upstream().await).unwrap();
                std::future::pending::<()>().await;
            });
        });
        let base = rx.recv().unwrap();

        let pipeline = CensusGeoPipeline::new(config(&base, "/zcta.geojson")).unwrap();
        let joined = pipeline.census_geo_blocking().unwrap();

        assert_eq!(joined.len(), 1);
        assert!(joined.contains_key("11101"));
    }
}
