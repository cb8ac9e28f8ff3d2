//! Census export - runs the census geo pipeline and prints the result as JSON
//!
//! Usage: census-export [census_geo | census | geo]

use anyhow::{Context, Result};
use queens_census_backend::{CensusGeoPipeline, PipelineConfig};
use serde::Serialize;
use std::env;
use std::io::Write;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded: {} zip codes, census {} {}",
        config.zip_codes.len(),
        config.census.vintage,
        config.census.dataset
    );

    let pipeline = CensusGeoPipeline::new(config)?;

    let target = env::args().nth(1).unwrap_or_else(|| "census_geo".to_string());
    info!("Running target: {}", target);

    let result = match target.as_str() {
        "census_geo" => match pipeline.census_geo().await {
            Ok((joined, _)) => print_json(&joined),
            Err(e) => Err(e.into()),
        },
        "census" => match pipeline.census_data().await {
            Ok(table) => print_json(&table.stats),
            Err(e) => Err(e.into()),
        },
        "geo" => match pipeline.zip_geometries().await {
            Ok(geo) => print_json(&geo),
            Err(e) => Err(e.into()),
        },
        other => Err(anyhow::anyhow!(
            "Unknown target: {} (expected census_geo, census or geo)",
            other
        )),
    };

    if let Err(e) = &result {
        error!("✗ {} failed: {:#}", target, e);
    }

    result
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to write JSON")?;
    writeln!(stdout)?;
    Ok(())
}
