// Library module for the Queens census geo pipeline

pub mod census;
pub mod config;
pub mod error;

#[cfg(test)]
mod test_utils;

pub use census::CensusGeoPipeline;
pub use config::PipelineConfig;
pub use error::{CensusError, FetchError};
