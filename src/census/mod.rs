//! Census geo-join pipeline - per-zip demographics joined with zip code geometry

pub mod demographics;
pub mod geo;
pub mod join;
pub mod pipeline;
pub mod types;
pub mod utils;

pub use pipeline::CensusGeoPipeline;
pub use types::*;
