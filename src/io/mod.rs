//! Input/output helpers.
//!
//! - ESRI ASCII grid and XYZ CSV ingest (`ingest`)
//! - depth-map / spectrum CSV and grid exports (`export`)
//! - results JSON read/write (`results`)
//! - TOML run configuration (`config`)

pub mod config;
pub mod export;
pub mod ingest;
pub mod results;

pub use config::*;
pub use export::*;
pub use ingest::*;
pub use results::*;
