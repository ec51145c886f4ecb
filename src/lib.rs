//! `curie-depth` library crate.
//!
//! Curie-point depth estimation from gridded magnetic anomalies. The binary
//! (`curie`) is a thin wrapper around this library so that:
//!
//! - spectral and fitting code is testable without spawning processes
//! - the building blocks (`CurieGrid`, the spectral models, `CurieOptimise`
//!   and the mapping helpers) can be used directly from other tools

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod grid;
pub mod io;
pub mod mapping;
pub mod math;
pub mod models;
pub mod report;

pub use error::AppError;
pub use fit::{CurieFit, CurieOptimise};
pub use grid::CurieGrid;
pub use mapping::{Crs, convert_extent, grid, transform_coordinates, trim};
pub use models::{bouligand2009, compute_tanaka, maus1995, tanaka1999};
