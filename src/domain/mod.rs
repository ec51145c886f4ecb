//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - grid geometry (`Extent`) and spectrum options (`TaperKind`, `Detrend`)
//! - spectra (`RadialSpectrum`, `AzimuthSector`)
//! - model parameters, priors and bounds (`CurieParams`, `Priors`, `ParamBounds`)
//! - fit outputs (`DepthEstimate`, `TanakaDepths`, `ResultsFile`)

pub mod types;

pub use types::*;
