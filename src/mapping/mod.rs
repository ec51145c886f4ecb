//! Map-making utilities: coordinate transforms and raster helpers.

pub mod crs;
pub mod raster;

pub use crs::*;
pub use raster::*;
