//! Gridded anomalies and their spectra.
//!
//! - `CurieGrid`: window extraction and centroid layout (`curie_grid`)
//! - radial / azimuthal power spectra (`spectrum`)
//! - plane and mean removal (`trend`)
//! - upward continuation and reduction to the pole (`filters`)

pub mod curie_grid;
pub mod filters;
pub mod spectrum;
pub mod trend;

pub use curie_grid::*;
pub use filters::*;
pub use spectrum::*;
pub use trend::*;
