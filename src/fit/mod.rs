//! Parameter estimation for the Bouligand model.
//!
//! Responsibilities:
//!
//! - bounded minimisation of the spectral misfit per window (`optimise`)
//! - parallel fitting across a centroid lattice
//! - MCMC and sensitivity sampling for uncertainties (`sampling`)

pub mod optimise;
pub mod sampling;

pub use optimise::*;
pub use sampling::*;
