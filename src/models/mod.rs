//! Spectral depth models.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic.

pub mod spectral;
pub mod tanaka;

pub use spectral::*;
pub use tanaka::*;
