//! Mathematical utilities: FFTs, tapers, least squares, special functions and
//! bounded minimisation.

pub mod fft;
pub mod minimize;
pub mod ols;
pub mod special;
pub mod window;

pub use fft::*;
pub use minimize::*;
pub use ols::*;
pub use special::*;
pub use window::*;
