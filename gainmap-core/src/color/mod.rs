//! Color handling: transfer functions, gamut matrices, sample conversion.

pub mod convert;
pub mod gamut;
pub mod transfer;

pub use convert::*;
pub use gamut::*;
pub use transfer::*;
