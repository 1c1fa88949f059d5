//! Gain map computation and application.
//!
//! A gain map stores per-pixel log2 ratios between two renditions of an
//! image, letting a decoder synthesize any rendition in between from the
//! base image alone.

pub mod apply;
pub mod compute;
pub mod resample;

pub use apply::*;
pub use compute::*;
