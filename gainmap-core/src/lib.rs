//! Core gain map math and metadata for HDR images.
//!
//! This crate provides the pure computational components of gain map
//! support:
//! - Rational gain map metadata and its ISO 21496-1 payload
//! - Computing a gain map from a base/alternate rendition pair
//! - Tone mapping a base image to any headroom with its gain map
//! - Validating and assembling grids of equally shaped cells
//! - Transfer functions and primaries conversion
//!
//! There is no container or bitstream dependency. For encode/decode
//! sessions use the `gainmap` crate.
//!
//! # Cooperative Cancellation
//!
//! Long-running operations accept an `impl Stop` parameter from the `enough`
//! crate. Use `Unstoppable` when cancellation is not needed.
//!
//! # Example
//!
//! ```ignore
//! use gainmap_core::{
//!     gainmap::{apply_gainmap, compute_gainmap, GainMapConfig},
//!     GainMap, Image, PixelLayout,
//! };
//! use enough::Unstoppable;
//!
//! let mut gain_map = GainMap::new(Image::new(64, 64, 8, PixelLayout::Gray)?);
//! compute_gainmap(&sdr, &hdr, &mut gain_map, &GainMapConfig::default(), Unstoppable)?;
//!
//! let mut out = Image::new(sdr.width, sdr.height, 10, PixelLayout::Rgb)?;
//! out.transfer = ColorTransfer::Pq;
//! let clli = apply_gainmap(&sdr, &gain_map, 3.0, &mut out, Unstoppable)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

pub mod color;
pub mod gainmap;
pub mod grid;
pub mod metadata;
mod types;

// Re-export core types
pub use types::{
    luminance, ColorGamut, ColorTransfer, ContentLightLevel, Error, ErrorKind, GainMap, Image,
    PixelLayout, Result,
};

pub use metadata::{Fraction, GainMapMetadata, GainMapMetadataFloat, UnsignedFraction};

// Re-export enough for convenience
pub use enough::{Stop, StopReason, Unstoppable};

pub use gainmap::compute::GainMapConfig;
pub use grid::GridLayout;

/// Safety limits for parsing and allocation.
pub mod limits {
    /// Maximum image dimension (width or height).
    pub const MAX_IMAGE_DIMENSION: u32 = 65535;

    /// Maximum total pixels (width * height).
    pub const MAX_TOTAL_PIXELS: u64 = 500_000_000; // 500 megapixels

    /// Maximum grid columns or rows.
    pub const MAX_GRID_DIMENSION: u32 = 256;
}
