//! Encode and decode sessions for images carrying HDR gain maps.
//!
//! A gain map lets one file hold both an SDR and an HDR rendition: the base
//! image plus per-pixel log2 ratios to the alternate rendition. A viewer tone
//! maps to its own headroom, anywhere between the two.
//!
//! # Crate Structure
//!
//! - [`gainmap_core`] - Gain map math, metadata and grid rules (no container)
//! - `gainmap` (this crate) - Encoder/decoder sessions over an in-memory
//!   item model
//!
//! # Example
//!
//! ```ignore
//! use gainmap::{read, AddImageFlags, DecoderOptions, Encoder, Unstoppable};
//!
//! let mut encoder = Encoder::new();
//! encoder.add_image(&base_with_gain_map, 1, AddImageFlags::SINGLE)?;
//! let encoded = encoder.finish()?;
//!
//! let options = DecoderOptions {
//!     enable_decoding_gain_map: true,
//!     enable_parsing_gain_map_metadata: true,
//!     ..Default::default()
//! };
//! let mut decoder = gainmap::Decoder::new(&encoded, options);
//! decoder.parse()?;
//! decoder.next_image()?;
//! let clli = decoder.tone_map(2.0, &mut output, Unstoppable)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export everything from gainmap-core
pub use gainmap_core::color;
pub use gainmap_core::gainmap;
pub use gainmap_core::grid;
pub use gainmap_core::metadata;

// Re-export core types at crate root
pub use gainmap_core::{
    limits, luminance, ColorGamut, ColorTransfer, ContentLightLevel, Error, ErrorKind, Fraction,
    GainMap, GainMapConfig, GainMapMetadata, GainMapMetadataFloat, GridLayout, Image,
    PixelLayout, Result, Stop, StopReason, Unstoppable, UnsignedFraction,
};

// This crate's additional modules
pub mod container;

mod decode;
mod encode;

// Re-export encoder/decoder
pub use decode::{read, Decoder, DecoderOptions};
pub use encode::{encode, AddImageFlags, Encoder};
