//! Core types shared by gain map computation, application and grids.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use enough::StopReason;
use thiserror::Error;

use crate::limits;
use crate::metadata::GainMapMetadata;

/// Errors that can occur during gain map operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Operation was stopped via cooperative cancellation.
    #[error("operation stopped: {0}")]
    Stopped(StopReason),

    /// An input violated the operation's contract.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Image dimensions are invalid (zero or too large).
    #[error("invalid image dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    /// Grid cells are inconsistent with each other or with the layout.
    #[error("invalid image grid: {0}")]
    InvalidImageGrid(String),

    /// The inputs are valid but the feature combination is unsupported.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// No pixel content was requested, so none was produced.
    #[error("no content: {0}")]
    NoContent(&'static str),

    /// Serialized gain map metadata is malformed.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Input exceeds safety limits.
    #[error("input exceeds safety limit: {0}")]
    LimitExceeded(String),

    /// Unexpected failure in a collaborator.
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Result type for gain map operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Coarse result codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input contract violation.
    InvalidParameter,
    /// Structural inconsistency across grid cells.
    InvalidImageGrid,
    /// Capability gap.
    NotImplemented,
    /// Content retrieval with every pixel decode disabled.
    NoContent,
    /// Cooperative cancellation.
    Stopped,
    /// Anything else.
    Unknown,
}

impl Error {
    /// Map this error onto its result code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter(_)
            | Error::InvalidDimensions(..)
            | Error::InvalidMetadata(_)
            | Error::LimitExceeded(_) => ErrorKind::InvalidParameter,
            Error::InvalidImageGrid(_) => ErrorKind::InvalidImageGrid,
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::NoContent(_) => ErrorKind::NoContent,
            Error::Stopped(_) => ErrorKind::Stopped,
            Error::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl From<StopReason> for Error {
    fn from(reason: StopReason) -> Self {
        Error::Stopped(reason)
    }
}

/// Color gamut / color space primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorGamut {
    /// BT.709 / sRGB primaries
    #[default]
    Bt709,
    /// Display P3 primaries
    DisplayP3,
    /// BT.2100 / BT.2020 primaries (wide gamut for HDR)
    Bt2100,
    /// Primaries not signaled.
    Unspecified,
}

/// Electro-optical transfer function (EOTF/OETF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorTransfer {
    /// sRGB transfer function (gamma ~2.2)
    #[default]
    Srgb,
    /// Linear (gamma 1.0)
    Linear,
    /// Perceptual Quantizer (SMPTE ST 2084) - HDR
    Pq,
    /// Hybrid Log-Gamma (ITU-R BT.2100) - HDR
    Hlg,
    /// Transfer characteristics not signaled.
    Unspecified,
}

impl ColorTransfer {
    /// Returns true for the HDR transfer functions.
    pub fn is_hdr(self) -> bool {
        matches!(self, Self::Pq | Self::Hlg)
    }
}

/// Interleaved channel layout of an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    /// One channel (luminance, or a single-channel gain map).
    Gray,
    /// Three color channels.
    #[default]
    Rgb,
    /// Three color channels followed by alpha.
    Rgba,
}

impl PixelLayout {
    /// Number of interleaved samples per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Returns true if the layout carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        self == Self::Rgba
    }
}

/// HDR static metadata: content light level information.
///
/// Zero means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentLightLevel {
    /// Maximum content light level, in nits.
    pub max_cll: u16,
    /// Maximum picture average light level, in nits.
    pub max_pall: u16,
}

impl ContentLightLevel {
    /// Create a content light level record.
    pub const fn new(max_cll: u16, max_pall: u16) -> Self {
        Self { max_cll, max_pall }
    }

    /// Returns true if either value is set.
    pub fn is_known(&self) -> bool {
        self.max_cll != 0 || self.max_pall != 0
    }
}

/// An uncompressed image with integer samples of 1 to 16 bits.
///
/// Samples are interleaved per [`PixelLayout`], one `u16` per sample, rows
/// packed without padding. `data` is empty when only the header is known.
#[derive(Debug, Clone)]
pub struct Image {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Bits per sample.
    pub depth: u8,
    /// Channel layout.
    pub layout: PixelLayout,
    /// Color primaries.
    pub primaries: ColorGamut,
    /// Transfer function.
    pub transfer: ColorTransfer,
    /// Content light level of this rendition.
    pub clli: ContentLightLevel,
    /// Interleaved samples.
    pub data: Vec<u16>,
    /// Gain map owned by this (base) image.
    pub gain_map: Option<Box<GainMap>>,
}

impl Image {
    /// Create a zero-filled image.
    ///
    /// Returns an error if dimensions exceed safety limits or the depth is
    /// outside `1..=16`.
    pub fn new(width: u32, height: u32, depth: u8, layout: PixelLayout) -> Result<Self> {
        let mut image = Self::header(width, height, depth, layout)?;
        image.allocate()?;
        Ok(image)
    }

    /// Create an image header without pixel storage.
    pub fn header(width: u32, height: u32, depth: u8, layout: PixelLayout) -> Result<Self> {
        Self::validate_dimensions(width, height)?;
        Self::validate_depth(depth)?;
        Ok(Self {
            width,
            height,
            depth,
            layout,
            primaries: ColorGamut::default(),
            transfer: ColorTransfer::default(),
            clli: ContentLightLevel::default(),
            data: Vec::new(),
            gain_map: None,
        })
    }

    /// Create an image from existing samples.
    pub fn from_data(
        width: u32,
        height: u32,
        depth: u8,
        layout: PixelLayout,
        data: Vec<u16>,
    ) -> Result<Self> {
        let mut image = Self::header(width, height, depth, layout)?;
        let expected = image.sample_count()?;
        if data.len() != expected {
            return Err(Error::InvalidParameter(format!(
                "expected {} samples, got {}",
                expected,
                data.len()
            )));
        }
        let max = image.max_value();
        if let Some(v) = data.iter().find(|&&v| v > max) {
            return Err(Error::InvalidParameter(format!(
                "sample {} exceeds {}-bit range",
                v, depth
            )));
        }
        image.data = data;
        Ok(image)
    }

    /// Allocate zeroed pixel storage if the image has none.
    pub fn allocate(&mut self) -> Result<()> {
        if self.data.is_empty() {
            self.data = vec![0u16; self.sample_count()?];
        }
        Ok(())
    }

    /// Returns true if a full plane of pixel samples is present.
    ///
    /// A buffer shorter or longer than `width * height * channels` counts as
    /// absent, so row access never runs past the data.
    pub fn has_pixels(&self) -> bool {
        !self.data.is_empty() && self.sample_count().is_ok_and(|n| n == self.data.len())
    }

    /// Number of interleaved samples per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// Largest representable sample value at this depth.
    #[inline]
    pub fn max_value(&self) -> u16 {
        ((1u32 << self.depth) - 1) as u16
    }

    /// Number of samples in one row.
    #[inline]
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels()
    }

    /// Samples of row `y`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u16] {
        let len = self.row_len();
        let start = y as usize * len;
        &self.data[start..start + len]
    }

    /// Mutable samples of row `y`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u16] {
        let len = self.row_len();
        let start = y as usize * len;
        &mut self.data[start..start + len]
    }

    /// Samples of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u16] {
        let c = self.channels();
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    /// Returns true if `other` has the same width, height, depth and layout.
    pub fn same_shape(&self, other: &Image) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.depth == other.depth
            && self.layout == other.layout
    }

    /// Total samples with overflow checking.
    pub fn sample_count(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(self.channels()))
            .ok_or_else(|| Error::LimitExceeded("sample count overflow".into()))
    }

    /// Validate dimensions against safety limits.
    pub(crate) fn validate_dimensions(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions(width, height));
        }

        if width > limits::MAX_IMAGE_DIMENSION || height > limits::MAX_IMAGE_DIMENSION {
            return Err(Error::LimitExceeded(format!(
                "dimension {} exceeds maximum {}",
                width.max(height),
                limits::MAX_IMAGE_DIMENSION
            )));
        }

        let total_pixels = width as u64 * height as u64;
        if total_pixels > limits::MAX_TOTAL_PIXELS {
            return Err(Error::LimitExceeded(format!(
                "total pixels {} exceeds maximum {}",
                total_pixels,
                limits::MAX_TOTAL_PIXELS
            )));
        }

        Ok(())
    }

    pub(crate) fn validate_depth(depth: u8) -> Result<()> {
        if depth == 0 || depth > 16 {
            return Err(Error::InvalidParameter(format!(
                "bit depth {} outside 1..=16",
                depth
            )));
        }
        Ok(())
    }
}

/// A gain map: its pixels, the metadata describing them, and what is known
/// about the alternate rendition.
#[derive(Debug, Clone)]
pub struct GainMap {
    /// Gain map samples. `None` when only the metadata was parsed.
    pub image: Option<Image>,
    /// Rational metadata. All-zero means absent.
    pub metadata: GainMapMetadata,
    /// Color primaries of the alternate rendition.
    pub alt_primaries: ColorGamut,
    /// Transfer function of the alternate rendition.
    pub alt_transfer: ColorTransfer,
    /// Content light level of the alternate rendition.
    pub alt_clli: ContentLightLevel,
    /// Bit depth of the alternate rendition (0 = unknown).
    pub alt_depth: u8,
    /// Channel layout of the alternate rendition.
    pub alt_layout: PixelLayout,
}

impl Default for GainMap {
    fn default() -> Self {
        Self {
            image: None,
            metadata: GainMapMetadata::default(),
            alt_primaries: ColorGamut::Unspecified,
            alt_transfer: ColorTransfer::Unspecified,
            alt_clli: ContentLightLevel::default(),
            alt_depth: 0,
            alt_layout: PixelLayout::Rgb,
        }
    }
}

impl GainMap {
    /// Wrap a gain map image with absent metadata.
    pub fn new(image: Image) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }

    /// Make this gain map describe the reverse direction, for application to
    /// the former alternate rendition.
    ///
    /// `base` is the rendition the gain map was made for. Its description
    /// becomes the new alternate description, and the metadata swaps its
    /// headrooms, offsets and direction. Gain map samples are unchanged, so
    /// the same color space is used for the math before and after.
    pub fn swap_base_and_alternate(&mut self, base: &Image) {
        self.metadata.swap_base_and_alternate();
        self.alt_primaries = base.primaries;
        self.alt_transfer = base.transfer;
        self.alt_clli = base.clli;
        self.alt_depth = base.depth;
        self.alt_layout = base.layout;
    }
}

/// Reference display luminance values (in nits).
pub mod luminance {
    /// SDR reference white (diffuse white)
    pub const SDR_WHITE_NITS: f32 = 203.0;

    /// Nominal HLG peak luminance
    pub const HLG_PEAK_NITS: f32 = 1000.0;

    /// PQ peak luminance
    pub const PQ_PEAK_NITS: f32 = 10000.0;
}
