//! Gain map computation from a base and an alternate rendition.

use alloc::format;
use alloc::vec::Vec;
use enough::Stop;
use tracing::{debug, trace, warn};

use super::resample::resample_area;
use crate::color::convert::{quantize, LinearDecoder};
use crate::color::gamut::luma_coefficients;
use crate::color::transfer::headroom_stops;
use crate::metadata::GainMapMetadataFloat;
use crate::types::{Error, GainMap, Image, PixelLayout, Result};

/// Smallest value a ratio term may take before the logarithm.
const MIN_RATIO_TERM: f64 = 1e-7;

/// Configuration for gain map computation.
#[derive(Debug, Clone)]
pub struct GainMapConfig {
    /// Gamma of the stored gain values, applied to every channel.
    pub gamma: f64,
    /// Offset added to base samples before taking the ratio.
    pub base_offset: f64,
    /// Offset added to alternate samples before taking the ratio.
    pub alternate_offset: f64,
    /// Base headroom in log2 stops. Inferred from the base image when `None`.
    pub base_hdr_headroom: Option<f64>,
    /// Alternate headroom in log2 stops. Inferred from the alternate image
    /// when `None`.
    pub alternate_hdr_headroom: Option<f64>,
    /// Do the math in the base primaries instead of the alternate's.
    pub use_base_color_space: bool,
}

impl Default for GainMapConfig {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            base_offset: 1.0 / 64.0,
            alternate_offset: 1.0 / 64.0,
            base_hdr_headroom: None,
            alternate_hdr_headroom: None,
            use_base_color_space: true,
        }
    }
}

fn resolve_headroom(configured: Option<f64>, image: &Image, what: &str) -> Result<f64> {
    match configured {
        Some(h) if !h.is_finite() || h < 0.0 => Err(Error::InvalidParameter(format!(
            "{} headroom must be finite and non-negative, got {}",
            what, h
        ))),
        Some(h) => Ok(h),
        None => Ok(headroom_stops(image.transfer, image.clli)),
    }
}

/// Compute a gain map that turns `base` into `alternate`.
///
/// `gain_map.image` must be set; its width, height, depth and layout (Gray
/// for a luminance gain map, Rgb for per-channel gains) choose the output.
/// On success its pixels, `metadata` and the alternate rendition fields are
/// replaced. Nothing is written on error.
///
/// The `stop` parameter enables cooperative cancellation. Pass `Unstoppable`
/// when cancellation is not needed.
pub fn compute_gainmap(
    base: &Image,
    alternate: &Image,
    gain_map: &mut GainMap,
    config: &GainMapConfig,
    stop: impl Stop,
) -> Result<()> {
    if !base.has_pixels() || !alternate.has_pixels() {
        return Err(Error::InvalidParameter(
            "base and alternate images need pixels".into(),
        ));
    }
    if base.width != alternate.width || base.height != alternate.height {
        return Err(Error::InvalidParameter(format!(
            "base is {}x{} but alternate is {}x{}",
            base.width, base.height, alternate.width, alternate.height
        )));
    }
    let target = gain_map
        .image
        .as_ref()
        .ok_or_else(|| Error::InvalidParameter("gain map has no image to write".into()))?;
    if target.layout == PixelLayout::Rgba {
        return Err(Error::InvalidParameter(
            "gain map image must be Gray or Rgb".into(),
        ));
    }

    let base_headroom = resolve_headroom(config.base_hdr_headroom, base, "base")?;
    let alternate_headroom = resolve_headroom(config.alternate_hdr_headroom, alternate, "alternate")?;
    let backward_direction = base_headroom > alternate_headroom;
    let math_gamut = if config.use_base_color_space {
        base.primaries
    } else {
        alternate.primaries
    };

    debug!(
        width = base.width,
        height = base.height,
        gain_map_width = target.width,
        gain_map_height = target.height,
        base_headroom,
        alternate_headroom,
        backward_direction,
        "computing gain map"
    );
    if base_headroom == alternate_headroom {
        warn!(headroom = base_headroom, "base and alternate headroom are equal");
    }

    let base_decoder = LinearDecoder::new(base, math_gamut, "base")?;
    let alternate_decoder = LinearDecoder::new(alternate, math_gamut, "alternate")?;
    let base_linear = base_decoder.decode_image(base, &stop)?;
    let alternate_linear = alternate_decoder.decode_image(alternate, &stop)?;

    let (width, height) = (base.width as usize, base.height as usize);
    let (gm_width, gm_height) = (target.width as usize, target.height as usize);
    let base_linear = resample_area(&base_linear, width, height, 3, gm_width, gm_height);
    let alternate_linear = resample_area(&alternate_linear, width, height, 3, gm_width, gm_height);
    trace!(gm_width, gm_height, "resampled renditions to gain map size");

    // Stored gains are log2(alternate / base) in the forward direction and
    // the inverse otherwise.
    let sign = if backward_direction { -1.0 } else { 1.0 };
    let ratio = |b: f32, a: f32| -> f64 {
        let b = (b as f64 + config.base_offset).max(MIN_RATIO_TERM);
        let a = (a as f64 + config.alternate_offset).max(MIN_RATIO_TERM);
        sign * (a / b).log2()
    };

    let channels = target.channels();
    let luma = luma_coefficients(math_gamut);
    let luminance = |p: &[f32]| luma[0] * p[0] + luma[1] * p[1] + luma[2] * p[2];
    let mut gains = Vec::with_capacity(gm_width * gm_height * channels);
    let row_len = gm_width * 3;
    for (b_row, a_row) in base_linear
        .chunks_exact(row_len)
        .zip(alternate_linear.chunks_exact(row_len))
    {
        stop.check()?;
        for (b, a) in b_row.chunks_exact(3).zip(a_row.chunks_exact(3)) {
            if channels == 1 {
                gains.push(ratio(luminance(b), luminance(a)));
            } else {
                gains.extend((0..3).map(|c| ratio(b[c], a[c])));
            }
        }
    }

    let mut gain_min = [f64::INFINITY; 3];
    let mut gain_max = [f64::NEG_INFINITY; 3];
    for px in gains.chunks_exact(channels) {
        for (c, &g) in px.iter().enumerate() {
            gain_min[c] = gain_min[c].min(g);
            gain_max[c] = gain_max[c].max(g);
        }
    }
    if channels == 1 {
        gain_min = [gain_min[0]; 3];
        gain_max = [gain_max[0]; 3];
    }

    let float = GainMapMetadataFloat {
        backward_direction,
        use_base_color_space: config.use_base_color_space,
        base_hdr_headroom: base_headroom,
        alternate_hdr_headroom: alternate_headroom,
        base_offset: [config.base_offset; 3],
        alternate_offset: [config.alternate_offset; 3],
        gain_map_gamma: [config.gamma; 3],
        gain_map_min: gain_min,
        gain_map_max: gain_max,
    };
    let metadata = float.to_fractions()?;
    // Normalize against the stored values, not the exact ones.
    let stored = metadata.to_float()?;
    trace!(?gain_min, ?gain_max, "gain range");

    let max_code = target.max_value();
    let mut codes = Vec::with_capacity(gains.len());
    for px in gains.chunks_exact(channels) {
        for (c, &g) in px.iter().enumerate() {
            let lo = stored.gain_map_min[c];
            let range = stored.gain_map_max[c] - lo;
            let t = if range > 0.0 {
                ((g - lo) / range).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let v = t.powf(1.0 / stored.gain_map_gamma[c]);
            codes.push(quantize(v as f32, max_code));
        }
    }
    if (0..channels).any(|c| stored.gain_map_max[c] <= stored.gain_map_min[c]) {
        warn!("gain map has an empty range in at least one channel");
    }

    if let Some(image) = gain_map.image.as_mut() {
        image.data = codes;
    }
    gain_map.metadata = metadata;
    gain_map.alt_primaries = alternate.primaries;
    gain_map.alt_transfer = alternate.transfer;
    gain_map.alt_clli = alternate.clli;
    gain_map.alt_depth = alternate.depth;
    gain_map.alt_layout = alternate.layout;
    Ok(())
}
