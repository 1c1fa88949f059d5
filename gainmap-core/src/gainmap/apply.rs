//! Gain map application: tone mapping a base image to any headroom.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use enough::Stop;
use tracing::{debug, trace};

use crate::color::convert::{rescale, LinearDecoder, SignalEncoder};
use crate::metadata::GainMapMetadataFloat;
use crate::types::{
    ColorGamut, ContentLightLevel, Error, GainMap, Image, PixelLayout, Result,
};

/// Precomputed lookup table for gain map decoding.
///
/// Maps every code value of the gain map to its linear gain multiplier at
/// one weight, so no `powf()` or `exp2()` runs per pixel.
pub struct GainMapLut {
    /// `entries` values per channel (R, G, B).
    table: Vec<f32>,
    entries: usize,
}

impl GainMapLut {
    /// Create a LUT for gain map samples of `depth` bits at `weight`.
    pub fn new(metadata: &GainMapMetadataFloat, weight: f64, depth: u8) -> Self {
        let max = ((1u32 << depth) - 1) as usize;
        let entries = max + 1;
        let mut table = vec![0.0f32; entries * 3];

        for channel in 0..3 {
            let gamma = metadata.gain_map_gamma[channel];
            let log_min = metadata.gain_map_min[channel];
            let log_max = metadata.gain_map_max[channel];
            let sign = if metadata.backward_direction { -1.0 } else { 1.0 };

            for (i, gain) in table[channel * entries..(channel + 1) * entries]
                .iter_mut()
                .enumerate()
            {
                let normalized = (i as f64 / max as f64).powf(gamma);
                let log_gain = log_min + normalized * (log_max - log_min);
                *gain = (sign * log_gain * weight).exp2() as f32;
            }
        }

        Self { table, entries }
    }

    /// Look up the gain multiplier for a single channel.
    #[inline(always)]
    pub fn lookup(&self, code: u16, channel: usize) -> f32 {
        debug_assert!(channel < 3);
        self.table[channel * self.entries + code as usize]
    }
}

/// Weight of the alternate rendition at `hdr_headroom`.
///
/// Interpolates between the two headrooms in log2 space and clamps, so
/// either direction works and extrapolation is never needed.
fn calculate_weight(hdr_headroom: f64, metadata: &GainMapMetadataFloat) -> f64 {
    let base = metadata.base_hdr_headroom;
    let alternate = metadata.alternate_hdr_headroom;
    if alternate == base {
        return 0.0;
    }
    ((hdr_headroom - base) / (alternate - base)).clamp(0.0, 1.0)
}

/// Sampling position along one axis.
#[derive(Clone, Copy)]
struct Tap {
    i0: u32,
    i1: u32,
    frac: f32,
}

/// Center-aligned bilinear taps mapping `dst` positions onto `src` samples.
fn taps(dst: u32, src: u32) -> Vec<Tap> {
    let scale = src as f32 / dst as f32;
    (0..dst)
        .map(|x| {
            let pos = ((x as f32 + 0.5) * scale - 0.5).clamp(0.0, (src - 1) as f32);
            let i0 = pos.floor() as u32;
            Tap {
                i0,
                i1: (i0 + 1).min(src - 1),
                frac: pos - i0 as f32,
            }
        })
        .collect()
}

/// Bilinear interpolation.
#[inline(always)]
fn bilinear(v00: f32, v10: f32, v01: f32, v11: f32, fx: f32, fy: f32) -> f32 {
    let top = v00 * (1.0 - fx) + v10 * fx;
    let bottom = v01 * (1.0 - fx) + v11 * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Sample the gain map with bilinear interpolation of looked-up gains.
#[inline]
fn sample_gains(gain_map: &Image, lut: &GainMapLut, tx: Tap, ty: Tap) -> [f32; 3] {
    let p00 = gain_map.pixel(tx.i0, ty.i0);
    let p10 = gain_map.pixel(tx.i1, ty.i0);
    let p01 = gain_map.pixel(tx.i0, ty.i1);
    let p11 = gain_map.pixel(tx.i1, ty.i1);
    let gain = |c: usize| {
        let s = if gain_map.layout == PixelLayout::Gray { 0 } else { c };
        bilinear(
            lut.lookup(p00[s], c),
            lut.lookup(p10[s], c),
            lut.lookup(p01[s], c),
            lut.lookup(p11[s], c),
            tx.frac,
            ty.frac,
        )
    };
    [gain(0), gain(1), gain(2)]
}

/// Blend the content light levels of both renditions in log space.
fn blend_clli(base: ContentLightLevel, alternate: ContentLightLevel, weight: f64) -> ContentLightLevel {
    if !base.is_known() || !alternate.is_known() {
        return ContentLightLevel::default();
    }
    let blend = |b: u16, a: u16| -> u16 {
        let v = (b as f64).powf(1.0 - weight) * (a as f64).powf(weight);
        v.round().clamp(0.0, u16::MAX as f64) as u16
    };
    ContentLightLevel::new(
        blend(base.max_cll, alternate.max_cll),
        blend(base.max_pall, alternate.max_pall),
    )
}

/// Apply a gain map to `base`, producing the rendition for a display with
/// `hdr_headroom` log2 stops above SDR white.
///
/// `output` supplies the size (must match `base`), depth, layout (Rgb or
/// Rgba), primaries and transfer of the result; its samples and content
/// light level are replaced. A headroom at or beyond one of the two
/// renditions yields that rendition; in between, gains are interpolated.
/// Returns the content light level of the result, zero when unknown.
///
/// The `stop` parameter enables cooperative cancellation. Pass `Unstoppable`
/// when cancellation is not needed.
pub fn apply_gainmap(
    base: &Image,
    gain_map: &GainMap,
    hdr_headroom: f64,
    output: &mut Image,
    stop: impl Stop,
) -> Result<ContentLightLevel> {
    if !hdr_headroom.is_finite() || hdr_headroom < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "headroom must be finite and non-negative, got {}",
            hdr_headroom
        )));
    }
    if !base.has_pixels() {
        return Err(Error::InvalidParameter("base image has no pixels".into()));
    }
    let gm_image = gain_map
        .image
        .as_ref()
        .filter(|image| image.has_pixels())
        .ok_or_else(|| Error::InvalidParameter("gain map has no pixels".into()))?;
    let metadata = gain_map.metadata.to_float()?;
    match gm_image.layout {
        PixelLayout::Gray if !gain_map.metadata.is_single_channel() => {
            return Err(Error::InvalidParameter(
                "single-channel gain map with per-channel metadata".into(),
            ));
        }
        PixelLayout::Rgba => {
            return Err(Error::InvalidParameter(
                "gain map image must be Gray or Rgb".into(),
            ));
        }
        _ => {}
    }
    if output.width != base.width || output.height != base.height {
        return Err(Error::InvalidParameter(format!(
            "output is {}x{} but base is {}x{}",
            output.width, output.height, base.width, base.height
        )));
    }
    if output.layout == PixelLayout::Gray {
        return Err(Error::InvalidParameter(
            "output layout must be Rgb or Rgba".into(),
        ));
    }

    let math_gamut = if metadata.use_base_color_space {
        base.primaries
    } else {
        gain_map.alt_primaries
    };
    if math_gamut == ColorGamut::Unspecified {
        return Err(Error::InvalidParameter(
            "gain map math primaries are unspecified".into(),
        ));
    }
    let decoder = LinearDecoder::new(base, math_gamut, "base")?;
    let encoder = SignalEncoder::new(math_gamut, output)?;

    let weight = calculate_weight(hdr_headroom, &metadata);
    debug!(
        width = base.width,
        height = base.height,
        hdr_headroom,
        weight,
        backward_direction = metadata.backward_direction,
        "applying gain map"
    );
    let lut = GainMapLut::new(&metadata, weight, gm_image.depth);
    let mut base_offset = [0.0f32; 3];
    let mut out_offset = [0.0f32; 3];
    for c in 0..3 {
        let bo = metadata.base_offset[c];
        let ao = metadata.alternate_offset[c];
        base_offset[c] = bo as f32;
        out_offset[c] = (bo + (ao - bo) * weight) as f32;
    }

    let x_taps = taps(base.width, gm_image.width);
    let y_taps = taps(base.height, gm_image.height);
    let base_channels = base.channels();
    let out_channels = output.channels();
    let base_max = base.max_value();
    let out_max = output.max_value();
    let base_has_alpha = base.layout.has_alpha();
    let out_has_alpha = output.layout.has_alpha();

    let render_row = |y: usize, dst: &mut [u16]| {
        let ty = y_taps[y];
        let src = base.row(y as u32);
        for ((px, out), &tx) in src
            .chunks_exact(base_channels)
            .zip(dst.chunks_exact_mut(out_channels))
            .zip(&x_taps)
        {
            let linear = decoder.decode_pixel(px);
            let gain = sample_gains(gm_image, &lut, tx, ty);
            let mut mapped = [0.0f32; 3];
            for c in 0..3 {
                mapped[c] = (linear[c] + base_offset[c]) * gain[c] - out_offset[c];
            }
            out[..3].copy_from_slice(&encoder.encode_pixel(mapped));
            if out_has_alpha {
                out[3] = if base_has_alpha {
                    rescale(px[3], base_max, out_max)
                } else {
                    out_max
                };
            }
        }
    };

    let row_len = output.row_len();
    let mut data = vec![0u16; row_len * output.height as usize];

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        // Rows within a band run in parallel; cancellation is checked between bands.
        const BAND_ROWS: usize = 32;
        for (band, chunk) in data.chunks_mut(row_len * BAND_ROWS).enumerate() {
            stop.check()?;
            chunk
                .par_chunks_mut(row_len)
                .enumerate()
                .for_each(|(i, dst)| render_row(band * BAND_ROWS + i, dst));
        }
    }

    #[cfg(not(feature = "rayon"))]
    for (y, dst) in data.chunks_mut(row_len).enumerate() {
        // Check for cancellation once per row
        stop.check()?;
        render_row(y, dst);
    }

    let clli = blend_clli(base.clli, gain_map.alt_clli, weight);
    trace!(max_cll = clli.max_cll, max_pall = clli.max_pall, "tone mapped");
    output.data = data;
    output.clli = clli;
    Ok(clli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::transfer::{from_linear, to_linear};
    use crate::color::convert::quantize;
    use crate::types::{ColorTransfer, ErrorKind};
    use enough::Unstoppable;

    fn metadata(min: f64, max: f64, base_headroom: f64, alt_headroom: f64) -> GainMapMetadataFloat {
        GainMapMetadataFloat {
            base_hdr_headroom: base_headroom,
            alternate_hdr_headroom: alt_headroom,
            gain_map_min: [min; 3],
            gain_map_max: [max; 3],
            base_offset: [0.0; 3],
            alternate_offset: [0.0; 3],
            ..GainMapMetadataFloat::new()
        }
    }

    fn gain_map(fill: u16, m: &GainMapMetadataFloat) -> GainMap {
        let mut gm = GainMap::new(Image::from_data(2, 2, 8, PixelLayout::Gray, vec![fill; 4]).unwrap());
        gm.metadata = m.to_fractions().unwrap();
        gm.alt_primaries = ColorGamut::Bt709;
        gm.alt_transfer = ColorTransfer::Linear;
        gm
    }

    fn srgb_base() -> Image {
        let data: Vec<u16> = (0..4 * 4 * 3).map(|i| (i * 5) as u16).collect();
        Image::from_data(4, 4, 8, PixelLayout::Rgb, data).unwrap()
    }

    #[test]
    fn test_calculate_weight() {
        let m = metadata(0.0, 1.0, 0.0, 2.0);
        assert_eq!(calculate_weight(0.0, &m), 0.0);
        assert_eq!(calculate_weight(2.0, &m), 1.0);
        assert_eq!(calculate_weight(1.0, &m), 0.5);
        assert_eq!(calculate_weight(8.0, &m), 1.0);

        // Backward: alternate is the lower headroom.
        let m = metadata(0.0, 1.0, 2.0, 0.0);
        assert_eq!(calculate_weight(2.0, &m), 0.0);
        assert_eq!(calculate_weight(0.0, &m), 1.0);
        assert_eq!(calculate_weight(0.5, &m), 0.75);

        let m = metadata(0.0, 1.0, 1.0, 1.0);
        assert_eq!(calculate_weight(4.0, &m), 0.0);
    }

    #[test]
    fn test_gain_map_lut() {
        let m = metadata(0.0, 2.0, 0.0, 2.0);
        let lut = GainMapLut::new(&m, 1.0, 8);
        assert!((lut.lookup(0, 0) - 1.0).abs() < 1e-6);
        assert!((lut.lookup(255, 1) - 4.0).abs() < 1e-5);
        let mid = lut.lookup(128, 2);
        assert!(mid > 1.9 && mid < 2.1, "mid gain: {}", mid);

        let half = GainMapLut::new(&m, 0.5, 8);
        assert!((half.lookup(255, 0) - 2.0).abs() < 1e-5);

        let backward = GainMapMetadataFloat {
            backward_direction: true,
            ..m
        };
        let lut = GainMapLut::new(&backward, 1.0, 8);
        assert!((lut.lookup(255, 0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_lut_applies_gamma() {
        let m = GainMapMetadataFloat {
            gain_map_gamma: [2.0; 3],
            ..metadata(0.0, 1.0, 0.0, 1.0)
        };
        let lut = GainMapLut::new(&m, 1.0, 1);
        assert!((lut.lookup(1, 0) - 2.0).abs() < 1e-6);
        let lut = GainMapLut::new(&m, 1.0, 2);
        // (1/3)^2 = 1/9 of a stop
        assert!((lut.lookup(1, 0) - (1.0f32 / 9.0).exp2()).abs() < 1e-5);
    }

    #[test]
    fn test_zero_weight_reproduces_base() {
        let base = srgb_base();
        let gm = gain_map(200, &metadata(-1.0, 3.0, 0.0, 3.0));
        let mut out = Image::new(4, 4, 8, PixelLayout::Rgb).unwrap();
        let clli = apply_gainmap(&base, &gm, 0.0, &mut out, Unstoppable).unwrap();
        assert_eq!(out.data, base.data);
        assert_eq!(clli, ContentLightLevel::default());
    }

    #[test]
    fn test_full_and_partial_weight() {
        let mut base =
            Image::from_data(1, 1, 16, PixelLayout::Rgb, vec![16384, 8192, 4096]).unwrap();
        base.transfer = ColorTransfer::Linear;
        // Gain of exactly one stop everywhere.
        let gm = gain_map(77, &metadata(1.0, 1.0, 0.0, 1.0));
        let mut out = base.clone();

        apply_gainmap(&base, &gm, 1.0, &mut out, Unstoppable).unwrap();
        assert_eq!(out.data, vec![32768, 16384, 8192]);

        apply_gainmap(&base, &gm, 0.5, &mut out, Unstoppable).unwrap();
        let expected = quantize(16384.0 / 65535.0 * core::f32::consts::SQRT_2, 65535);
        assert!((out.data[0] as i32 - expected as i32).abs() <= 1);
    }

    #[test]
    fn test_output_format_conversion() {
        let base = srgb_base();
        let gm = gain_map(0, &metadata(0.0, 0.0, 0.0, 1.0));
        let mut out = Image::new(4, 4, 10, PixelLayout::Rgba).unwrap();
        out.transfer = ColorTransfer::Pq;
        out.primaries = ColorGamut::Bt2100;
        apply_gainmap(&base, &gm, 1.0, &mut out, Unstoppable).unwrap();

        // White stays SDR white, now PQ encoded.
        let px = out.pixel(3, 3);
        assert_eq!(px[3], 1023);
        let white = base.pixel(3, 3)[0];
        let expected = to_linear(white as f32 / 255.0, ColorTransfer::Srgb);
        let got = to_linear(px[0] as f32 / 1023.0, ColorTransfer::Pq);
        assert!((got - expected).abs() < 0.05 * expected.max(0.01), "{} vs {}", got, expected);
        let sdr_white = from_linear(1.0, ColorTransfer::Pq);
        assert!(sdr_white > 0.5 && sdr_white < 0.65);
    }

    #[test]
    fn test_clli_blend() {
        let mut base = srgb_base();
        base.clli = ContentLightLevel::new(100, 50);
        let mut gm = gain_map(0, &metadata(0.0, 0.0, 0.0, 2.0));
        gm.alt_clli = ContentLightLevel::new(400, 200);
        let mut out = Image::new(4, 4, 8, PixelLayout::Rgb).unwrap();

        let clli = apply_gainmap(&base, &gm, 1.0, &mut out, Unstoppable).unwrap();
        assert_eq!(clli, ContentLightLevel::new(200, 100));
        assert_eq!(out.clli, clli);
        let clli = apply_gainmap(&base, &gm, 2.0, &mut out, Unstoppable).unwrap();
        assert_eq!(clli, ContentLightLevel::new(400, 200));
    }

    #[test]
    fn test_invalid_parameters() {
        let base = srgb_base();
        let m = metadata(0.0, 1.0, 0.0, 1.0);
        let gm = gain_map(0, &m);
        let mut out = Image::new(4, 4, 8, PixelLayout::Rgb).unwrap();

        for headroom in [-1.0, f64::NAN, f64::INFINITY] {
            let err = apply_gainmap(&base, &gm, headroom, &mut out, Unstoppable).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        }

        let mut small = Image::new(2, 4, 8, PixelLayout::Rgb).unwrap();
        assert!(apply_gainmap(&base, &gm, 1.0, &mut small, Unstoppable).is_err());

        let mut gray = Image::new(4, 4, 8, PixelLayout::Gray).unwrap();
        assert!(apply_gainmap(&base, &gm, 1.0, &mut gray, Unstoppable).is_err());

        let mut per_channel = gm.clone();
        per_channel.metadata.gain_map_max[2].numerator += 1;
        assert!(apply_gainmap(&base, &per_channel, 1.0, &mut out, Unstoppable).is_err());

        let mut zero_denominator = gm.clone();
        zero_denominator.metadata.base_offset[0].denominator = 0;
        assert!(apply_gainmap(&base, &zero_denominator, 1.0, &mut out, Unstoppable).is_err());

        let mut header_only = gm.clone();
        header_only.image = Some(Image::header(2, 2, 8, PixelLayout::Gray).unwrap());
        assert!(apply_gainmap(&base, &header_only, 1.0, &mut out, Unstoppable).is_err());

        let mut truncated_map = gm.clone();
        if let Some(image) = truncated_map.image.as_mut() {
            image.data.pop();
        }
        let err = apply_gainmap(&base, &truncated_map, 1.0, &mut out, Unstoppable).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let mut truncated_base = base.clone();
        truncated_base.data.truncate(base.row_len());
        let err = apply_gainmap(&truncated_base, &gm, 1.0, &mut out, Unstoppable).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let mut alt_space = gm.clone();
        alt_space.metadata.use_base_color_space = false;
        alt_space.alt_primaries = ColorGamut::Unspecified;
        assert!(apply_gainmap(&base, &alt_space, 1.0, &mut out, Unstoppable).is_err());

        out.transfer = ColorTransfer::Unspecified;
        assert!(apply_gainmap(&base, &gm, 1.0, &mut out, Unstoppable).is_err());
        assert!(out.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_apply_gainmap_cancellation() {
        /// A Stop implementation that cancels immediately
        struct ImmediateCancel;

        impl enough::Stop for ImmediateCancel {
            fn check(&self) -> core::result::Result<(), enough::StopReason> {
                Err(enough::StopReason::Cancelled)
            }
        }

        let base = srgb_base();
        let gm = gain_map(0, &metadata(0.0, 1.0, 0.0, 1.0));
        let mut out = Image::new(4, 4, 8, PixelLayout::Rgb).unwrap();

        let result = apply_gainmap(&base, &gm, 1.0, &mut out, ImmediateCancel);

        assert!(matches!(
            result,
            Err(crate::Error::Stopped(enough::StopReason::Cancelled))
        ));
    }
}
