//! Shared helpers for integration tests.

#![allow(dead_code)]

use gainmap::color::convert::quantize;
use gainmap::color::gamut::convert_gamut;
use gainmap::color::transfer::{from_linear, srgb_eotf};
use gainmap::{
    ColorGamut, ColorTransfer, ContentLightLevel, Fraction, GainMap, GainMapMetadata, Image,
    PixelLayout, UnsignedFraction,
};

/// Fill every channel with a smooth gradient: x, y, x + y, opaque alpha.
pub fn fill_gradient(image: &mut Image) {
    let max = image.max_value() as u64;
    let (w, h) = (image.width as u64, image.height as u64);
    let channels = image.channels();
    let has_alpha = image.layout.has_alpha();
    for y in 0..image.height {
        let row = image.row_mut(y);
        for (x, px) in row.chunks_exact_mut(channels).enumerate() {
            let (x, yy) = (x as u64, y as u64);
            let gradients = [
                x * max / w.max(1),
                yy * max / h.max(1),
                (x + yy) * max / (w + h),
            ];
            for (c, sample) in px.iter_mut().enumerate() {
                *sample = if has_alpha && c == 3 {
                    max as u16
                } else {
                    gradients[c.min(2)] as u16
                };
            }
        }
    }
}

/// Per-channel metadata with distinct denominators everywhere.
pub fn test_metadata(base_is_hdr: bool) -> GainMapMetadata {
    let (sdr, hdr) = (UnsignedFraction::new(0, 1), UnsignedFraction::new(6, 2));
    let mut metadata = GainMapMetadata {
        backward_direction: base_is_hdr,
        use_base_color_space: true,
        base_hdr_headroom: if base_is_hdr { hdr } else { sdr },
        alternate_hdr_headroom: if base_is_hdr { sdr } else { hdr },
        ..Default::default()
    };
    for c in 0..3 {
        let k = c as i32;
        metadata.base_offset[c] = Fraction::new(10 * k, 1000);
        metadata.alternate_offset[c] = Fraction::new(20 * k, 1000);
        metadata.gain_map_gamma[c] = UnsignedFraction::new(1, c as u32 + 1);
        metadata.gain_map_min[c] = Fraction::new(-1, c as u32 + 1);
        metadata.gain_map_max[c] = Fraction::new(10 + k + 1, c as u32 + 1);
    }
    metadata
}

/// A 12x34 10-bit image owning a 6x17 8-bit gain map.
///
/// The HDR rendition carries a content light level of 10/5, on the base when
/// it is HDR and on the alternate description otherwise.
pub fn create_test_image_with_gain_map(base_is_hdr: bool) -> Image {
    let mut image = Image::new(12, 34, 10, PixelLayout::Rgb).unwrap();
    fill_gradient(&mut image);
    let mut gm_image = Image::new(6, 17, 8, PixelLayout::Rgb).unwrap();
    fill_gradient(&mut gm_image);

    let mut gain_map = GainMap::new(gm_image);
    gain_map.metadata = test_metadata(base_is_hdr);
    gain_map.alt_depth = 10;
    gain_map.alt_layout = PixelLayout::Rgb;
    let clli = ContentLightLevel::new(10, 5);
    if base_is_hdr {
        image.primaries = ColorGamut::Bt2100;
        image.transfer = ColorTransfer::Pq;
        image.clli = clli;
        gain_map.alt_primaries = ColorGamut::Bt709;
        gain_map.alt_transfer = ColorTransfer::Srgb;
    } else {
        image.primaries = ColorGamut::Bt709;
        image.transfer = ColorTransfer::Srgb;
        gain_map.alt_primaries = ColorGamut::Bt2100;
        gain_map.alt_transfer = ColorTransfer::Pq;
        gain_map.alt_clli = clli;
    }
    image.gain_map = Some(Box::new(gain_map));
    image
}

/// Peak signal-to-noise ratio over every sample, in dB.
///
/// Capped at [`PSNR_CAP`], which identical images reach.
pub fn psnr(a: &Image, b: &Image) -> f64 {
    assert_eq!((a.width, a.height), (b.width, b.height));
    assert_eq!(a.layout, b.layout);
    assert_eq!(a.data.len(), b.data.len());
    let (a_max, b_max) = (a.max_value() as f64, b.max_value() as f64);
    let sum: f64 = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(&x, &y)| {
            let d = x as f64 / a_max - y as f64 / b_max;
            d * d
        })
        .sum();
    let mse = sum / a.data.len() as f64;
    if mse == 0.0 {
        PSNR_CAP
    } else {
        (10.0 * (1.0 / mse).log10()).min(PSNR_CAP)
    }
}

/// Highest value [`psnr`] reports.
pub const PSNR_CAP: f64 = 99.0;

pub const PAIR_WIDTH: u32 = 60;
pub const PAIR_HEIGHT: u32 = 42;

/// An 8-bit sRGB rendition with channels kept away from black.
pub fn sdr_rendition() -> Image {
    let mut image = Image::new(PAIR_WIDTH, PAIR_HEIGHT, 8, PixelLayout::Rgb).unwrap();
    for y in 0..PAIR_HEIGHT {
        for (x, px) in image.row_mut(y).chunks_exact_mut(3).enumerate() {
            let (x, y) = (x as u32, y);
            px[0] = (60 + x * 175 / (PAIR_WIDTH - 1)) as u16;
            px[1] = (60 + y * 175 / (PAIR_HEIGHT - 1)) as u16;
            px[2] = (60 + (x + y) * 175 / (PAIR_WIDTH + PAIR_HEIGHT - 2)) as u16;
        }
    }
    image
}

/// Stops of boost applied to the SDR rendition at (x, y). Smooth in both
/// axes, between 0.5 and 2.5.
pub fn boost_stops(x: u32, y: u32) -> f32 {
    0.5 + 1.5 * x as f32 / (PAIR_WIDTH - 1) as f32 + 0.5 * y as f32 / (PAIR_HEIGHT - 1) as f32
}

/// A 10-bit PQ rendition: the SDR one brightened by [`boost_stops`].
pub fn hdr_rendition(sdr: &Image) -> Image {
    hdr_rendition_in(sdr, ColorGamut::Bt709)
}

/// [`hdr_rendition`] with the brightened light expressed in `primaries`.
pub fn hdr_rendition_in(sdr: &Image, primaries: ColorGamut) -> Image {
    let mut image = Image::new(sdr.width, sdr.height, 10, PixelLayout::Rgb).unwrap();
    image.transfer = ColorTransfer::Pq;
    image.primaries = primaries;
    let max = image.max_value();
    for y in 0..sdr.height {
        let src = sdr.row(y).to_vec();
        for (x, (out, px)) in image
            .row_mut(y)
            .chunks_exact_mut(3)
            .zip(src.chunks_exact(3))
            .enumerate()
        {
            let gain = boost_stops(x as u32, y).exp2();
            let linear = [0, 1, 2].map(|c| srgb_eotf(px[c] as f32 / 255.0) * gain);
            let linear = convert_gamut(linear, sdr.primaries, primaries);
            for c in 0..3 {
                out[c] = quantize(from_linear(linear[c], ColorTransfer::Pq), max);
            }
        }
    }
    image
}

/// An empty RGB output image with the depth, transfer and primaries of
/// `like`.
pub fn output_like(width: u32, height: u32, like: &Image) -> Image {
    let mut image = Image::new(width, height, like.depth, PixelLayout::Rgb).unwrap();
    image.transfer = like.transfer;
    image.primaries = like.primaries;
    image
}
