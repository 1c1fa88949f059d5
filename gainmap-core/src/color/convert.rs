//! Conversion between integer samples and linear light.
//!
//! Decoding goes through a lookup table with one entry per code value, so
//! transfer functions are evaluated once per code rather than once per sample.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use enough::Stop;

use super::gamut::{gamut_conversion_matrix, Matrix3x3};
use super::transfer::{from_linear, to_linear};
use crate::types::{ColorGamut, ColorTransfer, Error, Image, PixelLayout, Result};

/// Reject images whose color interpretation is unknown.
pub fn require_color_info(image: &Image, what: &str) -> Result<()> {
    if image.transfer == ColorTransfer::Unspecified {
        return Err(Error::InvalidParameter(format!(
            "{} image has unspecified transfer characteristics",
            what
        )));
    }
    if image.primaries == ColorGamut::Unspecified {
        return Err(Error::InvalidParameter(format!(
            "{} image has unspecified color primaries",
            what
        )));
    }
    Ok(())
}

/// Normalize a code value to `[0, 1]`.
#[inline]
pub fn normalize(code: u16, max: u16) -> f32 {
    code as f32 / max as f32
}

/// Quantize a normalized value to a code value, rounding to nearest.
#[inline]
pub fn quantize(value: f32, max: u16) -> u16 {
    (value.clamp(0.0, 1.0) * max as f32 + 0.5) as u16
}

/// Rescale a code value between bit depths.
#[inline]
pub fn rescale(code: u16, from_max: u16, to_max: u16) -> u16 {
    if from_max == to_max {
        return code;
    }
    ((code as u32 * to_max as u32 + from_max as u32 / 2) / from_max as u32) as u16
}

/// Decodes the samples of one image to linear RGB (1.0 = SDR white) in a
/// chosen set of primaries.
pub struct LinearDecoder {
    table: Vec<f32>,
    matrix: Matrix3x3,
    layout: PixelLayout,
}

impl LinearDecoder {
    /// Build a decoder for `image`, converting to `target` primaries.
    pub fn new(image: &Image, target: ColorGamut, what: &str) -> Result<Self> {
        require_color_info(image, what)?;
        let max = image.max_value();
        let table = (0..=max)
            .map(|code| to_linear(normalize(code, max), image.transfer))
            .collect();
        Ok(Self {
            table,
            matrix: gamut_conversion_matrix(image.primaries, target),
            layout: image.layout,
        })
    }

    /// Linear value of a single code.
    #[inline]
    pub fn linear(&self, code: u16) -> f32 {
        self.table[code as usize]
    }

    /// Linear RGB of one pixel's samples.
    #[inline]
    pub fn decode_pixel(&self, samples: &[u16]) -> [f32; 3] {
        let rgb = match self.layout {
            PixelLayout::Gray => {
                let v = self.linear(samples[0]);
                [v, v, v]
            }
            PixelLayout::Rgb | PixelLayout::Rgba => [
                self.linear(samples[0]),
                self.linear(samples[1]),
                self.linear(samples[2]),
            ],
        };
        self.matrix.transform(rgb)
    }

    /// Decode a whole image into interleaved linear RGB.
    pub fn decode_image(&self, image: &Image, stop: &impl Stop) -> Result<Vec<f32>> {
        let channels = image.channels();
        let mut out = vec![0.0f32; image.width as usize * image.height as usize * 3];
        for (y, dst) in out.chunks_exact_mut(image.width as usize * 3).enumerate() {
            stop.check()?;
            let src = image.row(y as u32);
            for (px, rgb) in src.chunks_exact(channels).zip(dst.chunks_exact_mut(3)) {
                rgb.copy_from_slice(&self.decode_pixel(px));
            }
        }
        Ok(out)
    }
}

/// Encodes linear RGB (1.0 = SDR white) to integer samples of an output
/// image, converting primaries first.
pub struct SignalEncoder {
    matrix: Matrix3x3,
    transfer: ColorTransfer,
    max: u16,
}

impl SignalEncoder {
    /// Build an encoder from `source` primaries to `output`'s description.
    pub fn new(source: ColorGamut, output: &Image) -> Result<Self> {
        require_color_info(output, "output")?;
        Ok(Self {
            matrix: gamut_conversion_matrix(source, output.primaries),
            transfer: output.transfer,
            max: output.max_value(),
        })
    }

    /// Encode one pixel.
    #[inline]
    pub fn encode_pixel(&self, linear: [f32; 3]) -> [u16; 3] {
        let rgb = self.matrix.transform(linear);
        [
            quantize(from_linear(rgb[0], self.transfer), self.max),
            quantize(from_linear(rgb[1], self.transfer), self.max),
            quantize(from_linear(rgb[2], self.transfer), self.max),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enough::Unstoppable;

    fn image(depth: u8, transfer: ColorTransfer, data: Vec<u16>) -> Image {
        let mut img = Image::from_data(data.len() as u32 / 3, 1, depth, PixelLayout::Rgb, data)
            .unwrap();
        img.transfer = transfer;
        img
    }

    #[test]
    fn test_quantize_and_rescale() {
        assert_eq!(quantize(0.0, 255), 0);
        assert_eq!(quantize(1.0, 255), 255);
        assert_eq!(quantize(2.0, 1023), 1023);
        assert_eq!(quantize(-1.0, 1023), 0);
        assert_eq!(quantize(0.5, 255), 128);
        assert_eq!(rescale(255, 255, 1023), 1023);
        assert_eq!(rescale(1023, 1023, 255), 255);
        assert_eq!(rescale(512, 1023, 255), 128);
        assert_eq!(rescale(7, 255, 255), 7);
    }

    #[test]
    fn test_decode_encode_roundtrip() {
        let img = image(10, ColorTransfer::Pq, vec![0, 100, 200, 512, 700, 1023]);
        let decoder = LinearDecoder::new(&img, ColorGamut::Bt709, "test").unwrap();
        let encoder = SignalEncoder::new(ColorGamut::Bt709, &img).unwrap();
        for x in 0..2 {
            let px = img.pixel(x, 0);
            let back = encoder.encode_pixel(decoder.decode_pixel(px));
            assert_eq!(&back[..], px);
        }
    }

    #[test]
    fn test_decode_image_gray_replicates() {
        let mut img = Image::from_data(2, 1, 8, PixelLayout::Gray, vec![0, 255]).unwrap();
        img.transfer = ColorTransfer::Srgb;
        let decoder = LinearDecoder::new(&img, ColorGamut::Bt709, "test").unwrap();
        let linear = decoder.decode_image(&img, &Unstoppable).unwrap();
        let expected = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        assert_eq!(linear.len(), expected.len());
        for (a, b) in linear.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_unspecified_color_info_is_rejected() {
        let mut img = image(8, ColorTransfer::Unspecified, vec![0, 0, 0]);
        assert!(matches!(
            LinearDecoder::new(&img, ColorGamut::Bt709, "base"),
            Err(Error::InvalidParameter(_))
        ));
        img.transfer = ColorTransfer::Srgb;
        img.primaries = ColorGamut::Unspecified;
        assert!(LinearDecoder::new(&img, ColorGamut::Bt709, "base").is_err());
        assert!(SignalEncoder::new(ColorGamut::Bt709, &img).is_err());
    }
}
