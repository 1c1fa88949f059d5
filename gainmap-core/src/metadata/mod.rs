//! Gain map metadata: the exact rational form, its float mirror, and the
//! ISO 21496-1 binary payload.

pub mod iso21496;
pub mod rational;

use alloc::format;

pub use rational::{Fraction, UnsignedFraction};

use crate::types::{Error, Result};

/// Gain map metadata in exact rational form.
///
/// The all-zero value returned by `Default` is the "absent" sentinel: it is
/// not valid and [`to_float`](Self::to_float) rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GainMapMetadata {
    /// The metadata describes alternate to base instead of base to alternate.
    ///
    /// When set, stored gains are `log2((base + base_offset) / (alternate +
    /// alternate_offset))`.
    pub backward_direction: bool,
    /// Gain map math happens in the base image primaries.
    pub use_base_color_space: bool,
    /// log2 stops above SDR white of the base rendition.
    pub base_hdr_headroom: UnsignedFraction,
    /// log2 stops above SDR white of the alternate rendition.
    pub alternate_hdr_headroom: UnsignedFraction,
    /// Per-channel offset added to base samples.
    pub base_offset: [Fraction; 3],
    /// Per-channel offset added to alternate samples.
    pub alternate_offset: [Fraction; 3],
    /// Per-channel gamma of the stored gain values. Strictly positive.
    pub gain_map_gamma: [UnsignedFraction; 3],
    /// Per-channel log2 gain at stored value 0.
    pub gain_map_min: [Fraction; 3],
    /// Per-channel log2 gain at the largest stored value.
    pub gain_map_max: [Fraction; 3],
}

impl GainMapMetadata {
    /// Returns true for the all-zero "absent" sentinel.
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true if all three channels are bit-identical.
    pub fn is_single_channel(&self) -> bool {
        (1..3).all(|c| {
            self.gain_map_min[c] == self.gain_map_min[0]
                && self.gain_map_max[c] == self.gain_map_max[0]
                && self.gain_map_gamma[c] == self.gain_map_gamma[0]
                && self.base_offset[c] == self.base_offset[0]
                && self.alternate_offset[c] == self.alternate_offset[0]
        })
    }

    /// Check denominators and gamma.
    pub fn validate(&self) -> Result<()> {
        if !self.base_hdr_headroom.is_valid() || !self.alternate_hdr_headroom.is_valid() {
            return Err(Error::InvalidParameter(
                "hdr headroom has a zero denominator".into(),
            ));
        }
        for c in 0..3 {
            let fields = [
                ("base_offset", self.base_offset[c].is_valid()),
                ("alternate_offset", self.alternate_offset[c].is_valid()),
                ("gain_map_gamma", self.gain_map_gamma[c].is_valid()),
                ("gain_map_min", self.gain_map_min[c].is_valid()),
                ("gain_map_max", self.gain_map_max[c].is_valid()),
            ];
            if let Some((name, _)) = fields.iter().find(|field| !field.1) {
                return Err(Error::InvalidParameter(format!(
                    "{}[{}] has a zero denominator",
                    name, c
                )));
            }
            if self.gain_map_gamma[c].numerator == 0 {
                return Err(Error::InvalidParameter(format!(
                    "gain_map_gamma[{}] must be positive",
                    c
                )));
            }
        }
        Ok(())
    }

    /// Convert to floats. Fails if any denominator is zero.
    pub fn to_float(&self) -> Result<GainMapMetadataFloat> {
        self.validate()?;
        let mut out = GainMapMetadataFloat {
            backward_direction: self.backward_direction,
            use_base_color_space: self.use_base_color_space,
            base_hdr_headroom: self.base_hdr_headroom.to_f64()?,
            alternate_hdr_headroom: self.alternate_hdr_headroom.to_f64()?,
            ..Default::default()
        };
        for c in 0..3 {
            out.base_offset[c] = self.base_offset[c].to_f64()?;
            out.alternate_offset[c] = self.alternate_offset[c].to_f64()?;
            out.gain_map_gamma[c] = self.gain_map_gamma[c].to_f64()?;
            out.gain_map_min[c] = self.gain_map_min[c].to_f64()?;
            out.gain_map_max[c] = self.gain_map_max[c].to_f64()?;
        }
        Ok(out)
    }

    /// Exchange the roles of the base and alternate renditions.
    ///
    /// The stored gains are unchanged; flipping `backward_direction` keeps
    /// their meaning.
    pub fn swap_base_and_alternate(&mut self) {
        self.backward_direction = !self.backward_direction;
        self.use_base_color_space = !self.use_base_color_space;
        core::mem::swap(&mut self.base_hdr_headroom, &mut self.alternate_hdr_headroom);
        core::mem::swap(&mut self.base_offset, &mut self.alternate_offset);
    }
}

/// Gain map metadata as floats, for computation and authoring.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GainMapMetadataFloat {
    /// See [`GainMapMetadata::backward_direction`].
    pub backward_direction: bool,
    /// See [`GainMapMetadata::use_base_color_space`].
    pub use_base_color_space: bool,
    /// log2 stops above SDR white of the base rendition.
    pub base_hdr_headroom: f64,
    /// log2 stops above SDR white of the alternate rendition.
    pub alternate_hdr_headroom: f64,
    /// Per-channel offset added to base samples.
    pub base_offset: [f64; 3],
    /// Per-channel offset added to alternate samples.
    pub alternate_offset: [f64; 3],
    /// Per-channel gamma.
    pub gain_map_gamma: [f64; 3],
    /// Per-channel log2 gain at stored value 0.
    pub gain_map_min: [f64; 3],
    /// Per-channel log2 gain at the largest stored value.
    pub gain_map_max: [f64; 3],
}

impl GainMapMetadataFloat {
    /// Identity metadata: unit gamma, 1/64 offsets, zero gains and headrooms.
    pub fn new() -> Self {
        Self {
            backward_direction: false,
            use_base_color_space: true,
            base_hdr_headroom: 0.0,
            alternate_hdr_headroom: 0.0,
            base_offset: [1.0 / 64.0; 3],
            alternate_offset: [1.0 / 64.0; 3],
            gain_map_gamma: [1.0; 3],
            gain_map_min: [0.0; 3],
            gain_map_max: [0.0; 3],
        }
    }

    /// Convert to fractions.
    ///
    /// Fails without producing anything if any gamma is not strictly
    /// positive, a headroom is negative, or a value is not finite.
    pub fn to_fractions(&self) -> Result<GainMapMetadata> {
        for (c, &gamma) in self.gain_map_gamma.iter().enumerate() {
            if gamma.is_nan() || gamma <= 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "gain_map_gamma[{}] must be positive, got {}",
                    c, gamma
                )));
            }
        }

        let mut out = GainMapMetadata {
            backward_direction: self.backward_direction,
            use_base_color_space: self.use_base_color_space,
            base_hdr_headroom: UnsignedFraction::from_f64(self.base_hdr_headroom)?,
            alternate_hdr_headroom: UnsignedFraction::from_f64(self.alternate_hdr_headroom)?,
            ..Default::default()
        };
        for c in 0..3 {
            out.base_offset[c] = Fraction::from_f64(self.base_offset[c])?;
            out.alternate_offset[c] = Fraction::from_f64(self.alternate_offset[c])?;
            out.gain_map_gamma[c] = UnsignedFraction::from_f64(self.gain_map_gamma[c])?;
            out.gain_map_min[c] = Fraction::from_f64(self.gain_map_min[c])?;
            out.gain_map_max[c] = Fraction::from_f64(self.gain_map_max[c])?;
        }
        // A tiny gamma can round to 0/1.
        out.validate()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_float() -> GainMapMetadataFloat {
        GainMapMetadataFloat {
            gain_map_min: [1.0, 1.1, 1.2],
            gain_map_max: [10.0, 10.1, 10.2],
            gain_map_gamma: [1.0, 1.0, 1.2],
            base_offset: [1.0 / 32.0, 1.0 / 64.0, 1.0 / 128.0],
            alternate_offset: [0.004564, 0.0, 0.0],
            base_hdr_headroom: 1.0,
            alternate_hdr_headroom: 10.0,
            backward_direction: true,
            use_base_color_space: false,
        }
    }

    fn assert_fraction_near(n: f64, d: f64, expected: f64) {
        let v = (n / d).abs();
        assert!(
            (v - expected).abs() <= expected * 0.001,
            "{}/{} not near {}",
            n,
            d,
            expected
        );
    }

    #[test]
    fn test_convert_metadata() {
        let float = sample_float();
        let m = float.to_fractions().unwrap();

        for i in 0..3 {
            let f = m.gain_map_min[i];
            assert_fraction_near(f.numerator as f64, f.denominator as f64, float.gain_map_min[i]);
            let f = m.gain_map_max[i];
            assert_fraction_near(f.numerator as f64, f.denominator as f64, float.gain_map_max[i]);
            let f = m.gain_map_gamma[i];
            assert_fraction_near(
                f.numerator as f64,
                f.denominator as f64,
                float.gain_map_gamma[i],
            );
            let f = m.base_offset[i];
            assert_fraction_near(f.numerator as f64, f.denominator as f64, float.base_offset[i]);
            let f = m.alternate_offset[i];
            assert_fraction_near(
                f.numerator as f64,
                f.denominator as f64,
                float.alternate_offset[i],
            );
        }
        assert!(m.backward_direction);
        assert!(!m.use_base_color_space);

        let back = m.to_float().unwrap();
        for i in 0..3 {
            assert_abs_diff_eq!(back.gain_map_min[i], float.gain_map_min[i], epsilon = 1e-6);
            assert_abs_diff_eq!(back.gain_map_max[i], float.gain_map_max[i], epsilon = 1e-6);
            assert_abs_diff_eq!(back.gain_map_gamma[i], float.gain_map_gamma[i], epsilon = 1e-6);
            assert_abs_diff_eq!(back.base_offset[i], float.base_offset[i], epsilon = 1e-6);
            assert_abs_diff_eq!(
                back.alternate_offset[i],
                float.alternate_offset[i],
                epsilon = 1e-6
            );
        }
        assert_abs_diff_eq!(back.base_hdr_headroom, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(back.alternate_hdr_headroom, 10.0, epsilon = 1e-6);
        assert_eq!(back.backward_direction, float.backward_direction);
    }

    #[test]
    fn test_to_fractions_rejects_negative_gamma() {
        let mut float = GainMapMetadataFloat::new();
        float.gain_map_gamma[0] = -42.0;
        assert!(matches!(
            float.to_fractions(),
            Err(Error::InvalidParameter(_))
        ));

        let mut float = GainMapMetadataFloat::new();
        float.gain_map_gamma[2] = 0.0;
        assert!(float.to_fractions().is_err());

        // Default is all zeros, including gamma.
        assert!(GainMapMetadataFloat::default().to_fractions().is_err());
    }

    #[test]
    fn test_to_fractions_rejects_bad_headroom() {
        let mut float = GainMapMetadataFloat::new();
        float.alternate_hdr_headroom = -1.0;
        assert!(float.to_fractions().is_err());

        let mut float = GainMapMetadataFloat::new();
        float.gain_map_max[1] = f64::NAN;
        assert!(float.to_fractions().is_err());
    }

    #[test]
    fn test_to_float_rejects_absent_metadata() {
        let m = GainMapMetadata::default();
        assert!(m.is_unset());
        assert!(matches!(m.to_float(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_to_float_rejects_single_zero_denominator() {
        let mut m = GainMapMetadataFloat::new().to_fractions().unwrap();
        assert!(m.to_float().is_ok());
        m.alternate_offset[2].denominator = 0;
        assert!(m.to_float().is_err());
    }

    #[test]
    fn test_single_channel_detection() {
        let mut m = GainMapMetadataFloat::new().to_fractions().unwrap();
        assert!(m.is_single_channel());
        m.gain_map_max[1] = Fraction::new(3, 2);
        assert!(!m.is_single_channel());
    }

    #[test]
    fn test_swap_base_and_alternate_twice_is_identity() {
        let original = sample_float().to_fractions().unwrap();
        let mut m = original;
        m.swap_base_and_alternate();
        assert_ne!(m, original);
        assert_eq!(m.base_hdr_headroom, original.alternate_hdr_headroom);
        assert_eq!(m.base_offset, original.alternate_offset);
        assert_eq!(m.backward_direction, !original.backward_direction);
        assert_eq!(m.gain_map_max, original.gain_map_max);
        m.swap_base_and_alternate();
        assert_eq!(m, original);
    }
}
