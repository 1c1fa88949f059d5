//! Color primaries and the linear-light conversions between them.
//!
//! Every supported gamut shares the D65 white point, so conversions are a
//! single 3x3 matrix derived from the primaries' chromaticities:
//! `xyz_to_rgb(to) * rgb_to_xyz(from)`. Luminance weights are the Y row of
//! `rgb_to_xyz`.

use crate::types::ColorGamut;

/// CIE 1931 xy chromaticities of the red, green and blue primaries.
type Primaries = [[f64; 2]; 3];

const D65: [f64; 2] = [0.3127, 0.3290];

const BT709_PRIMARIES: Primaries = [[0.640, 0.330], [0.300, 0.600], [0.150, 0.060]];
const P3_PRIMARIES: Primaries = [[0.680, 0.320], [0.265, 0.690], [0.150, 0.060]];
const BT2100_PRIMARIES: Primaries = [[0.708, 0.292], [0.170, 0.797], [0.131, 0.046]];

/// Row-major 3x3 matrix applied to linear RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3x3(pub [[f32; 3]; 3]);

impl Matrix3x3 {
    /// Identity matrix.
    pub const IDENTITY: Self = Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// `M * rgb`.
    #[inline]
    pub fn transform(&self, rgb: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        let row = |r: &[f32; 3]| r[0] * rgb[0] + r[1] * rgb[1] + r[2] * rgb[2];
        [row(&m[0]), row(&m[1]), row(&m[2])]
    }

    /// Returns true for the identity matrix.
    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

type M3 = [[f64; 3]; 3];

fn mul(a: &M3, b: &M3) -> M3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn invert(m: &M3) -> M3 {
    let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
    };
    let adj = [
        [cofactor(1, 2, 1, 2), -cofactor(0, 2, 1, 2), cofactor(0, 1, 1, 2)],
        [-cofactor(1, 2, 0, 2), cofactor(0, 2, 0, 2), -cofactor(0, 1, 0, 2)],
        [cofactor(1, 2, 0, 1), -cofactor(0, 2, 0, 1), cofactor(0, 1, 0, 1)],
    ];
    let det = m[0][0] * adj[0][0] + m[0][1] * adj[1][0] + m[0][2] * adj[2][0];
    adj.map(|row| row.map(|v| v / det))
}

fn xyz(xy: [f64; 2]) -> [f64; 3] {
    [xy[0] / xy[1], 1.0, (1.0 - xy[0] - xy[1]) / xy[1]]
}

fn primaries(gamut: ColorGamut) -> &'static Primaries {
    match gamut {
        ColorGamut::Bt709 | ColorGamut::Unspecified => &BT709_PRIMARIES,
        ColorGamut::DisplayP3 => &P3_PRIMARIES,
        ColorGamut::Bt2100 => &BT2100_PRIMARIES,
    }
}

/// Linear RGB to CIE XYZ, normalized so that RGB white has Y = 1.
fn rgb_to_xyz(gamut: ColorGamut) -> M3 {
    let p = primaries(gamut);
    let (r, g, b) = (xyz(p[0]), xyz(p[1]), xyz(p[2]));
    let columns: M3 = [[r[0], g[0], b[0]], [r[1], g[1], b[1]], [r[2], g[2], b[2]]];
    // Scale each primary so that R = G = B = 1 lands on the white point.
    let white = xyz(D65);
    let inv = invert(&columns);
    let s: [f64; 3] =
        core::array::from_fn(|i| (0..3).map(|k| inv[i][k] * white[k]).sum::<f64>());
    columns.map(|row| [row[0] * s[0], row[1] * s[1], row[2] * s[2]])
}

/// Luminance weights of the red, green and blue primaries.
///
/// Unspecified primaries use BT.709 weights.
pub fn luma_coefficients(gamut: ColorGamut) -> [f32; 3] {
    rgb_to_xyz(gamut)[1].map(|v| v as f32)
}

/// Relative luminance of linear RGB.
#[inline]
pub fn rgb_to_luminance(rgb: [f32; 3], gamut: ColorGamut) -> f32 {
    let w = luma_coefficients(gamut);
    w[0] * rgb[0] + w[1] * rgb[1] + w[2] * rgb[2]
}

/// Matrix converting linear RGB in `from` primaries to `to` primaries.
///
/// Conversions involving unspecified primaries are the identity; callers
/// reject unspecified primaries before converting.
pub fn gamut_conversion_matrix(from: ColorGamut, to: ColorGamut) -> Matrix3x3 {
    if from == to || from == ColorGamut::Unspecified || to == ColorGamut::Unspecified {
        return Matrix3x3::IDENTITY;
    }
    let m = mul(&invert(&rgb_to_xyz(to)), &rgb_to_xyz(from));
    Matrix3x3(m.map(|row| row.map(|v| v as f32)))
}

/// Convert linear RGB between primaries.
#[inline]
pub fn convert_gamut(rgb: [f32; 3], from: ColorGamut, to: ColorGamut) -> [f32; 3] {
    if from == to {
        return rgb;
    }
    gamut_conversion_matrix(from, to).transform(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [ColorGamut; 3] = [ColorGamut::Bt709, ColorGamut::DisplayP3, ColorGamut::Bt2100];

    #[test]
    fn test_bt709_to_bt2100_matches_bt2087() {
        // ITU-R BT.2087, table 2.
        let expected = [
            [0.6274, 0.3293, 0.0433],
            [0.0691, 0.9195, 0.0114],
            [0.0164, 0.0880, 0.8956],
        ];
        let m = gamut_conversion_matrix(ColorGamut::Bt709, ColorGamut::Bt2100);
        for (row, want) in m.0.iter().zip(expected) {
            for (&v, w) in row.iter().zip(want) {
                assert_abs_diff_eq!(v, w, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_round_trip_between_all_gamuts() {
        let rgb = [0.5, 0.3, 0.8];
        for from in ALL {
            for to in ALL {
                let back = convert_gamut(convert_gamut(rgb, from, to), to, from);
                for c in 0..3 {
                    assert_abs_diff_eq!(back[c], rgb[c], epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_white_is_preserved() {
        for from in ALL {
            for to in ALL {
                let out = convert_gamut([1.0; 3], from, to);
                for v in out {
                    assert_abs_diff_eq!(v, 1.0, epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_identity_cases() {
        assert!(gamut_conversion_matrix(ColorGamut::Unspecified, ColorGamut::Bt2100).is_identity());
        assert!(gamut_conversion_matrix(ColorGamut::Bt709, ColorGamut::Bt709).is_identity());
        assert!(!gamut_conversion_matrix(ColorGamut::Bt709, ColorGamut::DisplayP3).is_identity());
    }

    #[test]
    fn test_luma_coefficients() {
        for gamut in ALL {
            let w = luma_coefficients(gamut);
            assert_abs_diff_eq!(w[0] + w[1] + w[2], 1.0, epsilon = 1e-5);
        }
        let bt709 = luma_coefficients(ColorGamut::Bt709);
        assert_abs_diff_eq!(bt709[1], 0.7152, epsilon = 1e-3);
        let bt2100 = luma_coefficients(ColorGamut::Bt2100);
        assert_abs_diff_eq!(bt2100[0], 0.2627, epsilon = 1e-3);
        assert_abs_diff_eq!(rgb_to_luminance([0.0, 1.0, 0.0], ColorGamut::Bt2100), 0.678, epsilon = 1e-3);
    }
}
