//! Transfer functions and the SDR-white-relative linear scale.
//!
//! Gain map math runs on linear light where 1.0 is SDR reference white
//! (203 nits). sRGB and linear content tops out at 1.0; PQ reaches
//! 10000/203 and HLG (on a 1000 nit display) 1000/203.
//!
//! Reference standards:
//! - sRGB: IEC 61966-2-1
//! - PQ: SMPTE ST 2084, ITU-R BT.2100
//! - HLG: ITU-R BT.2100, ARIB STD-B67

#![allow(clippy::excessive_precision)]

use crate::types::{luminance, ColorTransfer, ContentLightLevel};

// ============================================================================
// sRGB
// ============================================================================

/// sRGB OETF: Linear `[0,1]` → sRGB encoded `[0,1]`
#[inline]
pub fn srgb_oetf(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// sRGB EOTF: sRGB encoded `[0,1]` → Linear `[0,1]`
#[inline]
pub fn srgb_eotf(encoded: f32) -> f32 {
    if encoded <= 0.04045 {
        encoded / 12.92
    } else {
        ((encoded + 0.055) / 1.055).powf(2.4)
    }
}

// ============================================================================
// PQ (SMPTE ST 2084)
// ============================================================================

const PQ_M1: f32 = 2610.0 / 16384.0;
const PQ_M2: f32 = 2523.0 / 4096.0 * 128.0;
const PQ_C1: f32 = 3424.0 / 4096.0;
const PQ_C2: f32 = 2413.0 / 4096.0 * 32.0;
const PQ_C3: f32 = 2392.0 / 4096.0 * 32.0;

/// PQ OETF: Linear `[0,1]` (1.0 = 10000 nits) → PQ encoded `[0,1]`
#[inline]
pub fn pq_oetf(linear: f32) -> f32 {
    if linear <= 0.0 {
        return 0.0;
    }
    let y_m1 = linear.powf(PQ_M1);
    ((PQ_C1 + PQ_C2 * y_m1) / (1.0 + PQ_C3 * y_m1)).powf(PQ_M2)
}

/// PQ EOTF: PQ encoded `[0,1]` → Linear `[0,1]` (1.0 = 10000 nits)
#[inline]
pub fn pq_eotf(encoded: f32) -> f32 {
    if encoded <= 0.0 {
        return 0.0;
    }
    let e_inv_m2 = encoded.powf(1.0 / PQ_M2);
    let numerator = (e_inv_m2 - PQ_C1).max(0.0);
    let denominator = PQ_C2 - PQ_C3 * e_inv_m2;
    if denominator <= 0.0 {
        return 0.0;
    }
    (numerator / denominator).powf(1.0 / PQ_M1)
}

// ============================================================================
// HLG (ITU-R BT.2100)
// ============================================================================

const HLG_A: f32 = 0.17883277;
const HLG_B: f32 = 0.28466892;
const HLG_C: f32 = 0.55991073;

/// HLG OETF: Scene linear `[0,1]` → HLG encoded `[0,1]`
#[inline]
pub fn hlg_oetf(linear: f32) -> f32 {
    if linear <= 0.0 {
        0.0
    } else if linear <= 1.0 / 12.0 {
        (3.0 * linear).sqrt()
    } else {
        HLG_A * (12.0 * linear - HLG_B).ln() + HLG_C
    }
}

/// HLG inverse OETF: HLG encoded `[0,1]` → Scene linear `[0,1]`
#[inline]
pub fn hlg_oetf_inv(encoded: f32) -> f32 {
    if encoded <= 0.0 {
        0.0
    } else if encoded <= 0.5 {
        encoded * encoded / 3.0
    } else {
        ((encoded - HLG_C) / HLG_A).exp() / 12.0 + HLG_B / 12.0
    }
}

/// System gamma of the HLG OOTF for a display peak.
#[inline]
fn hlg_system_gamma(display_peak_nits: f32) -> f32 {
    (1.2 + 0.42 * (display_peak_nits / 1000.0).log10()).clamp(1.0, 1.5)
}

/// HLG OOTF: Scene linear → Display linear, in nits.
#[inline]
pub fn hlg_ootf(scene_linear: f32, display_peak_nits: f32) -> f32 {
    scene_linear.max(0.0).powf(hlg_system_gamma(display_peak_nits)) * display_peak_nits
}

/// HLG inverse OOTF: Display linear in nits → Scene linear.
#[inline]
pub fn hlg_ootf_inv(display_nits: f32, display_peak_nits: f32) -> f32 {
    if display_nits <= 0.0 || display_peak_nits <= 0.0 {
        return 0.0;
    }
    (display_nits / display_peak_nits).powf(1.0 / hlg_system_gamma(display_peak_nits))
}

// ============================================================================
// SDR-white-relative linear
// ============================================================================

/// Largest linear value (1.0 = SDR white) a transfer function can encode.
#[inline]
pub fn peak_linear(transfer: ColorTransfer) -> f32 {
    match transfer {
        ColorTransfer::Pq => luminance::PQ_PEAK_NITS / luminance::SDR_WHITE_NITS,
        ColorTransfer::Hlg => luminance::HLG_PEAK_NITS / luminance::SDR_WHITE_NITS,
        ColorTransfer::Srgb | ColorTransfer::Linear | ColorTransfer::Unspecified => 1.0,
    }
}

/// Decode a normalized signal to linear light where 1.0 = SDR white.
#[inline]
pub fn to_linear(encoded: f32, transfer: ColorTransfer) -> f32 {
    match transfer {
        ColorTransfer::Srgb => srgb_eotf(encoded),
        ColorTransfer::Linear | ColorTransfer::Unspecified => encoded,
        ColorTransfer::Pq => pq_eotf(encoded) * peak_linear(ColorTransfer::Pq),
        ColorTransfer::Hlg => {
            hlg_ootf(hlg_oetf_inv(encoded), luminance::HLG_PEAK_NITS) / luminance::SDR_WHITE_NITS
        }
    }
}

/// Encode linear light (1.0 = SDR white) to a normalized signal.
///
/// Values beyond the transfer function's range are clipped.
#[inline]
pub fn from_linear(linear: f32, transfer: ColorTransfer) -> f32 {
    let linear = linear.clamp(0.0, peak_linear(transfer));
    match transfer {
        ColorTransfer::Srgb => srgb_oetf(linear),
        ColorTransfer::Linear | ColorTransfer::Unspecified => linear,
        ColorTransfer::Pq => pq_oetf(linear / peak_linear(ColorTransfer::Pq)),
        ColorTransfer::Hlg => hlg_oetf(hlg_ootf_inv(
            linear * luminance::SDR_WHITE_NITS,
            luminance::HLG_PEAK_NITS,
        )),
    }
}

/// Headroom in log2 stops above SDR white implied by a rendition's
/// transfer function and content light level.
///
/// A max CLL brighter than SDR white wins over the transfer function's
/// nominal peak. A dimmer or unknown max CLL falls back to the nominal
/// peak, so an HDR rendition never reports zero headroom. SDR transfers
/// have no headroom.
pub fn headroom_stops(transfer: ColorTransfer, clli: ContentLightLevel) -> f64 {
    if !transfer.is_hdr() {
        return 0.0;
    }
    let peak = if clli.max_cll as f32 > luminance::SDR_WHITE_NITS {
        clli.max_cll as f64
    } else {
        match transfer {
            ColorTransfer::Pq => luminance::PQ_PEAK_NITS as f64,
            _ => luminance::HLG_PEAK_NITS as f64,
        }
    };
    (peak / luminance::SDR_WHITE_NITS as f64).log2().max(0.0)
}
