//! Area resampling of linear float images.
//!
//! Each destination pixel averages the source area it covers, weighting
//! partially covered source pixels by coverage. The filter is separable and
//! runs horizontally then vertically. Upscaling degenerates to nearest or
//! two-tap linear coverage.

use alloc::vec;
use alloc::vec::Vec;

/// Source span and weights for one destination sample.
struct Contribution {
    start: usize,
    weights: Vec<f32>,
}

fn area_weights(src: usize, dst: usize) -> Vec<Contribution> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|x| {
            let lo = x as f64 * scale;
            let hi = (x + 1) as f64 * scale;
            let start = (lo.floor() as usize).min(src - 1);
            let end = (hi.ceil() as usize).clamp(start + 1, src);
            let weights = (start..end)
                .map(|sx| {
                    let overlap = hi.min((sx + 1) as f64) - lo.max(sx as f64);
                    (overlap.max(0.0) / (hi - lo)) as f32
                })
                .collect();
            Contribution { start, weights }
        })
        .collect()
}

/// Resample interleaved `channels`-sample pixels from `src_w`x`src_h` to
/// `dst_w`x`dst_h`.
///
/// All dimensions must be non-zero and `src` must hold exactly
/// `src_w * src_h * channels` samples.
pub fn resample_area(
    src: &[f32],
    src_w: usize,
    src_h: usize,
    channels: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<f32> {
    debug_assert_eq!(src.len(), src_w * src_h * channels);
    if src_w == dst_w && src_h == dst_h {
        return src.to_vec();
    }

    // Horizontal pass
    let columns = area_weights(src_w, dst_w);
    let mut temp = vec![0.0f32; dst_w * src_h * channels];
    for (src_row, dst_row) in src
        .chunks_exact(src_w * channels)
        .zip(temp.chunks_exact_mut(dst_w * channels))
    {
        for (contrib, dst_px) in columns.iter().zip(dst_row.chunks_exact_mut(channels)) {
            for (i, &w) in contrib.weights.iter().enumerate() {
                let idx = (contrib.start + i) * channels;
                for (d, s) in dst_px.iter_mut().zip(&src_row[idx..idx + channels]) {
                    *d += s * w;
                }
            }
        }
    }

    // Vertical pass
    let rows = area_weights(src_h, dst_h);
    let row_len = dst_w * channels;
    let mut dst = vec![0.0f32; dst_w * dst_h * channels];
    for (contrib, dst_row) in rows.iter().zip(dst.chunks_exact_mut(row_len)) {
        for (i, &w) in contrib.weights.iter().enumerate() {
            let start = (contrib.start + i) * row_len;
            for (d, s) in dst_row.iter_mut().zip(&temp[start..start + row_len]) {
                *d += s * w;
            }
        }
    }
    dst
}
