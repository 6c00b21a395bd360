//! Lossy scale-and-round quantization of floating-point images, tile by tile,
//! with reproducible subtractive dithering.
//!
//! Public API
//! ----------
//! * [`quantize_image`] – map an N-d `f32` image to integers for storage.
//! * [`restore_image`] – invert the mapping, re-drawing the same dither values.
//!

use anyhow::{bail, Context, Result};
use ndarray::{ArrayD, ArrayViewD, SliceInfoElem};
use rayon::prelude::*;

use crate::dither::DitherGenerator;
use crate::tiles::{Tile, TileGrid};

/// Stored value for pixels that are NaN or infinite in the source image.
pub const BLANK: i32 = -2147483647;

//────────────────────────────── PARAMETERS ──────────────────────────────

/// How quantization noise is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherMethod {
    /// Plain rounding, no noise.
    None,
    /// Noise added before rounding and subtracted again on restore, seeded
    /// per tile from the tile's grid index.
    Subtractive,
}

/// Quantization parameters (kept outside the stored stream).
#[derive(Debug, Clone)]
pub struct QuantizeParams {
    pub tile_size: Vec<usize>,
    pub scale: f64,
    pub method: DitherMethod,
}

impl QuantizeParams {
    pub fn new(tile_size: &[usize], scale: f64) -> Self {
        Self {
            tile_size: tile_size.to_vec(),
            scale,
            method: DitherMethod::Subtractive,
        }
    }
}

//─────────────────────────── INTERNAL HELPERS ───────────────────────────

fn tile_slice(tile: &Tile) -> Vec<SliceInfoElem> {
    tile.corner
        .iter()
        .zip(&tile.size)
        .map(|(&c, &s)| SliceInfoElem::Slice {
            start: c as isize,
            end: Some((c + s) as isize),
            step: 1,
        })
        .collect()
}

/// Fresh noise cursor positioned for `tile`, or `None` with dithering off.
fn tile_noise(p: &QuantizeParams, tile: &Tile) -> Option<DitherGenerator> {
    match p.method {
        DitherMethod::None => None,
        DitherMethod::Subtractive => {
            let mut noise = DitherGenerator::new();
            noise.seek(tile.index as i64);
            Some(noise)
        }
    }
}

fn grid_for(shape: &[usize], p: &QuantizeParams) -> Result<TileGrid> {
    if !(p.scale.is_finite() && p.scale > 0.0) {
        bail!("quantization scale must be positive and finite, got {}", p.scale);
    }
    TileGrid::new(shape, &p.tile_size).context("invalid tile layout")
}

/// Quantize one tile. Pixels are visited with axis 0 varying fastest, the
/// same order the restore side uses, so both ends draw the same noise for
/// the same pixel. A blank pixel still consumes its draw to keep the two
/// cursors aligned over the rest of the tile.
fn quantize_tile(
    block: ArrayViewD<'_, f32>,
    scale: f64,
    mut noise: Option<DitherGenerator>,
) -> ArrayD<i32> {
    let mut out = ArrayD::<i32>::zeros(block.raw_dim());
    {
        let mut flat = out.view_mut().reversed_axes();
        for (q, &v) in flat.iter_mut().zip(block.reversed_axes().iter()) {
            let d = noise.as_mut().map_or(0.0, |n| n.next_value());
            *q = if v.is_finite() {
                (v as f64 / scale + d).round() as i32
            } else {
                BLANK
            };
        }
    }
    out
}

fn restore_tile(
    block: ArrayViewD<'_, i32>,
    scale: f64,
    mut noise: Option<DitherGenerator>,
) -> ArrayD<f32> {
    let mut out = ArrayD::<f32>::zeros(block.raw_dim());
    {
        let mut flat = out.view_mut().reversed_axes();
        for (r, &q) in flat.iter_mut().zip(block.reversed_axes().iter()) {
            let d = noise.as_mut().map_or(0.0, |n| n.next_value());
            *r = if q == BLANK {
                f32::NAN
            } else {
                ((q as f64 - d) * scale) as f32
            };
        }
    }
    out
}

//──────────────────────────── TOP-LEVEL API ─────────────────────────────

pub fn quantize_image(data: ArrayViewD<'_, f32>, p: &QuantizeParams) -> Result<ArrayD<i32>> {
    let grid = grid_for(data.shape(), p)?;
    let tiles: Vec<Tile> = grid.tiles().collect();

    let blocks: Vec<(Tile, ArrayD<i32>)> = tiles
        .into_par_iter()
        .map(|t| {
            let block = data.slice(tile_slice(&t).as_slice());
            let q = quantize_tile(block, p.scale, tile_noise(p, &t));
            (t, q)
        })
        .collect();

    // single-threaded stitch
    let mut out = ArrayD::<i32>::zeros(data.raw_dim());
    for (t, block) in blocks {
        out.slice_mut(tile_slice(&t).as_slice()).assign(&block);
    }
    Ok(out)
}

pub fn restore_image(data: ArrayViewD<'_, i32>, p: &QuantizeParams) -> Result<ArrayD<f32>> {
    let grid = grid_for(data.shape(), p)?;
    let tiles: Vec<Tile> = grid.tiles().collect();

    let blocks: Vec<(Tile, ArrayD<f32>)> = tiles
        .into_par_iter()
        .map(|t| {
            let block = data.slice(tile_slice(&t).as_slice());
            let r = restore_tile(block, p.scale, tile_noise(p, &t));
            (t, r)
        })
        .collect();

    let mut out = ArrayD::<f32>::zeros(data.raw_dim());
    for (t, block) in blocks {
        out.slice_mut(tile_slice(&t).as_slice()).assign(&block);
    }
    Ok(out)
}

//──────────────────────────────── TESTS ─────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn ramp(shape: &[usize]) -> ArrayD<f32> {
        let len: usize = shape.iter().product();
        ArrayD::from_shape_vec(
            shape.to_vec(),
            (0..len).map(|i| (i as f32) * 0.37 - 40.0).collect(),
        )
        .unwrap()
    }

    #[test]
    fn roundtrip_error_is_bounded_by_half_a_step() {
        let data = ramp(&[37, 22]);
        let p = QuantizeParams::new(&[10, 8], 0.25);
        let quantized = quantize_image(data.view(), &p).unwrap();
        let restored = restore_image(quantized.view(), &p).unwrap();

        for (&orig, &back) in data.iter().zip(restored.iter()) {
            assert!(
                (orig - back).abs() as f64 <= 0.5 * p.scale + 1e-4,
                "{orig} -> {back}"
            );
        }
    }

    #[test]
    fn quantization_is_deterministic() {
        let data = ramp(&[64, 33]);
        let p = QuantizeParams::new(&[16, 10], 0.1);
        let a = quantize_image(data.view(), &p).unwrap();
        let b = quantize_image(data.view(), &p).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parallel_tiles_match_a_serial_walk() {
        let data = ramp(&[23, 17]);
        let p = QuantizeParams::new(&[8, 5], 0.2);
        let quantized = quantize_image(data.view(), &p).unwrap();

        let grid = TileGrid::new(data.shape(), &p.tile_size).unwrap();
        for t in grid.tiles() {
            let block = data.slice(tile_slice(&t).as_slice());
            let expect = quantize_tile(block, p.scale, tile_noise(&p, &t));
            let got = quantized.slice(tile_slice(&t).as_slice());
            assert_eq!(got, expect.view(), "tile {}", t.index);
        }
    }

    #[test]
    fn first_pixel_uses_the_tile_seed() {
        let data = ArrayD::from_shape_vec(vec![1], vec![3.2f32]).unwrap();
        let p = QuantizeParams::new(&[1], 0.5);
        let quantized = quantize_image(data.view(), &p).unwrap();

        let mut noise = DitherGenerator::new();
        noise.seek(0);
        let expect = (3.2f64 / 0.5 + noise.next_value()).round() as i32;
        assert_eq!(quantized[[0]], expect);
    }

    #[test]
    fn without_dither_values_round_to_the_nearest_step() {
        let data = ramp(&[12, 9]);
        let mut p = QuantizeParams::new(&[5, 5], 0.25);
        p.method = DitherMethod::None;
        let quantized = quantize_image(data.view(), &p).unwrap();
        for (&v, &q) in data.iter().zip(quantized.iter()) {
            assert_eq!(q, (v as f64 / 0.25).round() as i32);
        }
    }

    #[test]
    fn blank_pixels_roundtrip_and_keep_neighbours_aligned() {
        let mut data = ramp(&[20, 15]);
        data[[7, 4]] = f32::NAN;
        data[[0, 14]] = f32::INFINITY;

        let p = QuantizeParams::new(&[6, 6], 0.25);
        let quantized = quantize_image(data.view(), &p).unwrap();
        assert_eq!(quantized[[7, 4]], BLANK);
        assert_eq!(quantized[[0, 14]], BLANK);

        let restored = restore_image(quantized.view(), &p).unwrap();
        assert!(restored[[7, 4]].is_nan());
        assert!(restored[[0, 14]].is_nan());

        // blanks consume a draw, so every other pixel stays within the bound
        for (idx, &orig) in data.indexed_iter() {
            if orig.is_finite() {
                let back = restored[&idx];
                assert!((orig - back).abs() as f64 <= 0.5 * p.scale + 1e-4);
            }
        }
    }

    #[test]
    fn three_dimensional_images_roundtrip() {
        let data = ramp(&[9, 7, 5]);
        let p = QuantizeParams::new(&[4, 4, 2], 0.5);
        let quantized = quantize_image(data.view(), &p).unwrap();
        let restored = restore_image(quantized.view(), &p).unwrap();
        for (&orig, &back) in data.iter().zip(restored.iter()) {
            assert!((orig - back).abs() as f64 <= 0.5 * p.scale + 1e-4);
        }
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let data = ramp(&[10, 10]);
        assert!(quantize_image(data.view(), &QuantizeParams::new(&[4, 4], 0.0)).is_err());
        assert!(quantize_image(data.view(), &QuantizeParams::new(&[4, 4], f64::NAN)).is_err());
        assert!(quantize_image(data.view(), &QuantizeParams::new(&[4], 0.1)).is_err());
        assert!(quantize_image(data.view(), &QuantizeParams::new(&[4, 0], 0.1)).is_err());
    }
}
