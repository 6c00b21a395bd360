//! tilepack – tile decomposition and reproducible dithering for lossy
//! compression of floating-point scientific images.
//!
//! [`TileGrid`] partitions an N-dimensional image into a deterministic,
//! ordered sequence of rectangular [`Tile`]s, truncated at the image
//! boundary. [`DitherGenerator`] supplies the per-pixel quantization noise,
//! sought per tile so that independent readers of the same data reproduce
//! the stored integers bit for bit. [`quantize_image`] / [`restore_image`]
//! compose the two into the tile-by-tile quantization pass that sits in
//! front of an entropy coder.

mod dither;
mod quantize;
mod tiles;

pub use crate::dither::{DitherGenerator, TABLE_LEN};
pub use crate::quantize::{quantize_image, restore_image, DitherMethod, QuantizeParams, BLANK};
pub use crate::tiles::{Tile, TileGrid, TileIter};
