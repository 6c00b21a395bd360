//! Tile decomposition of an N-dimensional image into an ordered sequence of
//! axis-aligned rectangular sub-regions.
//!
//! Public API
//! ----------
//! * [`TileGrid`] – validated image/tile geometry, immutable after construction.
//! * [`TileGrid::tiles`] – restartable iterator producing [`Tile`] descriptors.
//!

use anyhow::{bail, Result};

//────────────────────────────── DESCRIPTOR ──────────────────────────────

/// One rectangular sub-region of the image.
///
/// `corner` is the pixel offset of the tile's first element on each axis and
/// `size` its extent, truncated at the image boundary. `index` is the tile's
/// position in the full grid with axis 0 varying fastest; it is dense over the
/// whole grid even when iteration is restricted to a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub corner: Vec<usize>,
    pub size: Vec<usize>,
    pub index: usize,
}

//──────────────────────────────── GRID ──────────────────────────────────

/// Tile layout of an N-dimensional image.
///
/// The grid holds no iteration state: each call to [`TileGrid::tiles`] starts
/// an independent session yielding the same descriptor sequence, so a grid can
/// be shared read-only between concurrent consumers.
#[derive(Debug, Clone)]
pub struct TileGrid {
    image_size: Vec<usize>,
    tile_size: Vec<usize>,
    n_tiles: Vec<usize>,
    // iteration window, in tile coordinates
    corner: Vec<usize>,
    count: Vec<usize>,
}

impl TileGrid {
    /// Grid covering the whole image.
    pub fn new(image_size: &[usize], tile_size: &[usize]) -> Result<Self> {
        Self::build(image_size, tile_size, None, None)
    }

    /// Grid whose iteration is restricted to a sub-range of tiles.
    ///
    /// `corner` names the first tile to visit on each axis and `count` the
    /// number of tiles per axis. An omitted `corner` defaults to the grid
    /// origin, an omitted `count` to every tile from the corner to the end of
    /// the grid. Tile indices are still assigned over the full grid, so a
    /// windowed iteration yields a sparse subset of the index space.
    pub fn windowed(
        image_size: &[usize],
        tile_size: &[usize],
        corner: Option<&[usize]>,
        count: Option<&[usize]>,
    ) -> Result<Self> {
        Self::build(image_size, tile_size, corner, count)
    }

    fn build(
        image_size: &[usize],
        tile_size: &[usize],
        corner: Option<&[usize]>,
        count: Option<&[usize]>,
    ) -> Result<Self> {
        if image_size.is_empty() {
            bail!("image shape is empty");
        }
        if image_size.len() != tile_size.len() {
            bail!(
                "image is {}-d but tile shape is {}-d",
                image_size.len(),
                tile_size.len()
            );
        }
        let dim = image_size.len();

        let mut n_tiles = Vec::with_capacity(dim);
        for axis in 0..dim {
            if image_size[axis] == 0 {
                bail!("image extent on axis {axis} must be positive");
            }
            if tile_size[axis] == 0 {
                bail!("tile extent on axis {axis} must be positive");
            }
            n_tiles.push(image_size[axis].div_ceil(tile_size[axis]));
        }

        let win_corner = match corner {
            Some(c) => {
                if c.len() != dim {
                    bail!("window corner is {}-d but grid is {dim}-d", c.len());
                }
                for axis in 0..dim {
                    if c[axis] >= n_tiles[axis] {
                        bail!(
                            "window corner {} on axis {axis} is outside the {}-tile grid",
                            c[axis],
                            n_tiles[axis]
                        );
                    }
                }
                c.to_vec()
            }
            None => vec![0; dim],
        };

        let win_count = match count {
            Some(c) => {
                if c.len() != dim {
                    bail!("window count is {}-d but grid is {dim}-d", c.len());
                }
                for axis in 0..dim {
                    if c[axis] == 0 {
                        bail!("window count on axis {axis} must be positive");
                    }
                    if win_corner[axis] + c[axis] > n_tiles[axis] {
                        bail!(
                            "window [{}, {}) on axis {axis} exceeds the {}-tile grid",
                            win_corner[axis],
                            win_corner[axis] + c[axis],
                            n_tiles[axis]
                        );
                    }
                }
                c.to_vec()
            }
            None => (0..dim).map(|axis| n_tiles[axis] - win_corner[axis]).collect(),
        };

        Ok(Self {
            image_size: image_size.to_vec(),
            tile_size: tile_size.to_vec(),
            n_tiles,
            corner: win_corner,
            count: win_count,
        })
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.image_size.len()
    }

    #[inline]
    pub fn image_size(&self) -> &[usize] {
        &self.image_size
    }

    #[inline]
    pub fn tile_size(&self) -> &[usize] {
        &self.tile_size
    }

    /// Tiles per axis over the full image.
    #[inline]
    pub fn n_tiles(&self) -> &[usize] {
        &self.n_tiles
    }

    /// Number of tiles in the full grid.
    pub fn total_tiles(&self) -> usize {
        self.n_tiles.iter().product()
    }

    /// Number of tiles the iteration window visits.
    pub fn window_tiles(&self) -> usize {
        self.count.iter().product()
    }

    /// Start a fresh iteration session over the window.
    pub fn tiles(&self) -> TileIter<'_> {
        TileIter {
            grid: self,
            current: self.corner.clone(),
            remaining: self.window_tiles(),
        }
    }

    fn descriptor(&self, tile_index: &[usize]) -> Tile {
        let dim = self.ndim();
        let mut corner = Vec::with_capacity(dim);
        let mut size = Vec::with_capacity(dim);
        for axis in 0..dim {
            let c = tile_index[axis] * self.tile_size[axis];
            corner.push(c);
            size.push((self.image_size[axis] - c).min(self.tile_size[axis]));
        }
        // most significant axis last: axis 0 varies fastest in the flat index
        let mut index = 0;
        for axis in (0..dim).rev() {
            index = index * self.n_tiles[axis] + tile_index[axis];
        }
        Tile { corner, size, index }
    }
}

//────────────────────────────── ITERATION ───────────────────────────────

/// Odometer over the tile window.
///
/// Axis 0 advances fastest; an overflowing axis resets to the window corner
/// and carries into the next one. The iterator owns the cursor, so it must
/// not be shared between consumers, but any number of independent iterators
/// over the same grid are fine.
#[derive(Debug, Clone)]
pub struct TileIter<'a> {
    grid: &'a TileGrid,
    current: Vec<usize>,
    remaining: usize,
}

impl Iterator for TileIter<'_> {
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        if self.remaining == 0 {
            return None;
        }
        let tile = self.grid.descriptor(&self.current);
        self.remaining -= 1;
        for axis in 0..self.grid.ndim() {
            self.current[axis] += 1;
            if self.current[axis] < self.grid.corner[axis] + self.grid.count[axis] {
                break;
            }
            self.current[axis] = self.grid.corner[axis];
        }
        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for TileIter<'_> {}

//──────────────────────────────── TESTS ─────────────────────────────────
