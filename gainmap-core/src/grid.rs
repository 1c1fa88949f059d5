//! Grids of equally shaped cells.
//!
//! Large images, and their gain maps, may be stored as a row-major grid of
//! cells that must agree in size, depth and layout. Gain map cells must also
//! carry bit-identical metadata. A base image grid and its gain map grid are
//! validated independently and may differ in shape.

use alloc::format;
use alloc::vec::Vec;
use tracing::{debug, trace};

use crate::limits;
use crate::metadata::GainMapMetadata;
use crate::types::{Error, GainMap, Image, PixelLayout, Result};

/// Shape shared by every cell of a validated grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Cells per row.
    pub columns: u32,
    /// Rows of cells.
    pub rows: u32,
    /// Width of each cell in pixels.
    pub cell_width: u32,
    /// Height of each cell in pixels.
    pub cell_height: u32,
    /// Bits per sample of each cell.
    pub cell_depth: u8,
    /// Channel layout of each cell.
    pub cell_layout: PixelLayout,
    /// Metadata shared by all cells of a gain map grid.
    pub metadata: Option<GainMapMetadata>,
}

impl GridLayout {
    /// Width of the assembled image.
    pub fn width(&self) -> u32 {
        self.columns * self.cell_width
    }

    /// Height of the assembled image.
    pub fn height(&self) -> u32 {
        self.rows * self.cell_height
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }
}

fn grid_error(msg: impl Into<alloc::string::String>) -> Error {
    Error::InvalidImageGrid(msg.into())
}

fn check_counts(cells: usize, columns: u32, rows: u32) -> Result<()> {
    if columns == 0 || rows == 0 {
        return Err(grid_error(format!("{}x{} grid has no cells", columns, rows)));
    }
    if columns > limits::MAX_GRID_DIMENSION || rows > limits::MAX_GRID_DIMENSION {
        return Err(grid_error(format!(
            "{}x{} grid exceeds {} cells per side",
            columns,
            rows,
            limits::MAX_GRID_DIMENSION
        )));
    }
    if cells != columns as usize * rows as usize {
        return Err(grid_error(format!(
            "{} cells do not fill a {}x{} grid",
            cells, columns, rows
        )));
    }
    Ok(())
}

/// Validate a grid of image cells.
///
/// All cells must have pixels and identical width, height, depth and
/// layout, and the assembled size must stay within the image limits.
pub fn validate_grid(cells: &[Image], columns: u32, rows: u32) -> Result<GridLayout> {
    check_counts(cells.len(), columns, rows)?;
    let first = &cells[0];
    if cells.iter().any(|cell| !cell.has_pixels()) {
        return Err(grid_error("grid cell without pixels"));
    }
    if let Some(i) = cells.iter().position(|cell| !cell.same_shape(first)) {
        let cell = &cells[i];
        trace!(
            cell = i,
            width = cell.width,
            height = cell.height,
            depth = cell.depth,
            "grid cell shape differs from first cell"
        );
        return Err(grid_error("grid cells differ in size, depth or layout"));
    }

    let width = columns as u64 * first.width as u64;
    let height = rows as u64 * first.height as u64;
    if width > limits::MAX_IMAGE_DIMENSION as u64
        || height > limits::MAX_IMAGE_DIMENSION as u64
        || width * height > limits::MAX_TOTAL_PIXELS
    {
        return Err(grid_error(format!(
            "assembled size {}x{} exceeds limits",
            width, height
        )));
    }

    Ok(GridLayout {
        columns,
        rows,
        cell_width: first.width,
        cell_height: first.height,
        cell_depth: first.depth,
        cell_layout: first.layout,
        metadata: None,
    })
}

/// Validate a grid of gain map cells.
///
/// In addition to the image rules every cell must carry an image and the
/// exact same rational metadata.
pub fn validate_gain_map_grid(cells: &[GainMap], columns: u32, rows: u32) -> Result<GridLayout> {
    check_counts(cells.len(), columns, rows)?;
    let images = cells
        .iter()
        .map(|cell| cell.image.clone())
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| grid_error("gain map grid cell without an image"))?;
    let metadata = cells[0].metadata;
    if cells.iter().any(|cell| cell.metadata != metadata) {
        return Err(grid_error("gain map grid cells differ in metadata"));
    }
    let mut layout = validate_grid(&images, columns, rows)?;
    layout.metadata = Some(metadata);
    Ok(layout)
}

/// Stitch validated cells into one image, row-major, without blending.
///
/// Color description is taken from the first cell.
pub fn assemble_grid(cells: &[Image], columns: u32, rows: u32) -> Result<Image> {
    let layout = validate_grid(cells, columns, rows)?;
    debug!(
        columns,
        rows,
        cell_width = layout.cell_width,
        cell_height = layout.cell_height,
        "assembling grid"
    );
    let first = &cells[0];
    let mut out = Image::new(
        layout.width(),
        layout.height(),
        layout.cell_depth,
        layout.cell_layout,
    )?;
    out.primaries = first.primaries;
    out.transfer = first.transfer;
    out.clli = first.clli;

    let cell_row_len = first.row_len();
    for (i, cell) in cells.iter().enumerate() {
        let col = i as u32 % columns;
        let row = i as u32 / columns;
        let x_offset = col as usize * cell_row_len;
        for y in 0..layout.cell_height {
            let dst = out.row_mut(row * layout.cell_height + y);
            dst[x_offset..x_offset + cell_row_len].copy_from_slice(cell.row(y));
        }
    }
    Ok(out)
}

/// Stitch a gain map grid into one gain map.
///
/// The shared metadata and the alternate rendition description of the first
/// cell carry over.
pub fn assemble_gain_map_grid(cells: &[GainMap], columns: u32, rows: u32) -> Result<GainMap> {
    validate_gain_map_grid(cells, columns, rows)?;
    let images: Vec<Image> = cells.iter().filter_map(|cell| cell.image.clone()).collect();
    let image = assemble_grid(&images, columns, rows)?;
    let first = &cells[0];
    Ok(GainMap {
        image: Some(image),
        metadata: first.metadata,
        alt_primaries: first.alt_primaries,
        alt_transfer: first.alt_transfer,
        alt_clli: first.alt_clli,
        alt_depth: first.alt_depth,
        alt_layout: first.alt_layout,
    })
}
