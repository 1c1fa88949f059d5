//! In-memory item model of an encoded image.
//!
//! An [`EncodedImage`] holds what a container file would: timed frames of
//! color items, each item either a single image or a grid of cells, and at
//! most one gain map item whose metadata travels as an ISO 21496-1 payload.
//! Pixels are stored verbatim; there is no bitstream compression.

use gainmap_core::grid::{assemble_gain_map_grid, assemble_grid, validate_gain_map_grid, validate_grid};
use gainmap_core::{
    ColorGamut, ColorTransfer, ContentLightLevel, Error, GainMap, GridLayout, Image, PixelLayout,
    Result,
};

/// A color item: one image or a grid of equally shaped cells.
#[derive(Debug, Clone)]
pub struct ImageItem {
    /// Cells per row (1 for a single image).
    pub columns: u32,
    /// Rows of cells (1 for a single image).
    pub rows: u32,
    /// Cells in row-major order. Never carry their own gain map.
    pub cells: Vec<Image>,
}

impl ImageItem {
    /// Wrap a single image.
    pub fn single(image: Image) -> Self {
        Self {
            columns: 1,
            rows: 1,
            cells: vec![image],
        }
    }

    /// Returns true for items made of more than one cell.
    pub fn is_grid(&self) -> bool {
        self.cells.len() > 1
    }

    /// Validate the cells and return their shared layout.
    pub fn layout(&self) -> Result<GridLayout> {
        validate_grid(&self.cells, self.columns, self.rows)
    }

    /// Header of the assembled image, without pixels.
    pub fn header(&self) -> Result<Image> {
        let layout = self.layout()?;
        let first = &self.cells[0];
        let mut image = Image::header(
            layout.width(),
            layout.height(),
            layout.cell_depth,
            layout.cell_layout,
        )?;
        image.primaries = first.primaries;
        image.transfer = first.transfer;
        image.clli = first.clli;
        Ok(image)
    }

    /// Assemble the full image.
    pub fn assemble(&self) -> Result<Image> {
        if self.is_grid() {
            assemble_grid(&self.cells, self.columns, self.rows)
        } else {
            Ok(self.cells[0].clone())
        }
    }
}

/// Gain map cells before they are committed to an item.
#[derive(Debug, Clone)]
pub struct GainMapGrid {
    /// Cells per row.
    pub columns: u32,
    /// Rows of cells.
    pub rows: u32,
    /// Gain map cells in row-major order.
    pub cells: Vec<GainMap>,
}

impl GainMapGrid {
    /// Wrap a single gain map.
    pub fn single(gain_map: GainMap) -> Self {
        Self {
            columns: 1,
            rows: 1,
            cells: vec![gain_map],
        }
    }

    /// Validate the cells and return their shared layout and metadata.
    pub fn layout(&self) -> Result<GridLayout> {
        validate_gain_map_grid(&self.cells, self.columns, self.rows)
    }

    /// Assemble the full gain map.
    pub fn assemble(&self) -> Result<GainMap> {
        assemble_gain_map_grid(&self.cells, self.columns, self.rows)
    }
}

/// A stored gain map item.
#[derive(Debug, Clone)]
pub struct GainMapItem {
    /// Gain map pixels, single or grid.
    pub image: ImageItem,
    /// ISO 21496-1 metadata payload.
    pub tmap: Vec<u8>,
    /// Color primaries of the alternate rendition.
    pub alt_primaries: ColorGamut,
    /// Transfer function of the alternate rendition.
    pub alt_transfer: ColorTransfer,
    /// Content light level of the alternate rendition.
    pub alt_clli: ContentLightLevel,
    /// Bit depth of the alternate rendition.
    pub alt_depth: u8,
    /// Channel layout of the alternate rendition.
    pub alt_layout: PixelLayout,
}

/// One timed frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Color (and alpha) item.
    pub color: ImageItem,
    /// Duration in timescale units.
    pub duration: u64,
}

/// Everything an encoder produced.
#[derive(Debug, Clone, Default)]
pub struct EncodedImage {
    /// Frames in presentation order. A still image has one.
    pub frames: Vec<Frame>,
    /// Gain map of the first frame, if any.
    pub gain_map: Option<GainMapItem>,
}

impl EncodedImage {
    /// Returns true if more than one frame is stored.
    pub fn is_sequence(&self) -> bool {
        self.frames.len() > 1
    }

    pub(crate) fn first_frame(&self) -> Result<&Frame> {
        self.frames
            .first()
            .ok_or_else(|| Error::InvalidParameter("encoded image has no frames".into()))
    }
}
