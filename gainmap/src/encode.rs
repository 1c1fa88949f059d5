//! Encoder session: collects frames and an optional gain map.

use gainmap_core::metadata::iso21496::serialize_iso21496;
use gainmap_core::{Error, GainMap, Image, PixelLayout, Result};
use tracing::{debug, trace};

use crate::container::{EncodedImage, Frame, GainMapGrid, GainMapItem, ImageItem};

/// Flags for [`Encoder::add_image`] and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddImageFlags(u8);

impl AddImageFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The image is a still image; nothing may be added after it.
    pub const SINGLE: Self = Self(1);

    /// Returns true if every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for AddImageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Encoder session.
///
/// Frames are added one at a time; a frame may carry a gain map only when it
/// is the sole frame. [`finish`](Self::finish) serializes the gain map
/// metadata and returns the stored items.
#[derive(Debug, Default)]
pub struct Encoder {
    frames: Vec<Frame>,
    gain_map: Option<GainMapGrid>,
    single: bool,
}

/// Strip the gain map from a color cell.
fn color_cell(image: &Image) -> Image {
    Image {
        gain_map: None,
        ..image.clone()
    }
}

impl Encoder {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one image, with the gain map it owns if any.
    pub fn add_image(&mut self, image: &Image, duration: u64, flags: AddImageFlags) -> Result<()> {
        if !image.has_pixels() {
            return Err(Error::InvalidParameter("image has no pixels".into()));
        }
        let gain_map = image
            .gain_map
            .as_deref()
            .map(|gm| GainMapGrid::single(gm.clone()));
        self.add_frame(ImageItem::single(color_cell(image)), gain_map, duration, flags)
    }

    /// Add a grid of cells as one still image.
    ///
    /// Either every cell owns a gain map, forming a gain map grid of the
    /// same shape, or none does.
    pub fn add_image_grid(
        &mut self,
        columns: u32,
        rows: u32,
        cells: &[Image],
        flags: AddImageFlags,
    ) -> Result<()> {
        let with_gain_map = cells.iter().filter(|cell| cell.gain_map.is_some()).count();
        let gain_map = if with_gain_map == 0 {
            None
        } else if with_gain_map == cells.len() {
            Some(GainMapGrid {
                columns,
                rows,
                cells: cells
                    .iter()
                    .filter_map(|cell| cell.gain_map.as_deref().cloned())
                    .collect(),
            })
        } else {
            return Err(Error::InvalidImageGrid(
                "only some grid cells have a gain map".into(),
            ));
        };
        let color = ImageItem {
            columns,
            rows,
            cells: cells.iter().map(color_cell).collect(),
        };
        self.add_frame(color, gain_map, 0, flags)
    }

    /// Add a grid of cells with a gain map laid out independently.
    ///
    /// The gain map grid may use a different number of columns and rows and
    /// a different cell size than the color grid.
    pub fn add_image_grid_with_gain_map(
        &mut self,
        columns: u32,
        rows: u32,
        cells: &[Image],
        gain_map: GainMapGrid,
        flags: AddImageFlags,
    ) -> Result<()> {
        let color = ImageItem {
            columns,
            rows,
            cells: cells.iter().map(color_cell).collect(),
        };
        self.add_frame(color, Some(gain_map), 0, flags)
    }

    fn add_frame(
        &mut self,
        color: ImageItem,
        gain_map: Option<GainMapGrid>,
        duration: u64,
        flags: AddImageFlags,
    ) -> Result<()> {
        if self.single {
            return Err(Error::InvalidParameter(
                "cannot add an image after a single image".into(),
            ));
        }
        if !self.frames.is_empty() {
            if self.gain_map.is_some() || gain_map.is_some() {
                return Err(Error::NotImplemented("image sequences with gain maps"));
            }
            if flags.contains(AddImageFlags::SINGLE) {
                return Err(Error::InvalidParameter(
                    "a single image must be the only image".into(),
                ));
            }
        }

        let layout = color.layout()?;
        if let Some(first) = self.frames.first() {
            let first = first.color.layout()?;
            if (first.width(), first.height()) != (layout.width(), layout.height()) {
                return Err(Error::InvalidParameter(format!(
                    "frame is {}x{} but the sequence is {}x{}",
                    layout.width(),
                    layout.height(),
                    first.width(),
                    first.height()
                )));
            }
        }
        if let Some(gm) = &gain_map {
            if gm.cells.iter().any(|cell| cell.image.is_none()) {
                return Err(Error::InvalidParameter("gain map has no image".into()));
            }
            let gm_layout = gm.layout()?;
            if gm_layout.cell_layout == PixelLayout::Rgba {
                return Err(Error::InvalidParameter(
                    "gain map image must be Gray or Rgb".into(),
                ));
            }
            trace!(
                columns = gm_layout.columns,
                rows = gm_layout.rows,
                width = gm_layout.width(),
                height = gm_layout.height(),
                "gain map item"
            );
        }

        debug!(
            frame = self.frames.len(),
            columns = layout.columns,
            rows = layout.rows,
            width = layout.width(),
            height = layout.height(),
            has_gain_map = gain_map.is_some(),
            "added image"
        );
        self.frames.push(Frame { color, duration });
        if gain_map.is_some() {
            self.gain_map = gain_map;
        }
        self.single = flags.contains(AddImageFlags::SINGLE);
        Ok(())
    }

    /// Serialize the gain map metadata and return the stored items.
    pub fn finish(self) -> Result<EncodedImage> {
        if self.frames.is_empty() {
            return Err(Error::InvalidParameter("no images were added".into()));
        }
        let gain_map = match self.gain_map {
            Some(grid) => Some(gain_map_item(grid)?),
            None => None,
        };
        debug!(
            frames = self.frames.len(),
            has_gain_map = gain_map.is_some(),
            "finished encoding"
        );
        Ok(EncodedImage {
            frames: self.frames,
            gain_map,
        })
    }
}

fn gain_map_item(grid: GainMapGrid) -> Result<GainMapItem> {
    let layout = grid.layout()?;
    let metadata = layout.metadata.unwrap_or_default();
    let tmap = serialize_iso21496(&metadata)?;
    let first: &GainMap = &grid.cells[0];
    Ok(GainMapItem {
        alt_primaries: first.alt_primaries,
        alt_transfer: first.alt_transfer,
        alt_clli: first.alt_clli,
        alt_depth: first.alt_depth,
        alt_layout: first.alt_layout,
        image: ImageItem {
            columns: grid.columns,
            rows: grid.rows,
            cells: grid.cells.into_iter().filter_map(|cell| cell.image).collect(),
        },
        tmap,
    })
}

/// Encode a single still image and the gain map it owns.
pub fn encode(image: &Image) -> Result<EncodedImage> {
    let mut encoder = Encoder::new();
    encoder.add_image(image, 1, AddImageFlags::SINGLE)?;
    encoder.finish()
}
