//! Decoder session with per-capability flags.

use gainmap_core::gainmap::apply_gainmap;
use gainmap_core::metadata::iso21496::deserialize_iso21496;
use gainmap_core::{ContentLightLevel, Error, GainMap, Image, Result, Stop};
use tracing::{debug, trace};

use crate::container::{EncodedImage, GainMapItem};

/// What a [`Decoder`] should produce. Everything is off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Decode gain map pixels.
    pub enable_decoding_gain_map: bool,
    /// Parse the gain map metadata and alternate rendition description.
    pub enable_parsing_gain_map_metadata: bool,
    /// Skip color and alpha pixels; only the header is produced.
    pub ignore_color_and_alpha: bool,
}

/// Decoder session over an [`EncodedImage`].
///
/// [`parse`](Self::parse) reads headers and, if enabled, gain map metadata.
/// [`next_image`](Self::next_image) then produces each frame's pixels.
pub struct Decoder<'a> {
    source: &'a EncodedImage,
    options: DecoderOptions,
    image: Option<Image>,
    parsed: bool,
    gain_map_present: bool,
    next_frame: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder over `source`.
    pub fn new(source: &'a EncodedImage, options: DecoderOptions) -> Self {
        Self {
            source,
            options,
            image: None,
            parsed: false,
            gain_map_present: false,
            next_frame: 0,
        }
    }

    /// Options in effect.
    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Read headers and gain map metadata.
    ///
    /// After this, [`image`](Self::image) describes the first frame without
    /// pixels.
    pub fn parse(&mut self) -> Result<()> {
        let frame = self.source.first_frame()?;
        let mut image = frame.color.header()?;
        self.gain_map_present = self.source.gain_map.is_some();
        if let Some(item) = &self.source.gain_map {
            image.gain_map = Some(Box::new(self.gain_map_header(item)?));
        }
        debug!(
            frames = self.source.frames.len(),
            width = image.width,
            height = image.height,
            gain_map_present = self.gain_map_present,
            "parsed"
        );
        self.image = Some(image);
        self.parsed = true;
        self.next_frame = 0;
        Ok(())
    }

    fn gain_map_header(&self, item: &GainMapItem) -> Result<GainMap> {
        // Validated even when ignored, so a broken gain map grid surfaces.
        item.image.layout()?;
        let mut gain_map = GainMap::default();
        if self.options.enable_parsing_gain_map_metadata {
            gain_map.metadata = deserialize_iso21496(&item.tmap)?;
            gain_map.alt_primaries = item.alt_primaries;
            gain_map.alt_transfer = item.alt_transfer;
            gain_map.alt_clli = item.alt_clli;
            gain_map.alt_depth = item.alt_depth;
            gain_map.alt_layout = item.alt_layout;
            trace!(tmap_len = item.tmap.len(), "parsed gain map metadata");
        }
        Ok(gain_map)
    }

    /// Decode the next frame.
    ///
    /// Returns [`Error::NoContent`] when no pixels would be produced: color
    /// and alpha are ignored and there are no gain map pixels to decode for
    /// this frame. Also returns it when no frames remain. Neither case
    /// advances the session.
    pub fn next_image(&mut self) -> Result<()> {
        if self.options.ignore_color_and_alpha && !self.options.enable_decoding_gain_map {
            return Err(Error::NoContent(
                "color, alpha and gain map decoding are all disabled",
            ));
        }
        if !self.parsed {
            self.parse()?;
        }
        let frame = self
            .source
            .frames
            .get(self.next_frame)
            .ok_or(Error::NoContent("no images remaining"))?;
        let decode_gain_map = self.options.enable_decoding_gain_map
            && self.source.gain_map.is_some()
            && self.next_frame == 0;
        if self.options.ignore_color_and_alpha && !decode_gain_map {
            return Err(Error::NoContent("no gain map pixels to decode"));
        }

        let mut image = if self.options.ignore_color_and_alpha {
            frame.color.header()?
        } else {
            frame.color.assemble()?
        };
        if let Some(item) = &self.source.gain_map {
            let mut gain_map = self.gain_map_header(item)?;
            if decode_gain_map {
                gain_map.image = Some(item.image.assemble()?);
            }
            image.gain_map = Some(Box::new(gain_map));
        }
        trace!(frame = self.next_frame, "decoded image");
        self.next_frame += 1;
        self.image = Some(image);
        Ok(())
    }

    /// The current image: the header after [`parse`](Self::parse), the
    /// decoded frame after [`next_image`](Self::next_image).
    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// Take ownership of the current image.
    pub fn take_image(&mut self) -> Option<Image> {
        self.image.take()
    }

    /// Returns true if the source has a gain map, whatever the options.
    pub fn gain_map_present(&self) -> bool {
        self.gain_map_present
    }

    /// Number of frames in the source.
    pub fn image_count(&self) -> usize {
        self.source.frames.len()
    }

    /// Tone map the current image to `hdr_headroom` into `output`.
    ///
    /// Requires decoded color pixels, a decoded gain map and parsed metadata.
    pub fn tone_map(
        &self,
        hdr_headroom: f64,
        output: &mut Image,
        stop: impl Stop,
    ) -> Result<ContentLightLevel> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("no image decoded".into()))?;
        let gain_map = image
            .gain_map
            .as_deref()
            .ok_or_else(|| Error::InvalidParameter("image has no gain map".into()))?;
        apply_gainmap(image, gain_map, hdr_headroom, output, stop)
    }
}

/// Parse and decode the first frame in one call.
pub fn read(source: &EncodedImage, options: DecoderOptions) -> Result<Image> {
    let mut decoder = Decoder::new(source, options);
    decoder.parse()?;
    decoder.next_image()?;
    decoder
        .take_image()
        .ok_or_else(|| Error::Unknown("decoder produced no image".into()))
}
