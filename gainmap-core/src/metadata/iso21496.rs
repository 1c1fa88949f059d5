//! ISO 21496-1 binary metadata format for gain maps (`tmap` payload).
//!
//! All fields are big-endian. Fractions are written verbatim so the metadata
//! survives a write/read cycle bit-for-bit.

use alloc::format;
use alloc::vec::Vec;

use super::{Fraction, GainMapMetadata, UnsignedFraction};
use crate::types::{Error, Result};

/// ISO 21496-1 metadata version.
pub const ISO_VERSION: u8 = 0;

/// Flags byte layout:
/// - Bit 0: Multi-channel gain map (0 = single channel)
/// - Bit 1: Use base color space
/// - Bit 2: Backward direction (base is the HDR rendition)
/// - Bit 3: Every fraction shares one denominator
/// - Bits 4-7: Reserved
const FLAG_MULTI_CHANNEL: u8 = 0x01;
const FLAG_USE_BASE_CG: u8 = 0x02;
const FLAG_BACKWARD_DIR: u8 = 0x04;
const FLAG_COMMON_DENOMINATOR: u8 = 0x08;

/// Serialize gain map metadata to ISO 21496-1 binary format.
///
/// Fails if the metadata has zero denominators.
pub fn serialize_iso21496(metadata: &GainMapMetadata) -> Result<Vec<u8>> {
    metadata.validate()?;

    let mut data = Vec::with_capacity(128);

    // Version, minimum_version, writer_version
    data.push(ISO_VERSION);
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());

    let channels = if metadata.is_single_channel() { 1 } else { 3 };
    let common = common_denominator(metadata, channels);

    let mut flags = 0u8;
    if channels == 3 {
        flags |= FLAG_MULTI_CHANNEL;
    }
    if metadata.use_base_color_space {
        flags |= FLAG_USE_BASE_CG;
    }
    if metadata.backward_direction {
        flags |= FLAG_BACKWARD_DIR;
    }
    if common.is_some() {
        flags |= FLAG_COMMON_DENOMINATOR;
    }
    data.push(flags);

    if let Some(denominator) = common {
        data.extend_from_slice(&denominator.to_be_bytes());
        data.extend_from_slice(&metadata.base_hdr_headroom.numerator.to_be_bytes());
        data.extend_from_slice(&metadata.alternate_hdr_headroom.numerator.to_be_bytes());
        for c in 0..channels {
            data.extend_from_slice(&metadata.gain_map_min[c].numerator.to_be_bytes());
            data.extend_from_slice(&metadata.gain_map_max[c].numerator.to_be_bytes());
            data.extend_from_slice(&metadata.gain_map_gamma[c].numerator.to_be_bytes());
            data.extend_from_slice(&metadata.base_offset[c].numerator.to_be_bytes());
            data.extend_from_slice(&metadata.alternate_offset[c].numerator.to_be_bytes());
        }
    } else {
        write_unsigned_fraction(&mut data, metadata.base_hdr_headroom);
        write_unsigned_fraction(&mut data, metadata.alternate_hdr_headroom);
        for c in 0..channels {
            write_fraction(&mut data, metadata.gain_map_min[c]);
            write_fraction(&mut data, metadata.gain_map_max[c]);
            write_unsigned_fraction(&mut data, metadata.gain_map_gamma[c]);
            write_fraction(&mut data, metadata.base_offset[c]);
            write_fraction(&mut data, metadata.alternate_offset[c]);
        }
    }

    Ok(data)
}

/// Deserialize ISO 21496-1 binary metadata.
pub fn deserialize_iso21496(data: &[u8]) -> Result<GainMapMetadata> {
    let mut reader = Reader { data, pos: 0 };

    let _version = reader.u8()?;
    let minimum_version = reader.u16()?;
    if minimum_version > ISO_VERSION as u16 {
        return Err(Error::InvalidMetadata(format!(
            "unsupported ISO 21496-1 minimum version: {}",
            minimum_version
        )));
    }
    let _writer_version = reader.u16()?;

    let flags = reader.u8()?;
    let channels = if flags & FLAG_MULTI_CHANNEL != 0 { 3 } else { 1 };

    let mut metadata = GainMapMetadata {
        use_base_color_space: flags & FLAG_USE_BASE_CG != 0,
        backward_direction: flags & FLAG_BACKWARD_DIR != 0,
        ..Default::default()
    };

    if flags & FLAG_COMMON_DENOMINATOR != 0 {
        let d = reader.u32()?;
        metadata.base_hdr_headroom = UnsignedFraction::new(reader.u32()?, d);
        metadata.alternate_hdr_headroom = UnsignedFraction::new(reader.u32()?, d);
        for c in 0..channels {
            metadata.gain_map_min[c] = Fraction::new(reader.i32()?, d);
            metadata.gain_map_max[c] = Fraction::new(reader.i32()?, d);
            metadata.gain_map_gamma[c] = UnsignedFraction::new(reader.u32()?, d);
            metadata.base_offset[c] = Fraction::new(reader.i32()?, d);
            metadata.alternate_offset[c] = Fraction::new(reader.i32()?, d);
        }
    } else {
        metadata.base_hdr_headroom = reader.unsigned_fraction()?;
        metadata.alternate_hdr_headroom = reader.unsigned_fraction()?;
        for c in 0..channels {
            metadata.gain_map_min[c] = reader.fraction()?;
            metadata.gain_map_max[c] = reader.fraction()?;
            metadata.gain_map_gamma[c] = reader.unsigned_fraction()?;
            metadata.base_offset[c] = reader.fraction()?;
            metadata.alternate_offset[c] = reader.fraction()?;
        }
    }

    if channels == 1 {
        for c in 1..3 {
            metadata.gain_map_min[c] = metadata.gain_map_min[0];
            metadata.gain_map_max[c] = metadata.gain_map_max[0];
            metadata.gain_map_gamma[c] = metadata.gain_map_gamma[0];
            metadata.base_offset[c] = metadata.base_offset[0];
            metadata.alternate_offset[c] = metadata.alternate_offset[0];
        }
    }

    metadata
        .validate()
        .map_err(|e| Error::InvalidMetadata(format!("{}", e)))?;

    Ok(metadata)
}

/// The shared denominator, if every written fraction has the same one.
fn common_denominator(metadata: &GainMapMetadata, channels: usize) -> Option<u32> {
    let d = metadata.base_hdr_headroom.denominator;
    let mut all = [metadata.alternate_hdr_headroom.denominator].into_iter().chain(
        (0..channels).flat_map(|c| {
            [
                metadata.gain_map_min[c].denominator,
                metadata.gain_map_max[c].denominator,
                metadata.gain_map_gamma[c].denominator,
                metadata.base_offset[c].denominator,
                metadata.alternate_offset[c].denominator,
            ]
        }),
    );
    all.all(|x| x == d).then_some(d)
}

/// Write a fraction to the buffer (8 bytes: 4 for numerator, 4 for denominator).
fn write_fraction(buf: &mut Vec<u8>, frac: Fraction) {
    buf.extend_from_slice(&frac.numerator.to_be_bytes());
    buf.extend_from_slice(&frac.denominator.to_be_bytes());
}

fn write_unsigned_fraction(buf: &mut Vec<u8>, frac: UnsignedFraction) {
    buf.extend_from_slice(&frac.numerator.to_be_bytes());
    buf.extend_from_slice(&frac.denominator.to_be_bytes());
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or_else(|| Error::InvalidMetadata("unexpected end of ISO data".into()))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    fn fraction(&mut self) -> Result<Fraction> {
        Ok(Fraction::new(self.i32()?, self.u32()?))
    }

    fn unsigned_fraction(&mut self) -> Result<UnsignedFraction> {
        Ok(UnsignedFraction::new(self.u32()?, self.u32()?))
    }
}
