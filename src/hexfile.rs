//! Intel HEX file loading and saving.
//!
//! Per the protocol stack's own stated scope, `updi-core` does not parse
//! HEX itself — [`updi_core::image::ImageSource`] is the seam an external
//! reader plugs into, and this is that reader, built on the `ihex` crate
//! rather than a hand-rolled parser. Raw `.bin` files go through
//! [`updi_core::image::RawBinaryImage`] instead, selected by file
//! extension in [`load`].
//!
//! Bytes not covered by a HEX record but inside a written range are filled
//! with `0xFF` by [`updi_core::image::merge_segments`], matching how an
//! erased flash page reads back.

use std::fs;
use std::path::Path;

use ihex::Record;
use updi_core::image::{merge_segments, ImageSegment, ImageSource, RawBinaryImage};

/// An Intel HEX file, read in full and ready to be turned into segments.
pub struct IntelHexImage {
    records: Vec<Record>,
}

impl IntelHexImage {
    /// Parse `path` as an Intel HEX file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let records = ihex::Reader::new(&contents)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("malformed Intel HEX file {}: {e}", path.display()))?;
        Ok(IntelHexImage { records })
    }
}

impl ImageSource for IntelHexImage {
    fn segments(&self) -> updi_core::error::Result<Vec<ImageSegment>> {
        let mut upper_base = 0u32;
        let mut raw = Vec::new();
        for record in &self.records {
            match record {
                Record::Data { offset, value } => {
                    let addr = upper_base + *offset as u32;
                    raw.push(ImageSegment::new(0, addr, value.clone())?);
                }
                Record::ExtendedSegmentAddress(base) => upper_base = (*base as u32) << 4,
                Record::ExtendedLinearAddress(base) => upper_base = (*base as u32) << 16,
                Record::EndOfFile => break,
                Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
            }
        }
        Ok(merge_segments(raw))
    }
}

/// Load an image file, dispatching on extension: `.hex`/`.ihex` as Intel
/// HEX, anything else as a raw binary based at `base_address`.
pub fn load_image(path: &Path, base_address: u32) -> Result<Vec<ImageSegment>, String> {
    let is_hex = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("hex") || ext.eq_ignore_ascii_case("ihex"));

    if is_hex {
        IntelHexImage::load(path)?
            .segments()
            .map_err(|e| format!("failed to build image segments: {e}"))
    } else {
        let bytes = fs::read(path).map_err(|e| e.to_string())?;
        RawBinaryImage::new(base_address, bytes)
            .segments()
            .map_err(|e| format!("failed to build image segments: {e}"))
    }
}

/// Write `segments` out as an Intel HEX file, splitting each into 32-byte
/// data records and inserting `ExtendedLinearAddress` records whenever a
/// segment crosses a 64KiB boundary.
pub fn save_image(path: &Path, segments: &[ImageSegment]) -> Result<(), String> {
    const RECORD_LEN: usize = 32;

    let mut records = Vec::new();
    let mut current_upper: Option<u16> = None;

    for segment in segments {
        let base = segment.absolute_base();
        for (i, chunk) in segment.bytes.chunks(RECORD_LEN).enumerate() {
            let addr = base + (i * RECORD_LEN) as u32;
            let upper = (addr >> 16) as u16;
            if current_upper != Some(upper) {
                records.push(Record::ExtendedLinearAddress(upper));
                current_upper = Some(upper);
            }
            records.push(Record::Data {
                offset: (addr & 0xFFFF) as u16,
                value: chunk.to_vec(),
            });
        }
    }
    records.push(Record::EndOfFile);

    let text = ihex::create_object_file_representation(&records)
        .map_err(|e| format!("failed to encode Intel HEX: {e}"))?;
    fs::write(path, text).map_err(|e| e.to_string())
}
