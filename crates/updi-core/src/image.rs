//! Image segments: the unit a HEX/ELF/binary reader hands the operation
//! driver.
//!
//! Per the stated non-goal, this crate does not parse Intel HEX itself.
//! [`ImageSegment`] and [`ImageSource`] are the seam an external reader
//! plugs into; [`RawBinaryImage`] is the one producer this crate ships,
//! sufficient for the common single-segment `.bin` case.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::error::{Error, Result};

/// One contiguous run of image bytes destined for a target address range.
///
/// `segment_id` encodes an upper-address base using the shift-4 convention
/// of Intel HEX extended segment address records: the absolute base of the
/// segment is `(segment_id << 4) + addr_from`. A segment produced directly
/// at an absolute address (no upper-address record involved) simply uses
/// `segment_id == 0`.
#[derive(Debug, Clone)]
#[cfg(feature = "alloc")]
pub struct ImageSegment {
    /// Upper-address base, shifted left by 4 to form part of the absolute
    /// address.
    pub segment_id: u32,
    /// First in-segment address covered by `bytes`.
    pub addr_from: u32,
    /// Last in-segment address covered by `bytes`, inclusive.
    pub addr_to: u32,
    /// Payload; `bytes.len() == addr_to - addr_from + 1`.
    pub bytes: Vec<u8>,
}

#[cfg(feature = "alloc")]
impl ImageSegment {
    /// Construct a segment, validating the length invariant.
    pub fn new(segment_id: u32, addr_from: u32, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let addr_to = addr_from + (bytes.len() as u32 - 1);
        let seg = ImageSegment {
            segment_id,
            addr_from,
            addr_to,
            bytes,
        };
        seg.validate()?;
        Ok(seg)
    }

    /// Validate the `addr_from <= addr_to` / length invariant.
    pub fn validate(&self) -> Result<()> {
        if self.addr_from > self.addr_to {
            return Err(Error::InvalidArgument);
        }
        let expected_len = (self.addr_to - self.addr_from) as usize + 1;
        if self.bytes.len() != expected_len {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// The absolute target address of the first byte in this segment.
    pub fn absolute_base(&self) -> u32 {
        (self.segment_id << 4) + self.addr_from
    }
}

/// Anything that can hand the operation driver a list of image segments.
///
/// An Intel HEX reader, an ELF section walker, or (as shipped here) a raw
/// binary file can all implement this without the core crate knowing
/// anything about their wire formats.
#[cfg(feature = "alloc")]
pub trait ImageSource {
    /// Produce the segments that make up this image.
    fn segments(&self) -> Result<Vec<ImageSegment>>;
}

/// A raw binary file treated as a single segment based at a fixed address.
///
/// This is the one `ImageSource` this crate ships: it covers the common
/// case of a `.bin` image written starting at a region's base address.
/// Multi-segment images (sparse HEX records, ELF sections with gaps) need
/// an external `ImageSource` producer.
#[derive(Debug, Clone)]
#[cfg(feature = "alloc")]
pub struct RawBinaryImage {
    base_address: u32,
    bytes: Vec<u8>,
}

#[cfg(feature = "alloc")]
impl RawBinaryImage {
    /// Wrap `bytes` as a single segment starting at `base_address`.
    pub fn new(base_address: u32, bytes: Vec<u8>) -> Self {
        RawBinaryImage { base_address, bytes }
    }
}

#[cfg(feature = "alloc")]
impl ImageSource for RawBinaryImage {
    fn segments(&self) -> Result<Vec<ImageSegment>> {
        if self.bytes.is_empty() {
            return Ok(Vec::new());
        }
        let segment = ImageSegment::new(0, self.base_address, self.bytes.clone())?;
        Ok(alloc::vec![segment])
    }
}

/// Merge segments sharing a `segment_id` by expanding their address range,
/// per the image data-model invariant: "overlapping segments with the same
/// id are merged by expanding the address range and writing the byte
/// payload at the segment's base offset." Segments with distinct ids pass
/// through untouched.
#[cfg(feature = "alloc")]
pub fn merge_segments(segments: Vec<ImageSegment>) -> Vec<ImageSegment> {
    let mut merged: Vec<ImageSegment> = Vec::new();
    'next: for seg in segments {
        for existing in merged.iter_mut() {
            if existing.segment_id != seg.segment_id {
                continue;
            }
            let new_from = existing.addr_from.min(seg.addr_from);
            let new_to = existing.addr_to.max(seg.addr_to);
            let mut bytes = alloc::vec![0xFFu8; (new_to - new_from) as usize + 1];
            let existing_offset = (existing.addr_from - new_from) as usize;
            bytes[existing_offset..existing_offset + existing.bytes.len()]
                .copy_from_slice(&existing.bytes);
            let seg_offset = (seg.addr_from - new_from) as usize;
            bytes[seg_offset..seg_offset + seg.bytes.len()].copy_from_slice(&seg.bytes);
            existing.addr_from = new_from;
            existing.addr_to = new_to;
            existing.bytes = bytes;
            continue 'next;
        }
        merged.push(seg);
    }
    merged
}

#[cfg(all(test, feature = "alloc", feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn raw_binary_image_is_one_segment_at_base() {
        let image = RawBinaryImage::new(0x8000, alloc::vec![0xAA, 0xBB, 0xCC]);
        let segments = image.segments().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].absolute_base(), 0x8000);
        assert_eq!(segments[0].bytes, alloc::vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn empty_raw_binary_image_has_no_segments() {
        let image = RawBinaryImage::new(0x8000, alloc::vec![]);
        assert!(image.segments().unwrap().is_empty());
    }

    #[test]
    fn mismatched_length_is_rejected() {
        let err = ImageSegment {
            segment_id: 0,
            addr_from: 0,
            addr_to: 10,
            bytes: alloc::vec![0u8; 3],
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument));
    }

    #[test]
    fn overlapping_segments_with_same_id_are_merged() {
        let a = ImageSegment::new(0, 0x100, alloc::vec![1, 2, 3, 4]).unwrap();
        let b = ImageSegment::new(0, 0x102, alloc::vec![9, 9, 9, 9]).unwrap();
        let merged = merge_segments(alloc::vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].addr_from, 0x100);
        assert_eq!(merged[0].addr_to, 0x105);
        assert_eq!(merged[0].bytes, alloc::vec![1, 2, 9, 9, 9, 9]);
    }

    #[test]
    fn distinct_segment_ids_are_not_merged() {
        let a = ImageSegment::new(0, 0x100, alloc::vec![1, 2]).unwrap();
        let b = ImageSegment::new(1, 0x100, alloc::vec![3, 4]).unwrap();
        let merged = merge_segments(alloc::vec![a, b]);
        assert_eq!(merged.len(), 2);
    }
}
