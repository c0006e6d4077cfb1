//! Record geometry and byte order.
//!
//! Every record in the stream is `[i32 L][L x (3 + scalars) x f32][properties x f32]`,
//! so record sizes follow from the point count and the two field widths in the
//! header. All arithmetic is done in `u64` to stay exact on multi-gigabyte files.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;

/// Size of one stored float or integer.
pub const WORD: u64 = 4;

/// Size of the point-count prefix in front of every record.
pub const PREFIX_LEN: u64 = WORD;

/// Byte order of a TRK file, fixed by its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn read_i16(self, buf: &[u8]) -> i16 {
        match self {
            Endianness::Little => LittleEndian::read_i16(buf),
            Endianness::Big => BigEndian::read_i16(buf),
        }
    }

    pub fn read_i32(self, buf: &[u8]) -> i32 {
        match self {
            Endianness::Little => LittleEndian::read_i32(buf),
            Endianness::Big => BigEndian::read_i32(buf),
        }
    }

    pub fn read_f32(self, buf: &[u8]) -> f32 {
        match self {
            Endianness::Little => LittleEndian::read_f32(buf),
            Endianness::Big => BigEndian::read_f32(buf),
        }
    }

    /// Decode `dst.len()` floats from `src`. `src` must hold exactly `4 * dst.len()` bytes.
    pub fn read_f32_into(self, src: &[u8], dst: &mut [f32]) {
        match self {
            Endianness::Little => LittleEndian::read_f32_into(src, dst),
            Endianness::Big => BigEndian::read_f32_into(src, dst),
        }
    }
}

/// Per-file record geometry derived from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Extra floats stored after the coordinates of every point.
    pub scalar_count: usize,
    /// Floats stored once per streamline after its points.
    pub property_count: usize,
    /// Byte order of every field in the record stream.
    pub endianness: Endianness,
}

impl RecordLayout {
    pub fn new(scalar_count: usize, property_count: usize, endianness: Endianness) -> Self {
        Self {
            scalar_count,
            property_count,
            endianness,
        }
    }

    /// Floats per stored point (coordinates plus scalars).
    pub fn floats_per_point(&self) -> usize {
        3 + self.scalar_count
    }

    /// Bytes per stored point.
    pub fn point_bytes(&self) -> u64 {
        self.floats_per_point() as u64 * WORD
    }

    /// Bytes of the trailing property block.
    pub fn property_bytes(&self) -> u64 {
        self.property_count as u64 * WORD
    }

    /// Payload bytes (everything after the prefix) of a record with `point_count` points.
    pub fn payload_len(&self, point_count: u32) -> u64 {
        u64::from(point_count) * self.point_bytes() + self.property_bytes()
    }

    /// Total record bytes including the prefix.
    pub fn record_len(&self, point_count: u32) -> u64 {
        PREFIX_LEN + self.payload_len(point_count)
    }
}
