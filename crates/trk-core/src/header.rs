//! TrackVis header parsing.
//!
//! The header is a fixed 1000-byte block. Its byte order is not flagged
//! explicitly; it is detected from `hdr_size`, which must read as 1000 in the
//! file's native order.

use std::io::{self, Read};

use serde::Serialize;

use crate::error::{Result, TrkError};
use crate::layout::{Endianness, RecordLayout};

/// Size of the fixed TrackVis header in bytes.
pub const HEADER_SIZE: usize = 1000;

/// Magic prefix of the `id_string` field.
pub const MAGIC: &[u8; 5] = b"TRACK";

/// Highest number of named scalar or property fields the header can describe.
pub const MAX_FIELDS: usize = 10;

const NAME_LEN: usize = 20;

/// Header field byte offsets.
mod offsets {
    pub const ID_STRING: usize = 0;
    pub const DIM: usize = 6;
    pub const VOXEL_SIZE: usize = 12;
    pub const ORIGIN: usize = 24;
    pub const N_SCALARS: usize = 36;
    pub const SCALAR_NAMES: usize = 38;
    pub const N_PROPERTIES: usize = 238;
    pub const PROPERTY_NAMES: usize = 240;
    pub const VOX_TO_RAS: usize = 440;
    pub const VOXEL_ORDER: usize = 948;
    pub const IMAGE_ORIENTATION_PATIENT: usize = 956;
    pub const INVERT_X: usize = 982;
    pub const SWAP_XY: usize = 985;
    pub const N_COUNT: usize = 988;
    pub const VERSION: usize = 992;
    pub const HDR_SIZE: usize = 996;
}

/// Parsed TrackVis header. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrkHeader {
    /// Volume dimensions in voxels.
    pub dim: [i16; 3],
    /// Voxel size in millimetres.
    pub voxel_size: [f32; 3],
    pub origin: [f32; 3],
    /// Scalars stored with every point.
    pub n_scalars: usize,
    pub scalar_names: Vec<String>,
    /// Properties stored once per streamline.
    pub n_properties: usize,
    pub property_names: Vec<String>,
    /// Voxel to RAS (patient/scanner) transform, row-major. All zero in version 1 files.
    pub vox_to_ras: [[f32; 4]; 4],
    pub voxel_order: String,
    pub image_orientation_patient: [f32; 6],
    /// `invert_x`, `invert_y`, `invert_z`.
    pub invert: [bool; 3],
    /// `swap_xy`, `swap_yz`, `swap_zx`.
    pub swap: [bool; 3],
    /// Declared streamline count. Zero means unknown.
    pub n_count: usize,
    pub version: i32,
    /// Byte offset where the record stream begins.
    pub hdr_size: u64,
    pub endianness: Endianness,
}

impl TrkHeader {
    /// Read exactly [`HEADER_SIZE`] bytes from `reader` and parse them.
    ///
    /// On success the reader is positioned at the start of the record stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                TrkError::malformed(format!("file is shorter than the {HEADER_SIZE}-byte header"))
            }
            _ => TrkError::Io(e),
        })?;
        Self::from_bytes(&buf)
    }

    /// Parse a header from the first [`HEADER_SIZE`] bytes of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(TrkError::malformed(format!(
                "need {HEADER_SIZE} header bytes, got {}",
                data.len()
            )));
        }
        let data = &data[..HEADER_SIZE];

        if &data[offsets::ID_STRING..offsets::ID_STRING + MAGIC.len()] != MAGIC {
            return Err(TrkError::malformed("magic is not TRACK"));
        }

        let size_bytes = &data[offsets::HDR_SIZE..offsets::HDR_SIZE + 4];
        let endianness = if Endianness::Little.read_i32(size_bytes) == HEADER_SIZE as i32 {
            Endianness::Little
        } else if Endianness::Big.read_i32(size_bytes) == HEADER_SIZE as i32 {
            Endianness::Big
        } else {
            return Err(TrkError::malformed(format!(
                "hdr_size is {}, expected {HEADER_SIZE}",
                Endianness::Little.read_i32(size_bytes)
            )));
        };

        let e = endianness;
        let i16_at = |off: usize| e.read_i16(&data[off..off + 2]);
        let i32_at = |off: usize| e.read_i32(&data[off..off + 4]);
        let f32_at = |off: usize| e.read_f32(&data[off..off + 4]);

        let version = i32_at(offsets::VERSION);
        if !(1..=2).contains(&version) {
            return Err(TrkError::malformed(format!(
                "unsupported version {version}, expected 1 or 2"
            )));
        }

        let n_scalars = field_count(i16_at(offsets::N_SCALARS), "n_scalars")?;
        let n_properties = field_count(i16_at(offsets::N_PROPERTIES), "n_properties")?;

        let n_count = i32_at(offsets::N_COUNT);
        let n_count = usize::try_from(n_count)
            .map_err(|_| TrkError::malformed(format!("negative n_count {n_count}")))?;

        let mut vox_to_ras = [[0.0f32; 4]; 4];
        for (r, row) in vox_to_ras.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = f32_at(offsets::VOX_TO_RAS + (r * 4 + c) * 4);
            }
        }

        let flag = |off: usize| data[off] != 0;

        Ok(TrkHeader {
            dim: [0, 1, 2].map(|i| i16_at(offsets::DIM + i * 2)),
            voxel_size: [0, 1, 2].map(|i| f32_at(offsets::VOXEL_SIZE + i * 4)),
            origin: [0, 1, 2].map(|i| f32_at(offsets::ORIGIN + i * 4)),
            n_scalars,
            scalar_names: names(&data[offsets::SCALAR_NAMES..], n_scalars),
            n_properties,
            property_names: names(&data[offsets::PROPERTY_NAMES..], n_properties),
            vox_to_ras,
            voxel_order: c_string(&data[offsets::VOXEL_ORDER..offsets::VOXEL_ORDER + 4]),
            image_orientation_patient: [0, 1, 2, 3, 4, 5]
                .map(|i| f32_at(offsets::IMAGE_ORIENTATION_PATIENT + i * 4)),
            invert: [0, 1, 2].map(|i| flag(offsets::INVERT_X + i)),
            swap: [0, 1, 2].map(|i| flag(offsets::SWAP_XY + i)),
            n_count,
            version,
            hdr_size: HEADER_SIZE as u64,
            endianness,
        })
    }

    /// Record geometry for the stream that follows this header.
    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.n_scalars, self.n_properties, self.endianness)
    }

    /// Declared streamline count, or `None` when the header leaves it unknown.
    pub fn declared_count(&self) -> Option<usize> {
        (self.n_count > 0).then_some(self.n_count)
    }

    /// Byte offset of the first record.
    pub fn stream_offset(&self) -> u64 {
        self.hdr_size
    }
}

fn field_count(raw: i16, field: &str) -> Result<usize> {
    match usize::try_from(raw) {
        Ok(n) if n <= MAX_FIELDS => Ok(n),
        _ => Err(TrkError::malformed(format!(
            "{field} is {raw}, expected 0..={MAX_FIELDS}"
        ))),
    }
}

fn names(block: &[u8], count: usize) -> Vec<String> {
    block
        .chunks_exact(NAME_LEN)
        .take(count)
        .map(c_string)
        .collect()
}

fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
