//! Synthesizes TRK files for tests.
#![allow(dead_code)]

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use tempfile::NamedTempFile;

const HEADER_SIZE: usize = 1000;

enum Chunk {
    Record {
        points: Vec<[f32; 3]>,
        scalars: Vec<f32>,
        properties: Vec<f32>,
    },
    Raw(Vec<u8>),
}

/// Builder for TRK bytes: header fields plus a sequence of records.
pub struct TrkBuilder {
    scalar_count: usize,
    property_count: usize,
    big_endian: bool,
    declared: i32,
    scalar_names: Vec<String>,
    property_names: Vec<String>,
    chunks: Vec<Chunk>,
}

impl TrkBuilder {
    pub fn new(scalar_count: usize, property_count: usize) -> Self {
        Self {
            scalar_count,
            property_count,
            big_endian: false,
            declared: 0,
            scalar_names: Vec::new(),
            property_names: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    /// Value stored in `n_count`.
    pub fn declared(mut self, count: i32) -> Self {
        self.declared = count;
        self
    }

    pub fn scalar_names(mut self, names: &[&str]) -> Self {
        self.scalar_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn property_names(mut self, names: &[&str]) -> Self {
        self.property_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Append a well-formed record. `scalars` holds `scalar_count` values per point.
    pub fn streamline(mut self, points: &[[f32; 3]], scalars: &[f32], properties: &[f32]) -> Self {
        assert_eq!(scalars.len(), points.len() * self.scalar_count);
        assert_eq!(properties.len(), self.property_count);
        self.chunks.push(Chunk::Record {
            points: points.to_vec(),
            scalars: scalars.to_vec(),
            properties: properties.to_vec(),
        });
        self
    }

    /// Append raw bytes after the records written so far.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.chunks.push(Chunk::Raw(bytes.to_vec()));
        self
    }

    fn i16(&self, v: i16) -> [u8; 2] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn i32(&self, v: i32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn f32(&self, v: f32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn header(&self) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_SIZE];
        h[0..6].copy_from_slice(b"TRACK\0");
        for (i, d) in [10i16, 20, 30].into_iter().enumerate() {
            h[6 + i * 2..8 + i * 2].copy_from_slice(&self.i16(d));
        }
        for (i, v) in [1.0f32, 1.5, 2.0].into_iter().enumerate() {
            h[12 + i * 4..16 + i * 4].copy_from_slice(&self.f32(v));
        }
        h[36..38].copy_from_slice(&self.i16(self.scalar_count as i16));
        for (i, name) in self.scalar_names.iter().enumerate() {
            let at = 38 + i * 20;
            h[at..at + name.len()].copy_from_slice(name.as_bytes());
        }
        h[238..240].copy_from_slice(&self.i16(self.property_count as i16));
        for (i, name) in self.property_names.iter().enumerate() {
            let at = 240 + i * 20;
            h[at..at + name.len()].copy_from_slice(name.as_bytes());
        }
        for d in 0..4 {
            let at = 440 + (d * 4 + d) * 4;
            h[at..at + 4].copy_from_slice(&self.f32(1.0));
        }
        h[948..951].copy_from_slice(b"LAS");
        h[988..992].copy_from_slice(&self.i32(self.declared));
        h[992..996].copy_from_slice(&self.i32(2));
        h[996..1000].copy_from_slice(&self.i32(HEADER_SIZE as i32));
        h
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Record {
                    points,
                    scalars,
                    properties,
                } => {
                    out.extend_from_slice(&self.i32(points.len() as i32));
                    for (p, point) in points.iter().enumerate() {
                        for &v in point {
                            out.extend_from_slice(&self.f32(v));
                        }
                        let row = &scalars[p * self.scalar_count..(p + 1) * self.scalar_count];
                        for &v in row {
                            out.extend_from_slice(&self.f32(v));
                        }
                    }
                    for &v in properties {
                        out.extend_from_slice(&self.f32(v));
                    }
                }
                Chunk::Raw(bytes) => out.extend_from_slice(bytes),
            }
        }
        out
    }

    pub fn write_temp(&self) -> NamedTempFile {
        Self::write_bytes(&self.to_bytes())
    }

    pub fn write_bytes(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }
}

/// In-memory reader that returns at most `chunk` bytes per `read` and reports
/// its position after each one.
pub struct ChunkedReader<F> {
    inner: Cursor<Vec<u8>>,
    chunk: usize,
    on_read: F,
}

impl<F: FnMut(u64)> ChunkedReader<F> {
    pub fn new(bytes: Vec<u8>, chunk: usize, on_read: F) -> Self {
        Self {
            inner: Cursor::new(bytes),
            chunk,
            on_read,
        }
    }
}

impl<F: FnMut(u64)> Read for ChunkedReader<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(self.chunk);
        let n = self.inner.read(&mut buf[..len])?;
        (self.on_read)(self.inner.position());
        Ok(n)
    }
}

impl<F> Seek for ChunkedReader<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
