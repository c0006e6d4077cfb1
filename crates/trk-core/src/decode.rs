//! Streamline payload decoding.
//!
//! Decoding is a pure function of a byte slice and the record geometry, so
//! disjoint slices can be decoded on any number of threads.

use crate::error::{Result, TrkError};
use crate::layout::RecordLayout;

/// One decoded streamline. Owned by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Streamline {
    /// Coordinates in file order, as stored (no affine applied).
    pub points: Vec<[f32; 3]>,
    /// Per-point scalars, `scalar_count` values per point, point-major.
    pub scalars: Vec<f32>,
    pub scalar_count: usize,
    /// Per-streamline properties.
    pub properties: Vec<f32>,
}

impl Streamline {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Scalars attached to point `i`.
    pub fn point_scalars(&self, i: usize) -> Option<&[f32]> {
        if i >= self.points.len() {
            return None;
        }
        let start = i * self.scalar_count;
        Some(&self.scalars[start..start + self.scalar_count])
    }

    /// True when both streamlines hold the same float bit patterns.
    pub fn bit_eq(&self, other: &Streamline) -> bool {
        fn bits<'a>(v: impl IntoIterator<Item = &'a f32>) -> Vec<u32> {
            v.into_iter().map(|f| f.to_bits()).collect()
        }
        self.scalar_count == other.scalar_count
            && bits(self.points.iter().flatten()) == bits(other.points.iter().flatten())
            && bits(&self.scalars) == bits(&other.scalars)
            && bits(&self.properties) == bits(&other.properties)
    }
}

/// Decode the payload of a record holding `point_count` points.
///
/// `payload` starts right after the length prefix and may extend past the record.
pub fn decode_streamline(
    payload: &[u8],
    point_count: u32,
    layout: &RecordLayout,
) -> Result<Streamline> {
    check_payload(payload, point_count, layout)?;
    let n = point_count as usize;
    let mut streamline = Streamline {
        points: Vec::with_capacity(n),
        scalars: Vec::with_capacity(n * layout.scalar_count),
        scalar_count: layout.scalar_count,
        properties: Vec::with_capacity(layout.property_count),
    };
    decode_append(
        payload,
        point_count,
        layout,
        &mut streamline.points,
        &mut streamline.scalars,
        &mut streamline.properties,
    )?;
    Ok(streamline)
}

/// Payload bytes the record needs, or `DecodeOutOfRange` when `payload` is shorter.
///
/// Runs before any allocation sized by `point_count`.
fn check_payload(payload: &[u8], point_count: u32, layout: &RecordLayout) -> Result<usize> {
    let needed = usize::try_from(layout.payload_len(point_count)).unwrap_or(usize::MAX);
    if payload.len() < needed {
        return Err(TrkError::DecodeOutOfRange {
            needed,
            available: payload.len(),
        });
    }
    Ok(needed)
}

/// Decode a record payload, appending to flat output buffers.
pub fn decode_append(
    payload: &[u8],
    point_count: u32,
    layout: &RecordLayout,
    points: &mut Vec<[f32; 3]>,
    scalars: &mut Vec<f32>,
    properties: &mut Vec<f32>,
) -> Result<()> {
    let needed = check_payload(payload, point_count, layout)?;

    let point_bytes = layout.point_bytes() as usize;
    let point_region = point_count as usize * point_bytes;
    let endianness = layout.endianness;

    let mut row = vec![0.0f32; layout.floats_per_point()];
    for chunk in payload[..point_region].chunks_exact(point_bytes) {
        endianness.read_f32_into(chunk, &mut row);
        points.push([row[0], row[1], row[2]]);
        scalars.extend_from_slice(&row[3..]);
    }

    let start = properties.len();
    properties.resize(start + layout.property_count, 0.0);
    endianness.read_f32_into(&payload[point_region..needed], &mut properties[start..]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Endianness;

    fn encode(values: &[f32], endianness: Endianness) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| match endianness {
                Endianness::Little => v.to_le_bytes(),
                Endianness::Big => v.to_be_bytes(),
            })
            .collect()
    }

    #[test]
    fn points_only() {
        let layout = RecordLayout::new(0, 0, Endianness::Little);
        let payload = encode(&[1., 2., 3., 4., 5., 6., 7., 8., 9.], Endianness::Little);
        let s = decode_streamline(&payload, 3, &layout).unwrap();

        assert_eq!(s.points, vec![[1., 2., 3.], [4., 5., 6.], [7., 8., 9.]]);
        assert!(s.scalars.is_empty());
        assert!(s.properties.is_empty());
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn scalars_and_properties_are_split_out() {
        let layout = RecordLayout::new(2, 1, Endianness::Big);
        let payload = encode(
            &[1., 2., 3., 0.1, 0.2, 4., 5., 6., 0.3, 0.4, 42.],
            Endianness::Big,
        );
        let s = decode_streamline(&payload, 2, &layout).unwrap();

        assert_eq!(s.points, vec![[1., 2., 3.], [4., 5., 6.]]);
        assert_eq!(s.point_scalars(0), Some(&[0.1f32, 0.2][..]));
        assert_eq!(s.point_scalars(1), Some(&[0.3f32, 0.4][..]));
        assert_eq!(s.point_scalars(2), None);
        assert_eq!(s.properties, vec![42.]);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let layout = RecordLayout::new(0, 0, Endianness::Little);
        let payload = encode(&[1., 2., 3., 99., 99.], Endianness::Little);
        let s = decode_streamline(&payload, 1, &layout).unwrap();
        assert_eq!(s.points, vec![[1., 2., 3.]]);
    }

    #[test]
    fn short_slice_is_out_of_range() {
        let layout = RecordLayout::new(1, 1, Endianness::Little);
        let payload = encode(&[1., 2., 3., 4.], Endianness::Little);
        let result = decode_streamline(&payload, 1, &layout);
        assert!(matches!(
            result,
            Err(TrkError::DecodeOutOfRange {
                needed: 20,
                available: 16
            })
        ));
    }

    #[test]
    fn huge_point_count_is_out_of_range() {
        let layout = RecordLayout::new(10, 0, Endianness::Little);
        let result = decode_streamline(&[0u8; 8], u32::MAX, &layout);
        assert!(matches!(
            result,
            Err(TrkError::DecodeOutOfRange { available: 8, .. })
        ));

        let (mut points, mut scalars, mut props) = (Vec::new(), Vec::new(), Vec::new());
        let result = decode_append(&[0u8; 8], u32::MAX, &layout, &mut points, &mut scalars, &mut props);
        assert!(matches!(result, Err(TrkError::DecodeOutOfRange { .. })));
        assert!(points.is_empty());
    }

    #[test]
    fn append_accumulates() {
        let layout = RecordLayout::new(0, 1, Endianness::Little);
        let (mut points, mut scalars, mut props) = (Vec::new(), Vec::new(), Vec::new());
        let a = encode(&[1., 1., 1., 10.], Endianness::Little);
        let b = encode(&[2., 2., 2., 3., 3., 3., 20.], Endianness::Little);
        decode_append(&a, 1, &layout, &mut points, &mut scalars, &mut props).unwrap();
        decode_append(&b, 2, &layout, &mut points, &mut scalars, &mut props).unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(props, vec![10., 20.]);
        assert!(scalars.is_empty());
    }

    #[test]
    fn bit_eq_distinguishes_signed_zero() {
        let a = Streamline {
            points: vec![[0.0, 0.0, 0.0]],
            ..Default::default()
        };
        let b = Streamline {
            points: vec![[-0.0, 0.0, 0.0]],
            ..Default::default()
        };
        assert_eq!(a, b);
        assert!(!a.bit_eq(&b));
        assert!(a.bit_eq(&a.clone()));
    }
}
