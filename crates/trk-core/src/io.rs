//! Positional reads and budgeted allocation.
//!
//! Positional reads never touch the shared file cursor, so any number of
//! threads can read disjoint records from one `&File`.

use std::fs::File;
use std::io;
use std::ops::Range;

use crate::error::{Result, TrkError};

/// Fill `buf` from `file` starting at absolute byte `offset`.
#[cfg(unix)]
pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

/// Fill `buf` from `file` starting at absolute byte `offset`.
#[cfg(windows)]
pub(crate) fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Allocate an empty vector with room for `len` elements, honouring `budget` (in bytes).
pub(crate) fn try_with_capacity<T>(len: usize, budget: Option<u64>) -> Result<Vec<T>> {
    let requested = (len as u64).saturating_mul(std::mem::size_of::<T>() as u64);
    if budget.is_some_and(|budget| requested > budget) {
        return Err(TrkError::InsufficientMemory { requested });
    }
    let mut vec = Vec::new();
    vec.try_reserve_exact(len)
        .map_err(|_| TrkError::InsufficientMemory { requested })?;
    Ok(vec)
}

/// Read the absolute byte range `range` of `file` into a fresh buffer.
pub(crate) fn read_range(file: &File, range: Range<u64>, budget: Option<u64>) -> Result<Vec<u8>> {
    let requested = range.end.saturating_sub(range.start);
    let len = usize::try_from(requested).map_err(|_| TrkError::InsufficientMemory { requested })?;
    let mut buf = try_with_capacity::<u8>(len, budget)?;
    buf.resize(len, 0);
    read_exact_at(file, &mut buf, range.start)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_at_offset_without_moving_cursor() {
        let mut tmp = tempfile::tempfile().unwrap();
        tmp.write_all(b"0123456789").unwrap();

        let buf = read_range(&tmp, 3..7, None).unwrap();
        assert_eq!(&buf, b"3456");

        let mut again = [0u8; 2];
        read_exact_at(&tmp, &mut again, 8).unwrap();
        assert_eq!(&again, b"89");
    }

    #[test]
    fn read_past_end_fails() {
        let mut tmp = tempfile::tempfile().unwrap();
        tmp.write_all(b"abc").unwrap();
        let result = read_range(&tmp, 1..10, None);
        assert!(matches!(result, Err(TrkError::Io(_))));
    }

    #[test]
    fn budget_is_enforced() {
        let result = try_with_capacity::<[f32; 3]>(100, Some(1199));
        assert!(matches!(
            result,
            Err(TrkError::InsufficientMemory { requested: 1200 })
        ));
        assert!(try_with_capacity::<[f32; 3]>(100, Some(1200)).is_ok());
    }
}
