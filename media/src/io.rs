//! Byte copying between media streams.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{MediaError, MediaResult};

/// Size of one copy chunk; cancellation is checked between chunks.
pub const COPY_CHUNK: usize = 64 * 1024;

/// Copies exactly `len` bytes from `r` to `w`.
///
/// Fails with [`MediaError::InputTooShort`] if `r` ends early and with
/// [`MediaError::Cancelled`] if `cancel` is raised at a chunk boundary.
pub fn copy_exact(
    r: &mut dyn Read,
    w: &mut dyn Write,
    len: u64,
    cancel: Option<&AtomicBool>,
) -> MediaResult<()> {
    let mut buf = vec![0u8; (len.min(COPY_CHUNK as u64) as usize).max(1)];
    let mut copied = 0u64;

    while copied < len {
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Err(MediaError::Cancelled);
        }
        let want = (len - copied).min(buf.len() as u64) as usize;
        match r.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(MediaError::InputTooShort {
                    expected: len,
                    actual: copied,
                });
            }
            Ok(n) => {
                w.write_all(&buf[..n])?;
                copied += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.step).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_copy_exact() {
        let data: Vec<u8> = (0..200_000u32).map(|i| i as u8).collect();
        let mut out = Vec::new();
        copy_exact(&mut Cursor::new(&data), &mut out, 150_000, None).unwrap();
        assert_eq!(out, data[..150_000]);
    }

    #[test]
    fn test_copy_exact_short_reads() {
        let mut r = Trickle {
            data: vec![3u8; 1000],
            pos: 0,
            step: 7,
        };
        let mut out = Vec::new();
        copy_exact(&mut r, &mut out, 1000, None).unwrap();
        assert_eq!(out.len(), 1000);
    }

    #[test]
    fn test_copy_exact_input_too_short() {
        let mut out = Vec::new();
        let err = copy_exact(&mut Cursor::new(vec![0u8; 10]), &mut out, 11, None).unwrap_err();
        assert!(matches!(
            err,
            MediaError::InputTooShort {
                expected: 11,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_copy_exact_zero() {
        let mut out = Vec::new();
        copy_exact(&mut io::empty(), &mut out, 0, None).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_copy_exact_cancelled() {
        let cancel = AtomicBool::new(true);
        let mut out = Vec::new();
        let err = copy_exact(&mut io::repeat(0), &mut out, 10, Some(&cancel)).unwrap_err();
        assert!(matches!(err, MediaError::Cancelled));
        assert!(out.is_empty());
    }
}
