//! Stream transport (C1): reliable byte I/O over a connected stream.
//!
//! Three operations, generic over any `Read + Write` stream so the tests
//! can exercise them without a real socket:
//!
//! - [`write_all`] retries transient interruptions and reports a short
//!   write as an error rather than success.
//! - [`drain_read`] is used by a non-blocking reader: it reads whatever is
//!   immediately available, stopping cleanly on a transient would-block.
//! - [`block_read`] is used by a blocking reader to pull at most one
//!   buffer's worth of bytes.

use std::io::{self, Read, Write};

/// Writes the entire buffer, retrying on signal interruption and
/// transient would-block. Returns an error if the peer or transport
/// failed before all bytes were written — there is no short-write
/// success case.
pub fn write_all<W: Write>(stream: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "peer closed or transport failed mid-write",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                // A blocking-mode caller should never see this; a
                // non-blocking caller retries at its own pace.
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// The outcome of a single read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Number of bytes copied into the caller's buffer.
    pub n: usize,
    /// Whether the stream has reached end-of-file (peer closed cleanly).
    pub peer_closed: bool,
}

/// Reads as much as is immediately available into `buf` (up to `buf.len()`
/// bytes). A transient would-block is not an error: it stops the drain
/// cleanly with the bytes read so far. A zero-length read marks
/// `peer_closed`. A signal interrupt is retried.
pub fn drain_read<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    loop {
        match stream.read(buf) {
            Ok(0) => return Ok(ReadOutcome { n: 0, peer_closed: true }),
            Ok(n) => return Ok(ReadOutcome { n, peer_closed: false }),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Ok(ReadOutcome { n: 0, peer_closed: false });
            }
            Err(e) => return Err(e),
        }
    }
}

/// Reads at most `buf.len()` bytes from a blocking stream. Semantics
/// otherwise match [`drain_read`] (signal-interrupt retried, EOF marks
/// `peer_closed`); a blocking stream simply never reports would-block.
pub fn block_read<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    drain_read(stream, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A reader double that reports `WouldBlock` after its bytes are exhausted,
    /// letting us test the non-blocking drain contract without a real socket.
    struct OnceThenWouldBlock {
        data: Vec<u8>,
        served: bool,
    }

    impl Read for OnceThenWouldBlock {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"));
            }
            self.served = true;
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            Ok(n)
        }
    }

    #[test]
    fn write_all_writes_everything() {
        let mut out = Vec::new();
        write_all(&mut out, b"hello world").unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn drain_read_stops_cleanly_on_would_block() {
        let mut r = OnceThenWouldBlock { data: b"abc".to_vec(), served: false };
        let mut buf = [0u8; 16];
        let first = drain_read(&mut r, &mut buf).unwrap();
        assert_eq!(first.n, 3);
        assert!(!first.peer_closed);
        let second = drain_read(&mut r, &mut buf).unwrap();
        assert_eq!(second.n, 0);
        assert!(!second.peer_closed);
    }

    #[test]
    fn drain_read_detects_eof() {
        let mut r = Cursor::new(Vec::<u8>::new());
        let mut buf = [0u8; 16];
        let outcome = drain_read(&mut r, &mut buf).unwrap();
        assert_eq!(outcome.n, 0);
        assert!(outcome.peer_closed);
    }
}
