//! Byte stream abstraction
// (c) 2025 Ross Younger

//! The wire protocol core depends on nothing more than a uniform read-N / write-N
//! surface over an arbitrary byte-oriented transport (a TCP socket, a Unix domain
//! socket, an in-memory buffer for testing...). This module defines that capability
//! ([`ByteStream`]) and two concrete adapters: [`MemoryStream`], used internally for
//! frame scratch buffers and throughout the test suite, and [`IoStream`], a minimal
//! blocking adapter over anything implementing [`std::io::Read`] + [`std::io::Write`].
//!
//! Selecting a concurrency model (blocking vs. event-driven) and a concrete socket type
//! is a concern for the layer embedding this crate; see the crate documentation.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// A oriented cursor over a byte-oriented transport.
///
/// `read` may return fewer than `n` bytes, but only when the stream has reached EOF;
/// callers that require exactly `n` bytes (as every combinator does) must treat a short
/// return as an error. `write` must emit all supplied bytes or fail.
///
/// Implementations are not required to be thread-safe: the [connection
/// engine](crate::connection) provides serialization per connection (see the crate's
/// concurrency notes).
pub trait ByteStream {
    /// Reads up to `n` bytes. Returns fewer than `n` bytes only at EOF.
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>>;

    /// Writes `bytes` in full, or fails.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        (**self).read(n)
    }
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }
}

/// An in-memory [`ByteStream`] backed by a single byte queue.
///
/// Used as the scratch buffer the frame codec writes a body into before it knows the
/// body's true length, as the wrapper around a just-read frame body during decode, and
/// throughout the test suite as a stand-in transport.
#[derive(Debug, Default)]
pub struct MemoryStream {
    buf: VecDeque<u8>,
}

impl MemoryStream {
    /// An empty stream, ready to be written to.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream pre-loaded with `bytes`, ready to be read from.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buf: bytes.into(),
        }
    }

    /// Number of bytes remaining to be read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Consumes the stream, returning everything written to (or left unread in) it.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.into()
    }
}

impl ByteStream for MemoryStream {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let n = n.min(self.buf.len());
        Ok(self.buf.drain(..n).collect())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buf.extend(bytes);
        Ok(())
    }
}

/// A minimal blocking [`ByteStream`] adapter over any [`Read`] + [`Write`] transport,
/// e.g. a `TcpStream` or `UnixStream`.
///
/// `read` loops over partial receives until `n` bytes are gathered or the peer closes,
/// per the transport contract; it is not itself part of the protocol engine.
#[derive(Debug)]
pub struct IoStream<T> {
    inner: T,
}

impl<T> IoStream<T> {
    /// Wraps `inner` as a [`ByteStream`].
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Unwraps the adapter, returning the underlying transport.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> ByteStream for IoStream<T> {
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut out = vec![0u8; n];
        let mut got = 0;
        while got < n {
            let read = self.inner.read(&mut out[got..])?;
            if read == 0 {
                // peer closed: EOF, return whatever we have so far
                out.truncate(got);
                return Ok(out);
            }
            got += read;
        }
        Ok(out)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_stream_round_trips() {
        let mut s = MemoryStream::new();
        s.write(&[1, 2, 3]).unwrap();
        s.write(&[4, 5]).unwrap();
        assert_eq!(s.remaining(), 5);
        assert_eq!(s.read(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(s.read(10).unwrap(), vec![4, 5]);
        assert_eq!(s.remaining(), 0);
    }

    #[test]
    fn memory_stream_short_read_at_eof() {
        let mut s = MemoryStream::from_bytes(vec![9, 9]);
        assert_eq!(s.read(5).unwrap(), vec![9, 9]);
        assert_eq!(s.read(5).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn io_stream_assembles_partial_reads() {
        struct Stuttering {
            data: VecDeque<u8>,
        }
        impl Read for Stuttering {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                // hand back at most one byte per call, to exercise the assembly loop
                match self.data.pop_front() {
                    Some(b) => {
                        buf[0] = b;
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
        }
        impl Write for Stuttering {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut io = IoStream::new(Stuttering {
            data: vec![1, 2, 3].into(),
        });
        assert_eq!(io.read(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(io.read(1).unwrap(), Vec::<u8>::new());
    }
}
