//! Adapters between byte chunks and `std::io`.
//!
//! - [`ChunkReader`] turns a sequence of chunks (typically the [`Items`]
//!   a bridge hands its consumer) into a `Read`, which is what a streamed
//!   request body is built from.
//! - [`BodyWriter`] turns an open session into a `Write`, so producers can
//!   use `io::copy` and friends.
//!
//! [`Items`]: webhdfs_bridge::Items

use std::io::{self, Read, Write};

use bytes::Bytes;
use webhdfs_bridge::Session;

/// Reads the concatenation of a sequence of chunks.
pub struct ChunkReader<I: Iterator> {
    chunks: I,
    current: Option<I::Item>,
    offset: usize,
    bytes_read: u64,
}

impl<I> ChunkReader<I>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    pub fn new(chunks: I) -> Self {
        Self {
            chunks,
            current: None,
            offset: 0,
            bytes_read: 0,
        }
    }

    /// Total bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<I> Read for ChunkReader<I>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if let Some(chunk) = &self.current {
                let remaining = &chunk.as_ref()[self.offset..];
                if !remaining.is_empty() {
                    let n = remaining.len().min(buf.len());
                    buf[..n].copy_from_slice(&remaining[..n]);
                    self.offset += n;
                    self.bytes_read += n as u64;
                    return Ok(n);
                }
            }

            // Current chunk is used up (or empty); move on.
            match self.chunks.next() {
                Some(chunk) => {
                    self.current = Some(chunk);
                    self.offset = 0;
                }
                None => {
                    self.current = None;
                    return Ok(0);
                }
            }
        }
    }
}

/// `Write` adapter over an open session: every `write` call becomes one chunk.
pub struct BodyWriter<'s, 'a> {
    session: &'s Session<'a, Bytes>,
}

impl<'s, 'a> BodyWriter<'s, 'a> {
    pub fn new(session: &'s Session<'a, Bytes>) -> Self {
        Self { session }
    }
}

impl Write for BodyWriter<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.session
            .write(Bytes::copy_from_slice(buf))
            .map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
