//! A positioned, byte-order–aware data source over a DICOM file.
//!
//! The source owns the single bit of byte-order state of the whole
//! reading process: every multi-byte read goes through it, and the
//! transfer-syntax handling (including the mid-stream safety net) flips
//! that state in place. All reads keep the current position up to date
//! so that the parser can enforce length consistency.

use byteordered::{ByteOrdered, Endianness};
use snafu::{Backtrace, ResultExt, Snafu};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// An error opening or repositioning a data source.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Could not open the file.
    #[snafu(display("Could not open file {}: {}", path, source))]
    OpenFile {
        /// the file path
        path: String,
        /// the underlying I/O error
        source: io::Error,
        /// backtrace at failure
        backtrace: Backtrace,
    },
    /// Could not determine the file length.
    #[snafu(display("Could not determine length of {}: {}", path, source))]
    FileLength {
        /// the file path
        path: String,
        /// the underlying I/O error
        source: io::Error,
        /// backtrace at failure
        backtrace: Backtrace,
    },
    /// Could not move the read cursor.
    #[snafu(display("Could not seek to position {}: {}", position, source))]
    SeekSource {
        /// the target position
        position: u64,
        /// the underlying I/O error
        source: io::Error,
        /// backtrace at failure
        backtrace: Backtrace,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// A buffered data source with position tracking and a mutable byte
/// order.
#[derive(Debug)]
pub struct FileSource<R> {
    inner: R,
    position: u64,
    len: u64,
    endianness: Endianness,
}

impl FileSource<BufReader<File>> {
    /// Open the file at the given path for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|_| OpenFileSnafu {
            path: path.display().to_string(),
        })?;
        let len = file
            .metadata()
            .with_context(|_| FileLengthSnafu {
                path: path.display().to_string(),
            })?
            .len();
        Ok(FileSource {
            inner: BufReader::new(file),
            position: 0,
            len,
            endianness: Endianness::Little,
        })
    }
}

impl<R> FileSource<R>
where
    R: Read + Seek,
{
    /// Create a source over an arbitrary reader, measuring its length.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner
            .seek(SeekFrom::End(0))
            .and_then(|len| inner.seek(SeekFrom::Start(0)).map(|_| len))
            .context(SeekSourceSnafu { position: 0u64 })?;
        Ok(FileSource {
            inner,
            position: 0,
            len,
            endianness: Endianness::Little,
        })
    }

    /// The current read position, in bytes from the start.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The total length of the source, in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source has no bytes at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of bytes between the current position and the end.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    /// The byte order currently in effect.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Replace the byte order in effect. All subsequent multi-byte
    /// reads observe the new value.
    #[inline]
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Flip the byte order in effect.
    #[inline]
    pub fn toggle_byte_order(&mut self) {
        self.endianness = match self.endianness {
            Endianness::Little => Endianness::Big,
            Endianness::Big => Endianness::Little,
        };
    }

    /// Move the cursor to an absolute position.
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        self.inner
            .seek(SeekFrom::Start(position))
            .context(SeekSourceSnafu { position })?;
        self.position = position;
        Ok(())
    }

    /// Move the cursor forward without interpreting the bytes.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.seek_to(self.position + count)
    }

    /// Move the cursor backwards by the given number of bytes,
    /// so that they are read again.
    pub fn rewind_by(&mut self, count: u64) -> Result<()> {
        let target = self.position.saturating_sub(count);
        self.seek_to(target)
    }

    /// Read an unsigned 16-bit value in the byte order in effect.
    pub fn read_u16(&mut self) -> io::Result<u16> {
        let endianness = self.endianness;
        ByteOrdered::runtime(self, endianness).read_u16()
    }

    /// Read a signed 16-bit value in the byte order in effect.
    pub fn read_i16(&mut self) -> io::Result<i16> {
        let endianness = self.endianness;
        ByteOrdered::runtime(self, endianness).read_i16()
    }

    /// Read an unsigned 32-bit value in the byte order in effect.
    pub fn read_u32(&mut self) -> io::Result<u32> {
        let endianness = self.endianness;
        ByteOrdered::runtime(self, endianness).read_u32()
    }

    /// Read a single precision float in the byte order in effect.
    pub fn read_f32(&mut self) -> io::Result<f32> {
        let endianness = self.endianness;
        ByteOrdered::runtime(self, endianness).read_f32()
    }
}

impl<R: Read> Read for FileSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}
