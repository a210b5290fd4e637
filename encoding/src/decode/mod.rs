//! This module contains all DICOM data element decoding logic.

use byteordered::Endianness;
use snafu::{Backtrace, Snafu};
use std::io::{self, Read};
use voldex_core::header::{DataElementHeader, SequenceItemHeader, Tag};

pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit;
pub mod primitive;

use self::explicit_be::ExplicitVRBigEndianDecoder;
use self::explicit_le::ExplicitVRLittleEndianDecoder;
use self::implicit::{ImplicitVRBigEndianDecoder, ImplicitVRLittleEndianDecoder};

/// Module-level error type:
/// for errors which may occur while decoding element headers.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read the header's tag field.
    #[snafu(display("Failed to read the header's tag field: {}", source))]
    ReadTag {
        /// backtrace at failure
        backtrace: Backtrace,
        /// the underlying I/O error
        source: io::Error,
    },
    /// Failed to read the header's value representation bytes.
    #[snafu(display("Failed to read the header's value representation: {}", source))]
    ReadVr {
        /// backtrace at failure
        backtrace: Backtrace,
        /// the underlying I/O error
        source: io::Error,
    },
    /// Failed to read the header's reserved bytes.
    #[snafu(display("Failed to read the header's reserved bytes: {}", source))]
    ReadReserved {
        /// backtrace at failure
        backtrace: Backtrace,
        /// the underlying I/O error
        source: io::Error,
    },
    /// Failed to read the header's value length field.
    #[snafu(display("Failed to read the header's element length field: {}", source))]
    ReadLength {
        /// backtrace at failure
        backtrace: Backtrace,
        /// the underlying I/O error
        source: io::Error,
    },
    /// Failed to read an item header.
    #[snafu(display("Failed to read the item header: {}", source))]
    ReadItemHeader {
        /// backtrace at failure
        backtrace: Backtrace,
        /// the underlying I/O error
        source: io::Error,
    },
    /// The item header tag or length is not admissible.
    #[snafu(display("Bad sequence item header: {}", source))]
    BadSequenceHeader {
        /// the header validation error
        source: voldex_core::header::SequenceItemHeaderError,
    },
}

/// Type alias for decoding results.
pub type Result<T> = std::result::Result<T, Error>;

/// Type trait for reading and decoding basic data values from a data
/// source, according to the decoder's expected byte order.
///
/// Unlike `Decode`, this trait is not object safe, but it does not have
/// to be: there are, and only will be, two possible implementations.
pub trait BasicDecode {
    /// Retrieve the source's endianness, as expected by this decoder.
    fn endianness(&self) -> Endianness;

    /// Decode an unsigned short value from the given source.
    fn decode_us<S>(&self, source: S) -> io::Result<u16>
    where
        S: Read;

    /// Decode an unsigned long value from the given source.
    fn decode_ul<S>(&self, source: S) -> io::Result<u32>
    where
        S: Read;

    /// Decode a signed short value from the given source.
    fn decode_ss<S>(&self, source: S) -> io::Result<i16>
    where
        S: Read;

    /// Decode a signed long value from the given source.
    fn decode_sl<S>(&self, source: S) -> io::Result<i32>
    where
        S: Read;

    /// Decode a single precision float value from the given source.
    fn decode_fl<S>(&self, source: S) -> io::Result<f32>
    where
        S: Read;

    /// Decode a double precision float value from the given source.
    fn decode_fd<S>(&self, source: S) -> io::Result<f64>
    where
        S: Read;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S>(&self, mut source: S) -> io::Result<Tag>
    where
        S: Read,
    {
        let g = self.decode_us(&mut source)?;
        let e = self.decode_us(source)?;
        Ok(Tag(g, e))
    }
}

/// Type trait for decoding DICOM data element headers from a data
/// source. The value bytes themselves are read separately by the caller.
pub trait Decode {
    /// Fetch and decode the next data element header from the given
    /// source, returning the header and the number of bytes read.
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read;

    /// Fetch and decode the next sequence item header from the given
    /// source. The header is always 8 bytes long.
    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read;
}

/// Obtain a data element decoder for reading the data elements of a
/// DICOM file's meta group. According to the standard, these are always
/// encoded in Explicit VR Little Endian.
pub fn file_header_decoder() -> ExplicitVRLittleEndianDecoder {
    ExplicitVRLittleEndianDecoder::default()
}

/// A data element header decoder with its encoding resolved at run time,
/// as dictated by the file's transfer syntax. Since only four
/// combinations are possible, this enum is used instead of trait
/// objects.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetDecoder {
    /// Implicit VR Little Endian
    ImplicitLE(ImplicitVRLittleEndianDecoder),
    /// Explicit VR Little Endian
    ExplicitLE(ExplicitVRLittleEndianDecoder),
    /// Explicit VR Big Endian
    ExplicitBE(ExplicitVRBigEndianDecoder),
    /// Implicit VR Big Endian (GE private)
    ImplicitBE(ImplicitVRBigEndianDecoder),
}

impl DatasetDecoder {
    /// Create a decoder for the given byte order and VR explicitness.
    pub fn new(endianness: Endianness, explicit_vr: bool) -> Self {
        match (endianness, explicit_vr) {
            (Endianness::Little, false) => {
                DatasetDecoder::ImplicitLE(ImplicitVRLittleEndianDecoder::default())
            }
            (Endianness::Little, true) => {
                DatasetDecoder::ExplicitLE(ExplicitVRLittleEndianDecoder::default())
            }
            (Endianness::Big, true) => {
                DatasetDecoder::ExplicitBE(ExplicitVRBigEndianDecoder::default())
            }
            (Endianness::Big, false) => {
                DatasetDecoder::ImplicitBE(ImplicitVRBigEndianDecoder::default())
            }
        }
    }

    /// Retrieve the byte order expected by this decoder.
    pub fn endianness(&self) -> Endianness {
        match self {
            DatasetDecoder::ImplicitLE(_) | DatasetDecoder::ExplicitLE(_) => Endianness::Little,
            DatasetDecoder::ExplicitBE(_) | DatasetDecoder::ImplicitBE(_) => Endianness::Big,
        }
    }

    /// Whether this decoder reads explicit value representations.
    pub fn explicit_vr(&self) -> bool {
        matches!(
            self,
            DatasetDecoder::ExplicitLE(_) | DatasetDecoder::ExplicitBE(_)
        )
    }
}

impl Default for DatasetDecoder {
    fn default() -> Self {
        DatasetDecoder::new(Endianness::Little, false)
    }
}

macro_rules! for_any {
    ($s: expr, |$e: ident| $f: expr) => {
        match $s {
            DatasetDecoder::ImplicitLE($e) => $f,
            DatasetDecoder::ExplicitLE($e) => $f,
            DatasetDecoder::ExplicitBE($e) => $f,
            DatasetDecoder::ImplicitBE($e) => $f,
        }
    };
}

impl Decode for DatasetDecoder {
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        for_any!(self, |e| e.decode_header(source))
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        for_any!(self, |e| e.decode_item_header(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_decoder_selection() {
        let dec = DatasetDecoder::new(Endianness::Little, false);
        assert_eq!(dec.endianness(), Endianness::Little);
        assert!(!dec.explicit_vr());

        let dec = DatasetDecoder::new(Endianness::Big, true);
        assert_eq!(dec.endianness(), Endianness::Big);
        assert!(dec.explicit_vr());
    }
}
