//! Decoding of primitive values from raw element value bytes.
//!
//! These are stateless free functions: the caller supplies the value
//! bytes and the byte order in effect when they were read. Binary
//! values (US, SS, UL, FL) are reassembled according to that byte
//! order; numeric text values (IS, DS) are parsed from their ASCII
//! form, where multiple values are separated by backslashes and may be
//! padded with whitespace or NUL bytes.

use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use smallvec::SmallVec;
use snafu::{ensure, ResultExt, Snafu};

/// An error decoding a primitive value from its raw bytes.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The value is too short for the requested scalar.
    #[snafu(display("Value has {} bytes, expected at least {}", got, expected))]
    ScalarLength {
        /// number of bytes required
        expected: usize,
        /// number of bytes present
        got: usize,
    },
    /// The value text does not parse as an integer.
    #[snafu(display("Invalid integer text {:?}: {}", text, source))]
    MalformedInteger {
        /// the offending text
        text: String,
        /// the parse failure
        source: std::num::ParseIntError,
    },
    /// The value text does not parse as a decimal number.
    #[snafu(display("Invalid decimal text {:?}: {}", text, source))]
    MalformedDecimal {
        /// the offending text
        text: String,
        /// the parse failure
        source: std::num::ParseFloatError,
    },
    /// The value does not hold the expected number of decimal values.
    #[snafu(display("Expected {} decimal values, found {}", expected, got))]
    DecimalCount {
        /// number of values required
        expected: usize,
        /// number of values present
        got: usize,
    },
}

/// Type alias for value decoding results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A short vector of decoded decimal values.
///
/// Six elements cover the largest tuple this project reads
/// (Image Orientation Patient) without spilling to the heap.
pub type DecimalTuple = SmallVec<[f32; 6]>;

/// Decode an unsigned 16-bit value from the first two value bytes.
pub fn read_us(bytes: &[u8], endianness: Endianness) -> Result<u16> {
    ensure!(bytes.len() >= 2, ScalarLengthSnafu { expected: 2usize, got: bytes.len() });
    Ok(match endianness {
        Endianness::Little => LittleEndian::read_u16(bytes),
        Endianness::Big => BigEndian::read_u16(bytes),
    })
}

/// Decode a signed 16-bit value from the first two value bytes.
pub fn read_ss(bytes: &[u8], endianness: Endianness) -> Result<i16> {
    ensure!(bytes.len() >= 2, ScalarLengthSnafu { expected: 2usize, got: bytes.len() });
    Ok(match endianness {
        Endianness::Little => LittleEndian::read_i16(bytes),
        Endianness::Big => BigEndian::read_i16(bytes),
    })
}

/// Decode an unsigned 32-bit value from the first four value bytes.
pub fn read_ul(bytes: &[u8], endianness: Endianness) -> Result<u32> {
    ensure!(bytes.len() >= 4, ScalarLengthSnafu { expected: 4usize, got: bytes.len() });
    Ok(match endianness {
        Endianness::Little => LittleEndian::read_u32(bytes),
        Endianness::Big => BigEndian::read_u32(bytes),
    })
}

/// Decode a single precision float from the first four value bytes.
pub fn read_fl(bytes: &[u8], endianness: Endianness) -> Result<f32> {
    ensure!(bytes.len() >= 4, ScalarLengthSnafu { expected: 4usize, got: bytes.len() });
    Ok(match endianness {
        Endianness::Little => LittleEndian::read_f32(bytes),
        Endianness::Big => BigEndian::read_f32(bytes),
    })
}

/// Decode a full slice of unsigned 16-bit samples.
/// A trailing odd byte, if any, is ignored.
pub fn read_us_all(bytes: &[u8], endianness: Endianness) -> Vec<u16> {
    let n = bytes.len() / 2;
    let mut out = vec![0u16; n];
    match endianness {
        Endianness::Little => LittleEndian::read_u16_into(&bytes[..n * 2], &mut out),
        Endianness::Big => BigEndian::read_u16_into(&bytes[..n * 2], &mut out),
    }
    out
}

/// Decode a full slice of signed 16-bit samples.
/// A trailing odd byte, if any, is ignored.
pub fn read_ss_all(bytes: &[u8], endianness: Endianness) -> Vec<i16> {
    let n = bytes.len() / 2;
    let mut out = vec![0i16; n];
    match endianness {
        Endianness::Little => LittleEndian::read_i16_into(&bytes[..n * 2], &mut out),
        Endianness::Big => BigEndian::read_i16_into(&bytes[..n * 2], &mut out),
    }
    out
}

/// Interpret value bytes as text, trimming padding (trailing NUL bytes
/// and surrounding whitespace). Non-ASCII bytes are replaced.
pub fn read_str(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map(|p| p + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&bytes[..end]).trim_start().to_string()
}

/// Parse an Integer String (IS) value.
pub fn parse_is(bytes: &[u8]) -> Result<i32> {
    let text = read_str(bytes);
    text.trim()
        .parse()
        .with_context(|_| MalformedIntegerSnafu { text: text.clone() })
}

/// Parse a single Decimal String (DS) value.
pub fn parse_ds(bytes: &[u8]) -> Result<f32> {
    let text = read_str(bytes);
    text.trim()
        .parse()
        .with_context(|_| MalformedDecimalSnafu { text: text.clone() })
}

/// Parse a multi-valued Decimal String (DS) value: numbers separated by
/// backslashes, each possibly padded with whitespace.
pub fn parse_ds_list(bytes: &[u8]) -> Result<DecimalTuple> {
    let text = read_str(bytes);
    text.split('\\')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .with_context(|_| MalformedDecimalSnafu { text: part.to_string() })
        })
        .collect()
}

/// Parse a multi-valued Decimal String value expecting exactly `n`
/// numbers.
pub fn parse_ds_n(bytes: &[u8], n: usize) -> Result<DecimalTuple> {
    let values = parse_ds_list(bytes)?;
    ensure!(values.len() == n, DecimalCountSnafu { expected: n, got: values.len() });
    Ok(values)
}
