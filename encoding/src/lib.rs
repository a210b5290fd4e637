//! This crate contains the DICOM decoding logic of the voldex project:
//! byte-order–aware primitive decoders, data element header decoders for
//! the supported transfer syntaxes, decoding of numeric values from raw
//! value bytes, and the transfer syntax descriptors themselves.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod decode;
pub mod transfer_syntax;

pub use byteordered::Endianness;

pub use crate::decode::basic::BasicDecoder;
pub use crate::decode::{BasicDecode, DatasetDecoder, Decode};
pub use crate::transfer_syntax::TransferSyntax;
