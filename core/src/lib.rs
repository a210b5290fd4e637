//! This crate contains the base data types of the voldex project:
//! the DICOM attribute tag, value representation codes, element and
//! sequence item headers, and the diagnostic tag dictionary used for
//! implicit-VR resolution.
//!
//! Everything here is independent of any data source or encoding; the
//! sibling crates build the actual decoders and the series index on top
//! of these types.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dictionary;
pub mod header;

pub use crate::dictionary::{TagInfo, DIAGNOSTIC_DICTIONARY};
pub use crate::header::{DataElementHeader, Header, Length, SequenceItemHeader, Tag, VR};
