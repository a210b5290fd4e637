//! Implicit VR decoder implementation, generic over byte order.
//!
//! The little endian form is the DICOM default transfer syntax; the big
//! endian form only exists to support the GE private syntax
//! `1.2.840.113619.5.2`. Value representations are resolved through the
//! diagnostic tag dictionary, falling back to `UN`.

use crate::decode::basic::{BigEndianBasicDecoder, LittleEndianBasicDecoder};
use crate::decode::{
    BadSequenceHeaderSnafu, BasicDecode, Decode, ReadLengthSnafu, ReadTagSnafu, Result,
};
use snafu::ResultExt;
use std::io::Read;
use voldex_core::dictionary;
use voldex_core::header::{DataElementHeader, Length, SequenceItemHeader};
use voldex_core::VR;

/// An Implicit VR decoder for the standard little endian syntax.
pub type ImplicitVRLittleEndianDecoder = ImplicitVRDecoder<LittleEndianBasicDecoder>;

/// An Implicit VR decoder reading big endian binary fields, for the GE
/// private syntax.
pub type ImplicitVRBigEndianDecoder = ImplicitVRDecoder<BigEndianBasicDecoder>;

/// A data element decoder for Implicit VR transfer syntaxes.
///
/// Since the data set carries no VR information, the decoder resolves
/// each element's representation through the tag dictionary.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImplicitVRDecoder<B> {
    basic: B,
}

impl<B> Decode for ImplicitVRDecoder<B>
where
    B: BasicDecode,
{
    fn decode_header<S>(&self, mut source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve tag
        let tag = self
            .basic
            .decode_tag(&mut source)
            .context(ReadTagSnafu)?;

        let len = self
            .basic
            .decode_ul(&mut source)
            .context(ReadLengthSnafu)?;

        // item delimiters carry no meaningful VR
        let vr = if tag.group() == 0xFFFE {
            VR::UN
        } else {
            dictionary::vr_of(tag)
        };
        Ok((DataElementHeader::new(tag, vr, Length(len)), 8))
    }

    fn decode_item_header<S>(&self, mut source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        let tag = self
            .basic
            .decode_tag(&mut source)
            .context(ReadTagSnafu)?;
        let len = self
            .basic
            .decode_ul(&mut source)
            .context(ReadLengthSnafu)?;
        SequenceItemHeader::new(tag, Length(len)).context(BadSequenceHeaderSnafu)
    }
}
