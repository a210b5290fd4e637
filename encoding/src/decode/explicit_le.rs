//! Explicit VR Little Endian decoder implementation.

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::{
    BadSequenceHeaderSnafu, BasicDecode, Decode, ReadItemHeaderSnafu, ReadLengthSnafu,
    ReadReservedSnafu, ReadTagSnafu, ReadVrSnafu, Result,
};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::ResultExt;
use std::io::Read;
use voldex_core::header::{DataElementHeader, Length, SequenceItemHeader};
use voldex_core::{Tag, VR};

/// A data element decoder for the Explicit VR Little Endian transfer
/// syntax.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExplicitVRLittleEndianDecoder {
    basic: LittleEndianBasicDecoder,
}

impl Decode for ExplicitVRLittleEndianDecoder {
    fn decode_header<S>(&self, mut source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve tag
        let Tag(group, element) = self
            .basic
            .decode_tag(&mut source)
            .context(ReadTagSnafu)?;

        let mut buf = [0u8; 4];
        if group == 0xFFFE {
            // item delimiters do not have VR or reserved field
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            return Ok((
                DataElementHeader::new((group, element), VR::UN, Length(len)),
                8, // tag + len
            ));
        }

        // retrieve explicit VR; an unrecognised code is recorded as UN
        // and its value is consumed by the long-form length rule
        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let vr = VR::from_binary([buf[0], buf[1]]).unwrap_or(VR::UN);
        let bytes_read;

        // retrieve data length
        let len = if vr.has_long_form() {
            // read 2 reserved bytes, then 4 bytes for the data length
            source.read_exact(&mut buf[0..2]).context(ReadReservedSnafu)?;
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            bytes_read = 12;
            LittleEndian::read_u32(&buf)
        } else {
            // read 2 bytes for the data length
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            bytes_read = 8;
            u32::from(LittleEndian::read_u16(&buf[0..2]))
        };

        Ok((
            DataElementHeader::new((group, element), vr, Length(len)),
            bytes_read,
        ))
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf).context(ReadItemHeaderSnafu)?;
        let group = LittleEndian::read_u16(&buf[0..2]);
        let element = LittleEndian::read_u16(&buf[2..4]);
        let len = LittleEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }
}
