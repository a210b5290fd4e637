//! Explicit VR Big Endian decoder implementation.
//!
//! Only the binary fields (tag numbers and lengths) change byte order;
//! the two VR characters are plain ASCII either way.

use crate::decode::basic::BigEndianBasicDecoder;
use crate::decode::{
    BadSequenceHeaderSnafu, BasicDecode, Decode, ReadItemHeaderSnafu, ReadLengthSnafu,
    ReadReservedSnafu, ReadTagSnafu, ReadVrSnafu, Result,
};
use byteordered::byteorder::{BigEndian, ByteOrder};
use snafu::ResultExt;
use std::io::Read;
use voldex_core::header::{DataElementHeader, Length, SequenceItemHeader};
use voldex_core::{Tag, VR};

/// A data element decoder for the Explicit VR Big Endian transfer
/// syntax.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExplicitVRBigEndianDecoder {
    basic: BigEndianBasicDecoder,
}

impl Decode for ExplicitVRBigEndianDecoder {
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
            let len = BigEndian::read_u32(&buf);
            return Ok((
                DataElementHeader::new((group, element), VR::UN, Length(len)),
                8,
            ));
        }

        // retrieve explicit VR; an unrecognised code is recorded as UN
        // and its value is consumed by the long-form length rule
        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let vr = VR::from_binary([buf[0], buf[1]]).unwrap_or(VR::UN);
        let bytes_read;

        // retrieve data length
        let len = if vr.has_long_form() {
            source.read_exact(&mut buf[0..2]).context(ReadReservedSnafu)?;
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            bytes_read = 12;
            BigEndian::read_u32(&buf)
        } else {
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            bytes_read = 8;
            u32::from(BigEndian::read_u16(&buf[0..2]))
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
        let group = BigEndian::read_u16(&buf[0..2]);
        let element = BigEndian::read_u16(&buf[2..4]);
        let len = BigEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::ExplicitVRBigEndianDecoder;
    use crate::decode::Decode;
    use voldex_core::header::{Header, Length};
    use voldex_core::{Tag, VR};
    use std::io::{Cursor, Read};

    //  Tag: (0028,0100) Bits Allocated
    //  VR: US
    //  Length: 2
    //  Value: 16
    // --
    //  Tag: (7FE0,0010) Pixel Data
    //  VR: OW
    //  Reserved, Length: 4
    const RAW: &[u8] = &[
        0x00, 0x28, 0x01, 0x00, b'U', b'S', 0x00, 0x02, 0x00, 0x10, 0x7F, 0xE0, 0x00, 0x10, b'O',
        b'W', 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0xCA, 0xFE, 0xBA, 0xBE,
    ];

    #[test]
    fn decode_data_elements() {
        let dec = ExplicitVRBigEndianDecoder::default();
        let mut cursor = Cursor::new(RAW);
        {
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should find an element");
            assert_eq!(elem.tag(), Tag(0x0028, 0x0100));
            assert_eq!(elem.vr, VR::US);
            assert_eq!(elem.len, Length(2));
            assert_eq!(bytes_read, 8);
            let mut value = [0; 2];
            cursor.read_exact(&mut value).unwrap();
            // big endian: 16, not 4096
            assert_eq!(u16::from_be_bytes(value), 16);
        }
        {
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should find an element");
            assert_eq!(elem.tag(), Tag(0x7FE0, 0x0010));
            assert_eq!(elem.vr, VR::OW);
            assert_eq!(elem.len, Length(4));
            assert_eq!(bytes_read, 12);
        }
    }
}
