//! The event-driven DICOM element parser.
//!
//! The parser streams data elements out of a [`FileSource`] and hands
//! each fully read element to the callbacks in its registry. It owns
//! the framing logic only: the 128-byte preamble and `DICM` magic (with
//! an Implicit VR Little Endian fallback for headerless files), the
//! file meta group (always Explicit VR Little Endian), the transfer
//! syntax switch, sequence item recursion, and encapsulated pixel data
//! fragments. Everything semantic happens in the callbacks.

use crate::registry::{CallbackRegistry, CallbackResult, ElementContext};
use crate::source::{self, FileSource};
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::{self, Read, Seek};
use std::path::Path;
use tracing::{debug, warn};
use voldex_core::header::{DataElementHeader, Header, Length, SequenceItemHeader};
use voldex_core::{Tag, VR};
use voldex_encoding::decode::{self, primitive, DatasetDecoder, Decode};
use voldex_encoding::transfer_syntax::{self, IMPLICIT_VR_LITTLE_ENDIAN};
use voldex_encoding::Endianness;

const DICM_MAGIC: &[u8; 4] = b"DICM";

/// The byte-swapped rendition of the first data set tag (0008,0000),
/// observed when the data set is read with the wrong byte order.
const SWAP_SENTINEL: Tag = Tag(0x0800, 0x0000);

/// An error produced while parsing a DICOM file. Framing errors are
/// fatal for the file at hand; indices built from earlier files are
/// unaffected.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The source could not be opened or measured.
    #[snafu(display("Could not open source: {}", source))]
    OpenSource {
        /// the underlying source error
        #[snafu(backtrace)]
        source: source::Error,
    },
    /// The source could not be repositioned.
    #[snafu(display("Could not reposition source: {}", source))]
    RepositionSource {
        /// the underlying source error
        #[snafu(backtrace)]
        source: source::Error,
    },
    /// The file carries no `DICM` magic code and does not parse as an
    /// Implicit VR Little Endian data set either.
    #[snafu(display("Not a DICOM file: no magic code and no parsable data set"))]
    BadMagic {
        /// backtrace at failure
        backtrace: Backtrace,
    },
    /// A data element or item header could not be decoded.
    #[snafu(display("Could not decode header at position {}: {}", position, source))]
    DecodeHeader {
        /// the position of the offending header
        position: u64,
        /// the decoding failure
        source: decode::Error,
    },
    /// The value bytes of an element could not be read in full.
    #[snafu(display(
        "Could not read {} value bytes of {} at position {}: {}",
        len,
        tag,
        position,
        source
    ))]
    ReadValue {
        /// the element's tag
        tag: Tag,
        /// the declared value length
        len: u32,
        /// the position of the value
        position: u64,
        /// the underlying I/O error
        source: io::Error,
        /// backtrace at failure
        backtrace: Backtrace,
    },
    /// A declared length exceeds the remaining input.
    #[snafu(display(
        "Declared length {} of {} at position {} exceeds the {} remaining bytes",
        len,
        tag,
        position,
        remaining
    ))]
    InconsistentLength {
        /// the element's tag
        tag: Tag,
        /// the declared value length
        len: u32,
        /// the position of the element
        position: u64,
        /// the number of bytes left in the source
        remaining: u64,
        /// backtrace at failure
        backtrace: Backtrace,
    },
}

/// Type alias for parsing results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The event-driven element parser, bound to a callback registry over
/// the consumer state type `T`.
#[derive(Debug, Default)]
pub struct ElementParser<T> {
    registry: CallbackRegistry<T>,
}

impl<T> ElementParser<T> {
    /// Create a parser with an empty callback registry.
    pub fn new() -> Self {
        ElementParser {
            registry: CallbackRegistry::new(),
        }
    }

    /// Access the callback registry.
    pub fn registry(&self) -> &CallbackRegistry<T> {
        &self.registry
    }

    /// Access the callback registry for registration.
    pub fn registry_mut(&mut self) -> &mut CallbackRegistry<T> {
        &mut self.registry
    }

    /// Append a callback for the given tag. See
    /// [`CallbackRegistry::register`].
    pub fn register<G, F>(&mut self, tag: G, expected_vr: VR, callback: F)
    where
        G: Into<Tag>,
        F: Fn(&mut T, &ElementContext<'_>) -> CallbackResult + 'static,
    {
        self.registry.register(tag, expected_vr, callback);
    }

    /// Install the default callback. See
    /// [`CallbackRegistry::register_default`].
    pub fn register_default<F>(&mut self, callback: F)
    where
        F: Fn(&mut T, &ElementContext<'_>) -> CallbackResult + 'static,
    {
        self.registry.register_default(callback);
    }

    /// Parse the file at the given path, dispatching its elements to
    /// the registered callbacks over `state`.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P, state: &mut T) -> Result<()> {
        let path = path.as_ref();
        let mut source = FileSource::open(path).context(OpenSourceSnafu)?;
        let filename = path.display().to_string();
        self.parse(&mut source, &filename, state)
    }

    /// Parse one whole file from the given source, dispatching its
    /// elements to the registered callbacks over `state`. `filename`
    /// identifies the file in the index and in diagnostics.
    pub fn parse<R>(
        &self,
        source: &mut FileSource<R>,
        filename: &str,
        state: &mut T,
    ) -> Result<()>
    where
        R: Read + Seek,
    {
        self.registry.notify_file_start(state, filename);
        source.set_endianness(Endianness::Little);

        let part10 = self.check_magic(source)?;
        let mut buffer = Vec::with_capacity(2048);

        let ts_uid = if part10 {
            self.parse_file_meta(source, filename, state, &mut buffer)?
        } else {
            ensure!(source.len() >= 8, BadMagicSnafu);
            None
        };

        // transfer syntax switch: the data set decoder is configured
        // up front; unrecognised syntaxes downgrade to the default
        let ts = match ts_uid.as_deref().map(transfer_syntax::lookup) {
            Some(Some(ts)) => ts,
            Some(None) => {
                warn!(
                    "{}: unrecognised transfer syntax {:?}, assuming Implicit VR Little Endian",
                    filename,
                    ts_uid.as_deref().unwrap_or_default()
                );
                &IMPLICIT_VR_LITTLE_ENDIAN
            }
            None => {
                if part10 {
                    warn!(
                        "{}: no transfer syntax in file meta, assuming Implicit VR Little Endian",
                        filename
                    );
                }
                &IMPLICIT_VR_LITTLE_ENDIAN
            }
        };

        source.set_endianness(ts.endianness);
        let mut decoder = DatasetDecoder::new(ts.endianness, ts.explicit_vr);
        let mut swap_used = false;
        let mut first = true;

        while source.remaining() >= 8 {
            let outcome = self.read_element(
                source,
                &mut decoder,
                &mut swap_used,
                filename,
                state,
                &mut buffer,
            );
            match outcome {
                Ok(()) => {}
                // a file without magic that fails on its very first
                // element is simply not DICOM
                Err(_) if first && !part10 => return BadMagicSnafu.fail(),
                Err(e) => return Err(e),
            }
            first = false;
        }
        if source.remaining() > 0 {
            debug!(
                "{}: {} trailing bytes after the last data element",
                filename,
                source.remaining()
            );
        }
        Ok(())
    }

    /// Skip the preamble and check for the magic code. On a mismatch
    /// the cursor is returned to offset 0 for the fallback mode.
    fn check_magic<R>(&self, source: &mut FileSource<R>) -> Result<bool>
    where
        R: Read + Seek,
    {
        if source.len() < 132 {
            source.seek_to(0).context(RepositionSourceSnafu)?;
            return Ok(false);
        }
        source.skip(128).context(RepositionSourceSnafu)?;
        let mut magic = [0u8; 4];
        if source.read_exact(&mut magic).is_err() || &magic != DICM_MAGIC {
            source.seek_to(0).context(RepositionSourceSnafu)?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Read the file meta group, which is always encoded in Explicit
    /// VR Little Endian, dispatching its elements as well. Returns the
    /// declared transfer syntax UID, if present.
    fn parse_file_meta<R>(
        &self,
        source: &mut FileSource<R>,
        filename: &str,
        state: &mut T,
        buffer: &mut Vec<u8>,
    ) -> Result<Option<String>>
    where
        R: Read + Seek,
    {
        let decoder = decode::file_header_decoder();
        let mut ts_uid = None;

        while source.remaining() >= 8 {
            let mark = source.position();
            let (header, bytes_read) = decoder
                .decode_header(source)
                .context(DecodeHeaderSnafu { position: mark })?;
            if header.tag.group() != 0x0002 {
                // first data set element: unread it
                source
                    .rewind_by(bytes_read as u64)
                    .context(RepositionSourceSnafu)?;
                break;
            }
            let len = header.len.get().unwrap_or(u32::MAX);
            ensure!(
                u64::from(len) <= source.remaining(),
                InconsistentLengthSnafu {
                    tag: header.tag,
                    len,
                    position: mark,
                    remaining: source.remaining(),
                }
            );
            buffer.resize(len as usize, 0);
            source.read_exact(buffer).context(ReadValueSnafu {
                tag: header.tag,
                len,
                position: mark,
            })?;

            if header.tag == Tag(0x0002, 0x0010) {
                ts_uid = Some(primitive::read_str(buffer));
            }
            self.registry.dispatch(
                state,
                &ElementContext {
                    tag: header.tag,
                    vr: header.vr,
                    bytes: &buffer[..],
                    len,
                    endianness: Endianness::Little,
                    filename,
                    encapsulated: false,
                },
            );
        }
        Ok(ts_uid)
    }

    /// Read one data element (header plus value) and dispatch it,
    /// descending into sequence items where needed.
    fn read_element<R>(
        &self,
        source: &mut FileSource<R>,
        decoder: &mut DatasetDecoder,
        swap_used: &mut bool,
        filename: &str,
        state: &mut T,
        buffer: &mut Vec<u8>,
    ) -> Result<()>
    where
        R: Read + Seek,
    {
        let mark = source.position();
        let (header, bytes_read) = decoder
            .decode_header(source)
            .context(DecodeHeaderSnafu { position: mark })?;

        // safety net for writers whose data set byte order does not
        // match the declared transfer syntax: the group length tag
        // (0008,0000) read with the wrong order comes out as the
        // sentinel. Flip the byte order, unread the header, try again.
        if header.tag == SWAP_SENTINEL && !*swap_used {
            *swap_used = true;
            warn!(
                "{}: byte order mismatch at position {}, flipping byte order",
                filename, mark
            );
            source.toggle_byte_order();
            *decoder = DatasetDecoder::new(source.endianness(), decoder.explicit_vr());
            source
                .rewind_by(bytes_read as u64)
                .context(RepositionSourceSnafu)?;
            return Ok(());
        }

        self.read_element_with_header(
            source, decoder, swap_used, filename, state, buffer, header, mark,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn read_element_with_header<R>(
        &self,
        source: &mut FileSource<R>,
        decoder: &mut DatasetDecoder,
        swap_used: &mut bool,
        filename: &str,
        state: &mut T,
        buffer: &mut Vec<u8>,
        header: DataElementHeader,
        mark: u64,
    ) -> Result<()>
    where
        R: Read + Seek,
    {
        // encapsulated pixel data: collect the fragments as-is
        if header.is_encapsulated_pixeldata() {
            let fragments = self.read_encapsulated(source, decoder)?;
            self.registry.dispatch(
                state,
                &ElementContext {
                    tag: header.tag,
                    vr: header.vr,
                    bytes: &fragments[..],
                    len: fragments.len() as u32,
                    endianness: source.endianness(),
                    filename,
                    encapsulated: true,
                },
            );
            return Ok(());
        }

        // sequences: announce the sequence element itself with an
        // empty value, then walk the items so that inner elements
        // dispatch independently
        if header.vr == VR::SQ || header.len.is_undefined() {
            self.registry.dispatch(
                state,
                &ElementContext {
                    tag: header.tag,
                    vr: header.vr,
                    bytes: &[],
                    len: 0,
                    endianness: source.endianness(),
                    filename,
                    encapsulated: false,
                },
            );
            return self.read_items(
                source, decoder, swap_used, filename, state, buffer, header.len,
            );
        }

        // some writers declare pixel data with the 16-bit undefined
        // length 0xFFFF; the real extent runs to the end of the file
        // and the image dimensions decide the sample count downstream
        let len = if header.tag == Tag(0x7FE0, 0x0010) && header.len.0 == 0xFFFF {
            source.remaining()
        } else {
            u64::from(header.len.0)
        };
        ensure!(
            len <= source.remaining(),
            InconsistentLengthSnafu {
                tag: header.tag,
                len: header.len.0,
                position: mark,
                remaining: source.remaining(),
            }
        );
        buffer.resize(len as usize, 0);
        source.read_exact(buffer).context(ReadValueSnafu {
            tag: header.tag,
            len: header.len.0,
            position: mark,
        })?;
        self.registry.dispatch(
            state,
            &ElementContext {
                tag: header.tag,
                vr: header.vr,
                bytes: &buffer[..],
                len: header.len.0,
                endianness: source.endianness(),
                filename,
                encapsulated: false,
            },
        );
        Ok(())
    }

    /// Walk the items of a sequence element, dispatching every inner
    /// element. Handles both defined and undefined sequence lengths.
    #[allow(clippy::too_many_arguments)]
    fn read_items<R>(
        &self,
        source: &mut FileSource<R>,
        decoder: &mut DatasetDecoder,
        swap_used: &mut bool,
        filename: &str,
        state: &mut T,
        buffer: &mut Vec<u8>,
        sq_len: Length,
    ) -> Result<()>
    where
        R: Read + Seek,
    {
        let end = sq_len.get().map(|len| {
            source.position() + u64::from(len)
        });
        if let Some(end) = end {
            ensure!(
                end <= source.len(),
                InconsistentLengthSnafu {
                    tag: Tag(0xFFFE, 0xE000),
                    len: sq_len.0,
                    position: source.position(),
                    remaining: source.remaining(),
                }
            );
        }

        loop {
            if let Some(end) = end {
                if source.position() >= end {
                    break;
                }
            }
            let mark = source.position();
            let item = decoder
                .decode_item_header(source)
                .context(DecodeHeaderSnafu { position: mark })?;
            match item {
                SequenceItemHeader::Item(len) => {
                    self.read_item_value(
                        source, decoder, swap_used, filename, state, buffer, len,
                    )?;
                }
                SequenceItemHeader::ItemDelimiter => {
                    // only expected after an undefined-length item,
                    // which consumes its own delimiter; tolerated here
                    debug!("{}: stray item delimiter at {}", filename, mark);
                }
                SequenceItemHeader::SequenceDelimiter => break,
            }
        }
        Ok(())
    }

    /// Read the contents of a single sequence item: a list of data
    /// elements bounded by the item length or by an item delimiter.
    #[allow(clippy::too_many_arguments)]
    fn read_item_value<R>(
        &self,
        source: &mut FileSource<R>,
        decoder: &mut DatasetDecoder,
        swap_used: &mut bool,
        filename: &str,
        state: &mut T,
        buffer: &mut Vec<u8>,
        len: Length,
    ) -> Result<()>
    where
        R: Read + Seek,
    {
        match len.get() {
            Some(len) => {
                let end = source.position() + u64::from(len);
                ensure!(
                    end <= source.len(),
                    InconsistentLengthSnafu {
                        tag: Tag(0xFFFE, 0xE000),
                        len,
                        position: source.position(),
                        remaining: source.remaining(),
                    }
                );
                while source.position() < end {
                    self.read_element(
                        source, decoder, swap_used, filename, state, buffer,
                    )?;
                }
            }
            None => loop {
                let mark = source.position();
                let (header, _) = decoder
                    .decode_header(source)
                    .context(DecodeHeaderSnafu { position: mark })?;
                if header.is_item_delimiter() {
                    break;
                }
                self.read_element_with_header(
                    source, decoder, swap_used, filename, state, buffer, header, mark,
                )?;
            },
        }
        Ok(())
    }

    /// Read the item fragments of an encapsulated pixel data element
    /// until the sequence delimiter, concatenating their payloads.
    fn read_encapsulated<R>(
        &self,
        source: &mut FileSource<R>,
        decoder: &DatasetDecoder,
    ) -> Result<Vec<u8>>
    where
        R: Read + Seek,
    {
        let mut fragments = Vec::new();
        loop {
            let mark = source.position();
            let item = decoder
                .decode_item_header(source)
                .context(DecodeHeaderSnafu { position: mark })?;
            match item {
                SequenceItemHeader::Item(len) => {
                    let len = len.get().unwrap_or(u32::MAX);
                    ensure!(
                        u64::from(len) <= source.remaining(),
                        InconsistentLengthSnafu {
                            tag: Tag(0xFFFE, 0xE000),
                            len,
                            position: mark,
                            remaining: source.remaining(),
                        }
                    );
                    let offset = fragments.len();
                    fragments.resize(offset + len as usize, 0);
                    source
                        .read_exact(&mut fragments[offset..])
                        .context(ReadValueSnafu {
                            tag: Tag(0xFFFE, 0xE000),
                            len,
                            position: mark,
                        })?;
                }
                SequenceItemHeader::ItemDelimiter => {}
                SequenceItemHeader::SequenceDelimiter => break,
            }
        }
        Ok(fragments)
    }
}
