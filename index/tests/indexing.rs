//! End-to-end tests over synthetic DICOM files built in memory.

use std::io::Cursor;
use voldex_core::VR;
use voldex_index::{DatasetIndexer, ElementParser, FileSource, ImageBuffer};

const IMPLICIT_LE: &str = "1.2.840.10008.1.2";
const EXPLICIT_LE: &str = "1.2.840.10008.1.2.1";
const EXPLICIT_BE: &str = "1.2.840.10008.1.2.2";
const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";

/// Builds synthetic Part-10 files, one element at a time.
struct FileBuilder {
    bytes: Vec<u8>,
    explicit_vr: bool,
    big_endian: bool,
}

impl FileBuilder {
    /// Start a Part-10 file: 128-byte preamble, `DICM`, and a file
    /// meta group declaring the given transfer syntax.
    fn part10(ts_uid: &str) -> Self {
        let mut builder = FileBuilder {
            bytes: vec![0u8; 128],
            explicit_vr: true,
            big_endian: false,
        };
        builder.bytes.extend_from_slice(b"DICM");

        // file meta is always Explicit VR Little Endian
        let mut uid = ts_uid.as_bytes().to_vec();
        if uid.len() % 2 != 0 {
            uid.push(0);
        }
        let group_len = 8 + uid.len() as u32;
        builder.element(0x0002, 0x0000, VR::UL, &group_len.to_le_bytes());
        builder.element(0x0002, 0x0010, VR::UI, &uid);
        builder
    }

    /// Start a headerless file (no preamble, no magic); the parser
    /// falls back to Implicit VR Little Endian from offset 0.
    fn headerless() -> Self {
        FileBuilder {
            bytes: Vec::new(),
            explicit_vr: false,
            big_endian: false,
        }
    }

    /// Switch the encoding used for subsequently written elements.
    fn dataset_encoding(mut self, explicit_vr: bool, big_endian: bool) -> Self {
        self.explicit_vr = explicit_vr;
        self.big_endian = big_endian;
        self
    }

    fn u16_bytes(&self, v: u16) -> [u8; 2] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn u32_bytes(&self, v: u32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    /// Write one data element with a defined length.
    fn element(&mut self, group: u16, elem: u16, vr: VR, value: &[u8]) {
        self.bytes.extend_from_slice(&self.u16_bytes(group));
        self.bytes.extend_from_slice(&self.u16_bytes(elem));
        if self.explicit_vr {
            self.bytes.extend_from_slice(vr.to_string().as_bytes());
            if vr.has_long_form() {
                self.bytes.extend_from_slice(&[0, 0]);
                self.bytes
                    .extend_from_slice(&self.u32_bytes(value.len() as u32));
            } else {
                self.bytes
                    .extend_from_slice(&self.u16_bytes(value.len() as u16));
            }
        } else {
            self.bytes
                .extend_from_slice(&self.u32_bytes(value.len() as u32));
        }
        self.bytes.extend_from_slice(value);
    }

    /// Write an element header with an explicit length field,
    /// regardless of the value that follows.
    fn element_with_declared_len(
        &mut self,
        group: u16,
        elem: u16,
        vr: VR,
        declared: u32,
        value: &[u8],
    ) {
        self.bytes.extend_from_slice(&self.u16_bytes(group));
        self.bytes.extend_from_slice(&self.u16_bytes(elem));
        if self.explicit_vr {
            self.bytes.extend_from_slice(vr.to_string().as_bytes());
            assert!(vr.has_long_form(), "declared lengths need the long form");
            self.bytes.extend_from_slice(&[0, 0]);
            self.bytes.extend_from_slice(&self.u32_bytes(declared));
        } else {
            self.bytes.extend_from_slice(&self.u32_bytes(declared));
        }
        self.bytes.extend_from_slice(value);
    }

    /// Open an undefined-length sequence element.
    fn begin_sequence(&mut self, group: u16, elem: u16) {
        self.element_with_declared_len(group, elem, VR::SQ, 0xFFFF_FFFF, &[]);
    }

    /// Open an undefined-length sequence item.
    fn begin_item(&mut self) {
        self.bytes.extend_from_slice(&self.u16_bytes(0xFFFE));
        self.bytes.extend_from_slice(&self.u16_bytes(0xE000));
        self.bytes.extend_from_slice(&self.u32_bytes(0xFFFF_FFFF));
    }

    /// Write a defined-length item carrying the given payload, as
    /// used by encapsulated pixel data fragments.
    fn bytes_item(&mut self, payload: &[u8]) {
        self.bytes.extend_from_slice(&self.u16_bytes(0xFFFE));
        self.bytes.extend_from_slice(&self.u16_bytes(0xE000));
        self.bytes
            .extend_from_slice(&self.u32_bytes(payload.len() as u32));
        self.bytes.extend_from_slice(payload);
    }

    fn end_item(&mut self) {
        self.bytes.extend_from_slice(&self.u16_bytes(0xFFFE));
        self.bytes.extend_from_slice(&self.u16_bytes(0xE00D));
        self.bytes.extend_from_slice(&self.u32_bytes(0));
    }

    fn end_sequence(&mut self) {
        self.bytes.extend_from_slice(&self.u16_bytes(0xFFFE));
        self.bytes.extend_from_slice(&self.u16_bytes(0xE0DD));
        self.bytes.extend_from_slice(&self.u32_bytes(0));
    }

    fn build(self) -> Vec<u8> {
        self.bytes
    }
}

fn standard_parser() -> ElementParser<DatasetIndexer> {
    let mut parser = ElementParser::new();
    DatasetIndexer::register_callbacks(&mut parser);
    DatasetIndexer::register_pixel_callback(&mut parser);
    parser
}

fn parse_bytes(
    parser: &ElementParser<DatasetIndexer>,
    index: &mut DatasetIndexer,
    bytes: Vec<u8>,
    filename: &str,
) {
    let mut source = FileSource::new(Cursor::new(bytes)).expect("source over memory");
    parser
        .parse(&mut source, filename, index)
        .expect("parse should succeed");
}

#[test]
fn implicit_le_ct_slice_rescales_to_i16() {
    // scenario: 512x512, 16 bits, slope 1, offset -1024
    let mut builder = FileBuilder::part10(IMPLICIT_LE).dataset_encoding(false, false);
    builder.element(0x0008, 0x0018, VR::UI, b"1.2.3.4\0");
    builder.element(0x0020, 0x000E, VR::UI, b"9.9.9\0");
    builder.element(0x0028, 0x0010, VR::US, &512u16.to_le_bytes());
    builder.element(0x0028, 0x0011, VR::US, &512u16.to_le_bytes());
    builder.element(0x0028, 0x0100, VR::US, &16u16.to_le_bytes());
    builder.element(0x0028, 0x1052, VR::DS, b"-1024 ");
    builder.element(0x0028, 0x1053, VR::DS, b"1 ");

    let mut samples = vec![0u16; 512 * 512];
    samples[0] = 2000;
    samples[1] = 1024;
    let raw: Vec<u8> = samples.iter().flat_map(|v| v.to_le_bytes()).collect();
    builder.element(0x7FE0, 0x0010, VR::OW, &raw);

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "ct-001.dcm");

    assert_eq!(index.dimensions(), [512, 512]);
    assert_eq!(index.bits_allocated(), 16);
    let Some(ImageBuffer::I16(pixels)) = index.image_buffer() else {
        panic!("expected an i16 image, got {:?}", index.image_buffer());
    };
    assert_eq!(pixels.len(), 512 * 512);
    assert_eq!(pixels[0], 2000 - 1024);
    assert_eq!(pixels[1], 0);
    assert_eq!(pixels[2], -1024);

    assert_eq!(index.series_uids(), vec!["9.9.9"]);
    assert_eq!(index.file_for("1.2.3.4"), Some("ct-001.dcm"));
}

#[test]
fn explicit_be_reads_binary_values_correctly() {
    // scenario: Bits Allocated must read as 16, not 4096
    let mut builder = FileBuilder::part10(EXPLICIT_BE).dataset_encoding(true, true);
    builder.element(0x0008, 0x0018, VR::UI, b"2.2.2.2\0");
    builder.element(0x0020, 0x000E, VR::UI, b"8.8.8\0");
    builder.element(0x0028, 0x0010, VR::US, &2u16.to_be_bytes());
    builder.element(0x0028, 0x0011, VR::US, &2u16.to_be_bytes());
    builder.element(0x0028, 0x0100, VR::US, &16u16.to_be_bytes());

    let raw: Vec<u8> = [100u16, 200, 300, 400]
        .iter()
        .flat_map(|v| v.to_be_bytes())
        .collect();
    builder.element(0x7FE0, 0x0010, VR::OW, &raw);

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "mr-001.dcm");

    assert_eq!(index.bits_allocated(), 16);
    assert_eq!(
        index.image_buffer(),
        Some(&ImageBuffer::I16(vec![100, 200, 300, 400]))
    );
}

#[test]
fn rt_structure_contours_and_references() {
    // scenario: two contours of 3 and 5 points referencing two images
    let mut builder = FileBuilder::part10(EXPLICIT_LE);
    builder.element(0x0008, 0x0018, VR::UI, b"3.3.3.3\0");
    builder.element(0x0020, 0x000E, VR::UI, b"7.7.7\0");

    builder.begin_sequence(0x3006, 0x0039); // ROI Contour Sequence
    builder.begin_item();
    builder.begin_sequence(0x3006, 0x0040); // Contour Sequence

    for (points, reference) in [
        ("1\\2\\3\\4\\5\\6\\7\\8\\9", "ref.1"),
        (
            "1\\1\\1\\2\\2\\2\\3\\3\\3\\4\\4\\4\\5\\5\\5",
            "ref.2",
        ),
    ] {
        builder.begin_item();
        builder.begin_sequence(0x3006, 0x0016); // Contour Image Sequence
        builder.begin_item();
        builder.element(0x0008, 0x1155, VR::UI, reference.as_bytes());
        builder.end_item();
        builder.end_sequence();
        builder.element(0x3006, 0x0042, VR::CS, b"CLOSED_PLANAR ");
        let n = (points.split('\\').count() / 3).to_string();
        builder.element(0x3006, 0x0046, VR::IS, n.as_bytes());
        builder.element(0x3006, 0x0050, VR::DS, points.as_bytes());
        builder.end_item();
    }

    builder.end_sequence(); // Contour Sequence
    builder.end_item();
    builder.end_sequence(); // ROI Contour Sequence

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "rtss.dcm");

    let contours = index.contours(Some("7.7.7"));
    assert_eq!(contours.len(), 2);
    assert_eq!(contours[0].len(), 9);
    assert_eq!(contours[1].len(), 15);
    assert_eq!(&contours[0][..3], &[1.0, 2.0, 3.0][..]);

    let referenced = index.referenced_instances(Some("7.7.7"));
    assert_eq!(referenced, ["ref.1", "ref.2"]);
    // lock step: contour k pairs with referenced instance k
    assert_eq!(contours.len(), referenced.len());
}

#[test]
fn series_before_instance_still_lands_in_series() {
    let mut builder = FileBuilder::part10(EXPLICIT_LE);
    builder.element(0x0020, 0x000E, VR::UI, b"6.6.6\0");
    builder.element(0x0008, 0x0018, VR::UI, b"4.4.4.4\0");

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "odd.dcm");

    assert_eq!(index.instances(Some("6.6.6")), ["4.4.4.4"]);
}

#[test]
fn pixel_data_with_0xffff_length_uses_image_dimensions() {
    // scenario: 256x256, one component, 16 bpp, declared length 0xFFFF
    let mut builder = FileBuilder::part10(EXPLICIT_LE);
    builder.element(0x0008, 0x0018, VR::UI, b"5.5.5.5\0");
    builder.element(0x0020, 0x000E, VR::UI, b"5.5.5\0");
    builder.element(0x0028, 0x0010, VR::US, &256u16.to_le_bytes());
    builder.element(0x0028, 0x0011, VR::US, &256u16.to_le_bytes());
    builder.element(0x0028, 0x0100, VR::US, &16u16.to_le_bytes());

    let raw: Vec<u8> = (0..256u32 * 256)
        .flat_map(|i| ((i % 1000) as u16).to_le_bytes())
        .collect();
    builder.element_with_declared_len(0x7FE0, 0x0010, VR::OW, 0xFFFF, &raw);

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "ow.dcm");

    let Some(ImageBuffer::I16(pixels)) = index.image_buffer() else {
        panic!("expected an i16 image");
    };
    assert_eq!(pixels.len(), 256 * 256);
}

#[test]
fn fractional_slope_widens_to_f32() {
    // scenario: slope 1.5, offset 0, 8-bit input
    let mut builder = FileBuilder::part10(EXPLICIT_LE);
    builder.element(0x0008, 0x0018, VR::UI, b"6.5.4.3\0");
    builder.element(0x0020, 0x000E, VR::UI, b"1.1.1\0");
    builder.element(0x0028, 0x0010, VR::US, &2u16.to_le_bytes());
    builder.element(0x0028, 0x0011, VR::US, &2u16.to_le_bytes());
    builder.element(0x0028, 0x0100, VR::US, &8u16.to_le_bytes());
    builder.element(0x0028, 0x1053, VR::DS, b"1.5 ");
    builder.element(0x7FE0, 0x0010, VR::OB, &[0, 1, 2, 100]);

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "us8.dcm");

    assert_eq!(
        index.image_buffer(),
        Some(&ImageBuffer::F32(vec![0.0, 1.5, 3.0, 150.0]))
    );
}

#[test]
fn headerless_file_parses_as_implicit_le() {
    let mut builder = FileBuilder::headerless();
    builder.element(0x0008, 0x0018, VR::UI, b"1.1.1.1\0");
    builder.element(0x0020, 0x000E, VR::UI, b"2.2.2\0");
    builder.element(0x0020, 0x0013, VR::IS, b"7 ");

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "bare.dcm");

    assert_eq!(index.series_uids(), vec!["2.2.2"]);
    assert_eq!(
        index.slice_number_pairs(None),
        vec![(7, "bare.dcm".to_string())]
    );
}

#[test]
fn garbage_is_rejected_as_bad_magic() {
    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    let mut source = FileSource::new(Cursor::new(b"clearly not dicom data".to_vec())).unwrap();
    let err = parser
        .parse(&mut source, "garbage.bin", &mut index)
        .expect_err("garbage must not parse");
    assert!(err.to_string().contains("Not a DICOM file"), "{}", err);
}

#[test]
fn unknown_transfer_syntax_downgrades_to_implicit_le() {
    let mut builder = FileBuilder::part10("1.2.999.1.2.3").dataset_encoding(false, false);
    builder.element(0x0008, 0x0018, VR::UI, b"1.2.1.2\0");
    builder.element(0x0020, 0x000E, VR::UI, b"3.2.1\0");

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "odd-ts.dcm");

    assert_eq!(index.series_uids(), vec!["3.2.1"]);
}

#[test]
fn byte_order_mismatch_recovers_via_sentinel() {
    // file meta declares Explicit VR Little Endian, data set is
    // actually written big endian: the misread group length tag
    // surfaces as (0800,0000) and flips the byte order
    let mut builder = FileBuilder::part10(EXPLICIT_LE).dataset_encoding(true, true);
    builder.element(0x0008, 0x0000, VR::UL, &12u32.to_be_bytes());
    builder.element(0x0008, 0x0018, VR::UI, b"9.0.9.0\0");
    builder.element(0x0028, 0x0100, VR::US, &16u16.to_be_bytes());

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "flipped.dcm");

    assert_eq!(index.bits_allocated(), 16);
    assert_eq!(index.file_for("9.0.9.0"), Some("flipped.dcm"));
}

#[test]
fn encapsulated_pixel_data_is_stored_as_is() {
    let mut builder = FileBuilder::part10(JPEG_BASELINE);
    builder.element(0x0008, 0x0018, VR::UI, b"4.4.4.1\0");
    builder.element(0x0020, 0x000E, VR::UI, b"4.4.4\0");

    // encapsulated pixel data: undefined length, offset table item,
    // one fragment, sequence delimiter
    builder.element_with_declared_len(0x7FE0, 0x0010, VR::OB, 0xFFFF_FFFF, &[]);
    builder.bytes_item(&[]); // empty basic offset table
    builder.bytes_item(&[0xFF, 0xD8, 0xFF, 0xE0, 0x12, 0x34]);
    builder.end_sequence();

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    parse_bytes(&parser, &mut index, builder.build(), "jpeg.dcm");

    assert_eq!(
        index.image_buffer(),
        Some(&ImageBuffer::Encapsulated(vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x12, 0x34
        ]))
    );
}

#[test]
fn indices_accumulate_across_files_and_clear_resets() {
    let parser = standard_parser();
    let mut index = DatasetIndexer::new();

    for (instance, series, number, file) in [
        ("i.1", "s.1", "2", "b.dcm"),
        ("i.2", "s.1", "1", "a.dcm"),
        ("i.3", "s.2", "1", "c.dcm"),
    ] {
        let mut builder = FileBuilder::part10(EXPLICIT_LE);
        builder.element(0x0008, 0x0018, VR::UI, instance.as_bytes());
        builder.element(0x0020, 0x000E, VR::UI, series.as_bytes());
        builder.element(0x0020, 0x0013, VR::IS, number.as_bytes());
        parse_bytes(&parser, &mut index, builder.build(), file);
    }

    assert_eq!(index.series_uids(), vec!["s.1", "s.2"]);
    assert_eq!(index.instances(Some("s.1")), ["i.1", "i.2"]);
    assert_eq!(
        index.slice_number_pairs(Some("s.1")),
        vec![(1, "a.dcm".to_string()), (2, "b.dcm".to_string())]
    );

    index.clear();
    assert!(index.series_uids().is_empty());
    assert!(index.slice_number_pairs(None).is_empty());
}

#[test]
fn scan_dir_indexes_a_directory() {
    let dir = tempfile::tempdir().expect("temp dir");

    for (instance, series, file) in [("d.1", "s.9", "one.dcm"), ("d.2", "s.9", "two.dcm")] {
        let mut builder = FileBuilder::part10(EXPLICIT_LE);
        builder.element(0x0008, 0x0018, VR::UI, instance.as_bytes());
        builder.element(0x0020, 0x000E, VR::UI, series.as_bytes());
        std::fs::write(dir.path().join(file), builder.build()).expect("write file");
    }
    std::fs::write(dir.path().join("notes.txt"), b"not dicom").expect("write file");

    let parser = standard_parser();
    let mut index = DatasetIndexer::new();
    let outcome = voldex_index::scan_dir(dir.path(), &parser, &mut index).expect("scan");

    assert_eq!(outcome.parsed, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(index.series_uids(), vec!["s.9"]);
    assert_eq!(index.instances(Some("s.9")).len(), 2);
}
