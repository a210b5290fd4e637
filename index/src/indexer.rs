//! The dataset indexer: the stateful consumer of element events that
//! builds the cross-file series index.
//!
//! One indexer accumulates over any number of parsed files. Per-file
//! parse state (the current series and instance UID and the acquisition
//! attributes) is reset at the start of each file; the index maps
//! persist until [`DatasetIndexer::clear`].

use crate::pixeldata::{self, ImageBuffer, RescaleShape};
use crate::registry::{CallbackResult, ElementContext};
use crate::parser::ElementParser;
use std::collections::BTreeMap;
use tracing::warn;
use voldex_core::VR;
use voldex_encoding::decode::primitive;

/// The per-instance geometric metadata used to order slices into a
/// volume. Fields are populated incrementally as their tags arrive;
/// an absent field was never seen for that instance.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OrderingRecord {
    /// Instance Number (0020,0013)
    pub slice_number: Option<i32>,
    /// Slice Location (0020,1041)
    pub slice_location: Option<f32>,
    /// Image Position Patient (0020,0032)
    pub position: Option<[f32; 3]>,
    /// Image Orientation Patient (0020,0037): row then column cosines
    pub orientation: Option<[f32; 6]>,
}

/// Patient and study level metadata, copied from the last file that
/// carried the respective tags.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PatientRecord {
    /// Patient Name (0010,0010)
    pub name: String,
    /// Patient ID (0010,0020)
    pub id: String,
    /// Patient Sex (0010,0040)
    pub sex: String,
    /// Patient Age (0010,1010)
    pub age: String,
    /// Study Date (0008,0020)
    pub study_date: String,
    /// Modality (0008,0060)
    pub modality: String,
    /// Manufacturer (0008,0070)
    pub manufacturer: String,
    /// Institution Name (0008,0080)
    pub institution: String,
    /// Manufacturer Model Name (0008,1090)
    pub model: String,
}

/// Everything indexed under one series UID.
///
/// `contours` and `referenced_instances` are maintained in lock step:
/// position `k` of the referenced instance list names the image that
/// contour `k` was drawn on.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeriesRecord {
    /// instance UIDs in parse order
    pub instances: Vec<String>,
    /// structure set contours, each a flat (x, y, z, x, y, z, …) run
    pub contours: Vec<Vec<f32>>,
    /// referenced instance UIDs, position-paired with `contours`
    pub referenced_instances: Vec<String>,
}

/// The stateful consumer that turns element events into the series
/// index, the slice orderings, the contour lists, and the rescaled
/// pixel buffer.
#[derive(Debug, Default)]
pub struct DatasetIndexer {
    // per-file parse state
    current_series: String,
    current_instance: String,
    shape: RescaleShape,
    pixel_spacing: [f32; 3],
    photometric_interpretation: String,
    transfer_syntax_uid: String,

    // cross-file indices
    series: BTreeMap<String, SeriesRecord>,
    series_order: Vec<String>,
    instance_to_series: BTreeMap<String, String>,
    instance_to_file: BTreeMap<String, String>,
    ordering: BTreeMap<String, OrderingRecord>,
    patient: PatientRecord,

    // per-file image payload
    image: Option<ImageBuffer>,
}

impl DatasetIndexer {
    /// Create an empty indexer.
    pub fn new() -> Self {
        DatasetIndexer {
            pixel_spacing: [1.0, 1.0, 1.0],
            ..DatasetIndexer::default()
        }
    }

    /// Register the standard tag callbacks on the given parser: UIDs,
    /// slice ordering tags, acquisition attributes, structure set
    /// contours, and patient metadata. Pixel data handling is separate;
    /// see [`DatasetIndexer::register_pixel_callback`].
    pub fn register_callbacks(parser: &mut ElementParser<DatasetIndexer>) {
        parser
            .registry_mut()
            .register_file_start(|ix: &mut DatasetIndexer, _filename| ix.begin_file());

        parser.register((0x0002, 0x0010), VR::UI, |ix, ctx| ix.transfer_syntax(ctx));
        parser.register((0x0008, 0x0018), VR::UI, |ix, ctx| ix.instance_uid(ctx));
        parser.register((0x0020, 0x000E), VR::UI, |ix, ctx| ix.series_uid(ctx));
        parser.register((0x0020, 0x0013), VR::IS, |ix, ctx| ix.slice_number(ctx));
        parser.register((0x0020, 0x1041), VR::DS, |ix, ctx| ix.slice_location(ctx));
        parser.register((0x0020, 0x0032), VR::DS, |ix, ctx| ix.image_position(ctx));
        parser.register((0x0020, 0x0037), VR::DS, |ix, ctx| ix.image_orientation(ctx));
        parser.register((0x0028, 0x0100), VR::US, |ix, ctx| {
            ix.set_bits_allocated(ctx)
        });
        parser.register((0x0028, 0x0010), VR::US, |ix, ctx| ix.rows(ctx));
        parser.register((0x0028, 0x0011), VR::US, |ix, ctx| ix.columns(ctx));
        parser.register((0x0028, 0x0030), VR::DS, |ix, ctx| ix.pixel_spacing(ctx));
        parser.register((0x0018, 0x0050), VR::DS, |ix, ctx| ix.slice_thickness(ctx));
        parser.register((0x0028, 0x0103), VR::US, |ix, ctx| {
            ix.pixel_representation(ctx)
        });
        parser.register((0x0028, 0x0004), VR::CS, |ix, ctx| {
            ix.photometric_interpretation(ctx)
        });
        parser.register((0x0028, 0x1052), VR::DS, |ix, ctx| ix.rescale_offset(ctx));
        parser.register((0x0028, 0x1053), VR::DS, |ix, ctx| ix.rescale_slope(ctx));

        // structure set contours; the container sequences themselves
        // carry no state but are registered so they do not land in the
        // default dump
        parser.register((0x3006, 0x0016), VR::SQ, |ix, ctx| {
            ix.contour_image_sequence(ctx)
        });
        parser.register((0x3006, 0x0039), VR::SQ, |_, _| Ok(()));
        parser.register((0x3006, 0x0040), VR::SQ, |_, _| Ok(()));
        parser.register((0x3006, 0x0042), VR::CS, |_, _| Ok(()));
        parser.register((0x3006, 0x0046), VR::IS, |ix, ctx| {
            ix.number_of_contour_points(ctx)
        });
        parser.register((0x3006, 0x0050), VR::DS, |ix, ctx| ix.contour_data(ctx));
        parser.register((0x0008, 0x1155), VR::UI, |ix, ctx| {
            ix.referenced_instance_uid(ctx)
        });

        // patient and study metadata
        parser.register((0x0010, 0x0010), VR::PN, |ix, ctx| {
            ix.patient.name = primitive::read_str(ctx.bytes);
            Ok(())
        });
        parser.register((0x0010, 0x0020), VR::LO, |ix, ctx| {
            ix.patient.id = primitive::read_str(ctx.bytes);
            Ok(())
        });
        parser.register((0x0010, 0x0040), VR::CS, |ix, ctx| {
            ix.patient.sex = primitive::read_str(ctx.bytes);
            Ok(())
        });
        parser.register((0x0010, 0x1010), VR::AS, |ix, ctx| {
            ix.patient.age = primitive::read_str(ctx.bytes);
            Ok(())
        });
        parser.register((0x0008, 0x0020), VR::DA, |ix, ctx| {
            ix.patient.study_date = primitive::read_str(ctx.bytes);
            Ok(())
        });
        parser.register((0x0008, 0x0060), VR::CS, |ix, ctx| {
            ix.patient.modality = primitive::read_str(ctx.bytes);
            Ok(())
        });
        parser.register((0x0008, 0x0070), VR::LO, |ix, ctx| {
            ix.patient.manufacturer = primitive::read_str(ctx.bytes);
            Ok(())
        });
        parser.register((0x0008, 0x0080), VR::LO, |ix, ctx| {
            ix.patient.institution = primitive::read_str(ctx.bytes);
            Ok(())
        });
        parser.register((0x0008, 0x1090), VR::LO, |ix, ctx| {
            ix.patient.model = primitive::read_str(ctx.bytes);
            Ok(())
        });
    }

    /// Register the pixel data callback on the given parser. Separate
    /// from the standard callbacks so that metadata-only scans skip
    /// the allocation and rescale work entirely.
    pub fn register_pixel_callback(parser: &mut ElementParser<DatasetIndexer>) {
        parser.register((0x7FE0, 0x0010), VR::OW, |ix, ctx| ix.pixel_data(ctx));
    }

    /// Reset the per-file parse state. Invoked through the file-start
    /// callback before any element of a new file is dispatched.
    fn begin_file(&mut self) {
        self.current_series.clear();
        self.current_instance.clear();
        self.shape = RescaleShape::default();
        self.pixel_spacing = [1.0, 1.0, 1.0];
        self.photometric_interpretation.clear();
        self.transfer_syntax_uid.clear();
    }

    fn transfer_syntax(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.transfer_syntax_uid = primitive::read_str(ctx.bytes);
        Ok(())
    }

    fn instance_uid(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let uid = primitive::read_str(ctx.bytes);
        self.instance_to_file
            .insert(uid.clone(), ctx.filename.to_string());

        // a file that emitted its Series UID first appended a
        // placeholder binding; fill it in now that the instance is
        // known
        if !self.current_series.is_empty() {
            if let Some(record) = self.series.get_mut(&self.current_series) {
                if let Some(last) = record.instances.last_mut() {
                    if last.is_empty() {
                        *last = uid.clone();
                        self.instance_to_series
                            .insert(uid.clone(), self.current_series.clone());
                    }
                }
            }
        }
        self.current_instance = uid;
        Ok(())
    }

    fn series_uid(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let uid = primitive::read_str(ctx.bytes);

        // bind whatever instance is current at this moment; in a
        // well-formed file the instance tag has already arrived
        if !self.current_instance.is_empty() {
            self.instance_to_series
                .insert(self.current_instance.clone(), uid.clone());
        }
        if !self.series.contains_key(&uid) {
            self.series_order.push(uid.clone());
        }
        self.series
            .entry(uid.clone())
            .or_default()
            .instances
            .push(self.current_instance.clone());

        self.current_series = uid;
        Ok(())
    }

    fn slice_number(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let n = primitive::parse_is(ctx.bytes)?;
        self.ordering
            .entry(self.current_instance.clone())
            .or_default()
            .slice_number = Some(n);
        Ok(())
    }

    fn slice_location(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let loc = primitive::parse_ds(ctx.bytes)?;
        self.ordering
            .entry(self.current_instance.clone())
            .or_default()
            .slice_location = Some(loc);
        Ok(())
    }

    fn image_position(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let v = primitive::parse_ds_n(ctx.bytes, 3)?;
        self.ordering
            .entry(self.current_instance.clone())
            .or_default()
            .position = Some([v[0], v[1], v[2]]);
        Ok(())
    }

    fn image_orientation(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let v = primitive::parse_ds_n(ctx.bytes, 6)?;
        self.ordering
            .entry(self.current_instance.clone())
            .or_default()
            .orientation = Some([v[0], v[1], v[2], v[3], v[4], v[5]]);
        Ok(())
    }

    fn set_bits_allocated(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.shape.bits_allocated = primitive::read_us(ctx.bytes, ctx.endianness)?;
        Ok(())
    }

    fn rows(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.shape.dims[1] = u32::from(primitive::read_us(ctx.bytes, ctx.endianness)?);
        Ok(())
    }

    fn columns(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.shape.dims[0] = u32::from(primitive::read_us(ctx.bytes, ctx.endianness)?);
        Ok(())
    }

    fn pixel_spacing(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let v = primitive::parse_ds_list(ctx.bytes)?;
        match v.as_slice() {
            [both] => {
                self.pixel_spacing[0] = *both;
                self.pixel_spacing[1] = *both;
            }
            [row, col, ..] => {
                self.pixel_spacing[0] = *row;
                self.pixel_spacing[1] = *col;
            }
            [] => {}
        }
        Ok(())
    }

    fn slice_thickness(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.pixel_spacing[2] = primitive::parse_ds(ctx.bytes)?;
        Ok(())
    }

    fn pixel_representation(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.shape.pixel_representation = primitive::read_us(ctx.bytes, ctx.endianness)?;
        Ok(())
    }

    fn photometric_interpretation(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.photometric_interpretation = primitive::read_str(ctx.bytes);
        // colour interpretations carry three samples per pixel
        self.shape.components = if self.photometric_interpretation.starts_with("RGB")
            || self.photometric_interpretation.starts_with("YBR")
        {
            3
        } else {
            1
        };
        Ok(())
    }

    fn rescale_offset(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.shape.offset = primitive::parse_ds(ctx.bytes)?;
        Ok(())
    }

    fn rescale_slope(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        self.shape.slope = primitive::parse_ds(ctx.bytes)?;
        Ok(())
    }

    fn pixel_data(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        // the old buffer is dropped before the new one is published
        self.image = None;
        let buffer = if ctx.encapsulated {
            ImageBuffer::Encapsulated(ctx.bytes.to_vec())
        } else {
            pixeldata::rescale(ctx.bytes, ctx.endianness, &self.shape, ctx.len)
        };
        self.image = Some(buffer);
        Ok(())
    }

    fn contour_image_sequence(&mut self, _ctx: &ElementContext<'_>) -> CallbackResult {
        // each contour image sequence opens one new contour
        self.series
            .entry(self.current_series.clone())
            .or_default()
            .contours
            .push(Vec::new());
        Ok(())
    }

    fn number_of_contour_points(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let n = primitive::parse_is(ctx.bytes)?;
        let record = self.series.entry(self.current_series.clone()).or_default();
        match record.contours.last_mut() {
            None => warn!(
                "{}: number of contour points (3006,0046) without a contour image sequence (3006,0016)",
                ctx.filename
            ),
            Some(contour) if !contour.is_empty() => warn!(
                "{}: number of contour points (3006,0046) for an already sized contour",
                ctx.filename
            ),
            Some(contour) => contour.resize(3 * n.max(0) as usize, 0.0),
        }
        Ok(())
    }

    fn contour_data(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let points = primitive::parse_ds_list(ctx.bytes)?;
        let record = self.series.entry(self.current_series.clone()).or_default();
        match record.contours.last_mut() {
            None => warn!(
                "{}: contour data (3006,0050) without a contour image sequence (3006,0016)",
                ctx.filename
            ),
            Some(contour) if contour.is_empty() => warn!(
                "{}: contour data (3006,0050) without a preceding number of contour points (3006,0046)",
                ctx.filename
            ),
            Some(contour) => {
                if points.len() != contour.len() {
                    warn!(
                        "{}: contour data holds {} coordinates, expected {}",
                        ctx.filename,
                        points.len(),
                        contour.len()
                    );
                }
                let n = points.len().min(contour.len());
                contour[..n].copy_from_slice(&points[..n]);
            }
        }
        Ok(())
    }

    fn referenced_instance_uid(&mut self, ctx: &ElementContext<'_>) -> CallbackResult {
        let uid = primitive::read_str(ctx.bytes);
        self.series
            .entry(self.current_series.clone())
            .or_default()
            .referenced_instances
            .push(uid);
        Ok(())
    }

    /// The rescaled image payload of the most recently parsed file
    /// that carried pixel data.
    pub fn image_buffer(&self) -> Option<&ImageBuffer> {
        self.image.as_ref()
    }

    /// Take ownership of the image payload, leaving the indexer
    /// without one.
    pub fn take_image_buffer(&mut self) -> Option<ImageBuffer> {
        self.image.take()
    }

    /// The image dimensions of the current file as columns, rows.
    pub fn dimensions(&self) -> [u32; 2] {
        self.shape.dims
    }

    /// The bits allocated per sample in the current file.
    pub fn bits_allocated(&self) -> u16 {
        self.shape.bits_allocated
    }

    /// The pixel spacing of the current file: row, column, and slice
    /// spacing in millimetres.
    pub fn pixel_spacing_mm(&self) -> [f32; 3] {
        self.pixel_spacing
    }

    /// The photometric interpretation of the current file.
    pub fn photometric(&self) -> &str {
        &self.photometric_interpretation
    }

    /// The transfer syntax UID declared by the current file.
    pub fn transfer_syntax_uid(&self) -> &str {
        &self.transfer_syntax_uid
    }

    /// The accumulated patient and study metadata.
    pub fn patient(&self) -> &PatientRecord {
        &self.patient
    }

    /// Wipe every index and the image payload. Registered callbacks
    /// live in the parser's registry and are unaffected.
    pub fn clear(&mut self) {
        self.series.clear();
        self.series_order.clear();
        self.instance_to_series.clear();
        self.instance_to_file.clear();
        self.ordering.clear();
        self.patient = PatientRecord::default();
        self.current_series.clear();
        self.current_instance.clear();
        self.image = None;
    }

    pub(crate) fn series_map(&self) -> &BTreeMap<String, SeriesRecord> {
        &self.series
    }

    pub(crate) fn series_order(&self) -> &[String] {
        &self.series_order
    }

    pub(crate) fn instance_file_map(&self) -> &BTreeMap<String, String> {
        &self.instance_to_file
    }

    pub(crate) fn ordering_map(&self) -> &BTreeMap<String, OrderingRecord> {
        &self.ordering
    }

    pub(crate) fn instance_series_map(&self) -> &BTreeMap<String, String> {
        &self.instance_to_series
    }
}
