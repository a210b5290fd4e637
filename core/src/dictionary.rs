//! A compact attribute dictionary covering the tags this project
//! interprets, used to resolve value representations under Implicit VR
//! and to label elements in diagnostic dumps.
//!
//! This is intentionally not the full standard data dictionary; elements
//! outside this table fall back to the `UN` representation and are still
//! carried through the parser unharmed.

use crate::header::{Tag, VR};

/// A single dictionary entry: the attribute tag, its declared value
/// representation, and a human readable description.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TagInfo {
    /// the attribute tag
    pub tag: Tag,
    /// the declared value representation
    pub vr: VR,
    /// a short human readable description
    pub description: &'static str,
}

/// The dictionary entries, in ascending tag order.
pub static DIAGNOSTIC_DICTIONARY: &[TagInfo] = &[
    TagInfo { tag: Tag(0x0002, 0x0002), vr: VR::UI, description: "Media Storage SOP Class UID" },
    TagInfo { tag: Tag(0x0002, 0x0003), vr: VR::UI, description: "Media Storage SOP Instance UID" },
    TagInfo { tag: Tag(0x0002, 0x0010), vr: VR::UI, description: "Transfer Syntax UID" },
    TagInfo { tag: Tag(0x0002, 0x0012), vr: VR::UI, description: "Implementation Class UID" },
    TagInfo { tag: Tag(0x0008, 0x0018), vr: VR::UI, description: "SOP Instance UID" },
    TagInfo { tag: Tag(0x0008, 0x0020), vr: VR::DA, description: "Study Date" },
    TagInfo { tag: Tag(0x0008, 0x0030), vr: VR::TM, description: "Study Time" },
    TagInfo { tag: Tag(0x0008, 0x0060), vr: VR::CS, description: "Modality" },
    TagInfo { tag: Tag(0x0008, 0x0070), vr: VR::LO, description: "Manufacturer" },
    TagInfo { tag: Tag(0x0008, 0x0080), vr: VR::LO, description: "Institution Name" },
    TagInfo { tag: Tag(0x0008, 0x1060), vr: VR::PN, description: "Performing Physician Name" },
    TagInfo { tag: Tag(0x0008, 0x1090), vr: VR::LO, description: "Manufacturer Model Name" },
    TagInfo { tag: Tag(0x0008, 0x1155), vr: VR::UI, description: "Referenced SOP Instance UID" },
    TagInfo { tag: Tag(0x0010, 0x0010), vr: VR::PN, description: "Patient Name" },
    TagInfo { tag: Tag(0x0010, 0x0020), vr: VR::LO, description: "Patient ID" },
    TagInfo { tag: Tag(0x0010, 0x0040), vr: VR::CS, description: "Patient Sex" },
    TagInfo { tag: Tag(0x0010, 0x1010), vr: VR::AS, description: "Patient Age" },
    TagInfo { tag: Tag(0x0018, 0x0050), vr: VR::DS, description: "Slice Thickness" },
    TagInfo { tag: Tag(0x0018, 0x0060), vr: VR::DS, description: "KVP" },
    TagInfo { tag: Tag(0x0018, 0x0088), vr: VR::DS, description: "Spacing Between Slices" },
    TagInfo { tag: Tag(0x0018, 0x1100), vr: VR::DS, description: "Reconstruction Diameter" },
    TagInfo { tag: Tag(0x0018, 0x1151), vr: VR::IS, description: "X-Ray Tube Current" },
    TagInfo { tag: Tag(0x0018, 0x1210), vr: VR::SH, description: "Convolution Kernel" },
    TagInfo { tag: Tag(0x0020, 0x000D), vr: VR::UI, description: "Study Instance UID" },
    TagInfo { tag: Tag(0x0020, 0x000E), vr: VR::UI, description: "Series Instance UID" },
    TagInfo { tag: Tag(0x0020, 0x0013), vr: VR::IS, description: "Instance Number" },
    TagInfo { tag: Tag(0x0020, 0x0032), vr: VR::DS, description: "Image Position (Patient)" },
    TagInfo { tag: Tag(0x0020, 0x0037), vr: VR::DS, description: "Image Orientation (Patient)" },
    TagInfo { tag: Tag(0x0020, 0x1041), vr: VR::DS, description: "Slice Location" },
    TagInfo { tag: Tag(0x0028, 0x0004), vr: VR::CS, description: "Photometric Interpretation" },
    TagInfo { tag: Tag(0x0028, 0x0010), vr: VR::US, description: "Rows" },
    TagInfo { tag: Tag(0x0028, 0x0011), vr: VR::US, description: "Columns" },
    TagInfo { tag: Tag(0x0028, 0x0030), vr: VR::DS, description: "Pixel Spacing" },
    TagInfo { tag: Tag(0x0028, 0x0100), vr: VR::US, description: "Bits Allocated" },
    TagInfo { tag: Tag(0x0028, 0x0103), vr: VR::US, description: "Pixel Representation" },
    TagInfo { tag: Tag(0x0028, 0x0120), vr: VR::US, description: "Pixel Padding Value" },
    TagInfo { tag: Tag(0x0028, 0x1052), vr: VR::DS, description: "Rescale Intercept" },
    TagInfo { tag: Tag(0x0028, 0x1053), vr: VR::DS, description: "Rescale Slope" },
    TagInfo { tag: Tag(0x3006, 0x0016), vr: VR::SQ, description: "Contour Image Sequence" },
    TagInfo { tag: Tag(0x3006, 0x0039), vr: VR::SQ, description: "ROI Contour Sequence" },
    TagInfo { tag: Tag(0x3006, 0x0040), vr: VR::SQ, description: "Contour Sequence" },
    TagInfo { tag: Tag(0x3006, 0x0042), vr: VR::CS, description: "Contour Geometric Type" },
    TagInfo { tag: Tag(0x3006, 0x0046), vr: VR::IS, description: "Number of Contour Points" },
    TagInfo { tag: Tag(0x3006, 0x0050), vr: VR::DS, description: "Contour Data" },
    TagInfo { tag: Tag(0x7FE0, 0x0010), vr: VR::OW, description: "Pixel Data" },
];

/// Look up the dictionary entry for the given tag.
pub fn by_tag(tag: Tag) -> Option<&'static TagInfo> {
    DIAGNOSTIC_DICTIONARY
        .binary_search_by_key(&tag, |info| info.tag)
        .ok()
        .map(|i| &DIAGNOSTIC_DICTIONARY[i])
}

/// Resolve the value representation for a tag read under Implicit VR.
///
/// Pixel Data (7FE0,0010) and Overlay Data (60xx,3000) resolve to OW;
/// anything outside the dictionary resolves to UN.
pub fn vr_of(tag: Tag) -> VR {
    if tag == Tag(0x7FE0, 0x0010) || (tag.group() >> 8 == 0x60 && tag.element() == 0x3000) {
        return VR::OW;
    }
    by_tag(tag).map(|info| info.vr).unwrap_or(VR::UN)
}
