//! Compiled transfer syntax descriptors.
//!
//! A transfer syntax fully determines how the data set portion of a
//! file is encoded: the byte order of binary fields, whether value
//! representations are written explicitly, and whether the pixel data
//! is encapsulated in compressed fragments.

use byteordered::Endianness;

/// A descriptor of a single recognised transfer syntax.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransferSyntax {
    /// The unique identifier of this transfer syntax.
    pub uid: &'static str,
    /// A human readable name.
    pub name: &'static str,
    /// The byte order of binary fields in the data set.
    pub endianness: Endianness,
    /// Whether value representations are written explicitly.
    pub explicit_vr: bool,
    /// Whether pixel data is encapsulated in compressed fragments.
    /// Decompression is delegated; the fragments are stored as-is.
    pub encapsulated: bool,
}

impl TransferSyntax {
    const fn new(
        uid: &'static str,
        name: &'static str,
        endianness: Endianness,
        explicit_vr: bool,
        encapsulated: bool,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            endianness,
            explicit_vr,
            encapsulated,
        }
    }
}

/// Implicit VR Little Endian: the default transfer syntax for DICOM.
pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
    false,
);

/// Explicit VR Little Endian.
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Endianness::Little,
    true,
    false,
);

/// Explicit VR Big Endian.
pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
    false,
);

/// GE private syntax with implicit VR and big endian image data.
pub const GE_IMPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.113619.5.2",
    "GE Private Implicit VR Big Endian",
    Endianness::Big,
    false,
    false,
);

/// JPEG Baseline (Process 1), lossy 8-bit; pixel data is encapsulated.
pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    Endianness::Little,
    true,
    true,
);

/// JPEG Extended (Process 2 & 4), lossy 12-bit; pixel data is
/// encapsulated.
pub const JPEG_EXTENDED: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.51",
    "JPEG Extended (Process 2 & 4)",
    Endianness::Little,
    true,
    true,
);

/// JPEG Lossless, Non-Hierarchical, First-Order Prediction; pixel data
/// is encapsulated.
pub const JPEG_LOSSLESS: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.70",
    "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
    Endianness::Little,
    true,
    true,
);

/// All recognised transfer syntaxes.
pub static RECOGNISED: &[TransferSyntax] = &[
    IMPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_BIG_ENDIAN,
    GE_IMPLICIT_VR_BIG_ENDIAN,
    JPEG_BASELINE,
    JPEG_EXTENDED,
    JPEG_LOSSLESS,
];

/// Look up a transfer syntax by its unique identifier.
///
/// Trailing NUL padding and whitespace in the UID are ignored, as UI
/// values are even-padded on file.
pub fn lookup(uid: &str) -> Option<&'static TransferSyntax> {
    let uid = uid.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    RECOGNISED.iter().find(|ts| ts.uid == uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_trims_padding() {
        let ts = lookup("1.2.840.10008.1.2.1\0").unwrap();
        assert_eq!(ts.name, "Explicit VR Little Endian");
        assert!(ts.explicit_vr);
        assert_eq!(ts.endianness, Endianness::Little);

        assert!(lookup("1.9.999").is_none());
    }

    #[test]
    fn ge_private_is_implicit_big_endian() {
        let ts = lookup("1.2.840.113619.5.2").unwrap();
        assert!(!ts.explicit_vr);
        assert_eq!(ts.endianness, Endianness::Big);
        assert!(!ts.encapsulated);
    }

    #[test]
    fn jpeg_variants_are_encapsulated() {
        for uid in [
            "1.2.840.10008.1.2.4.50",
            "1.2.840.10008.1.2.4.51",
            "1.2.840.10008.1.2.4.70",
        ] {
            let ts = lookup(uid).unwrap();
            assert!(ts.encapsulated, "{} should be encapsulated", uid);
            assert!(ts.explicit_vr);
        }
    }
}
