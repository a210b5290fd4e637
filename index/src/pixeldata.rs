//! Pixel data rescaling.
//!
//! Raw pixel samples are mapped through the affine rescale transform
//! `y = slope * x + offset` into a freshly allocated output buffer.
//! When slope and offset are both whole numbers the transform cannot
//! introduce fractions, so the output keeps the input's integer width;
//! otherwise the output widens to `f32`.

use byteordered::Endianness;
use voldex_core::VR;
use voldex_encoding::decode::primitive;

/// The rescaled image payload of one file.
///
/// The buffer is exclusively owned; parsing a new pixel data element
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageBuffer {
    /// 8-bit samples, slope/offset integer valued.
    U8(Vec<u8>),
    /// 16-bit samples, slope/offset integer valued.
    I16(Vec<i16>),
    /// Widened samples from a fractional rescale.
    F32(Vec<f32>),
    /// Encapsulated (compressed) fragments, stored as-is.
    /// Decompression is delegated to the consumer.
    Encapsulated(Vec<u8>),
}

impl ImageBuffer {
    /// The value representation code describing the buffer's element
    /// type, in the tradition of the pixel data element itself.
    pub fn vr(&self) -> VR {
        match self {
            ImageBuffer::U8(_) | ImageBuffer::Encapsulated(_) => VR::OB,
            ImageBuffer::I16(_) => VR::OW,
            ImageBuffer::F32(_) => VR::FL,
        }
    }

    /// The number of samples held (bytes, for encapsulated payloads).
    pub fn sample_count(&self) -> usize {
        match self {
            ImageBuffer::U8(samples) => samples.len(),
            ImageBuffer::I16(samples) => samples.len(),
            ImageBuffer::F32(samples) => samples.len(),
            ImageBuffer::Encapsulated(bytes) => bytes.len(),
        }
    }

    /// The buffer length in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            ImageBuffer::U8(samples) => samples.len(),
            ImageBuffer::I16(samples) => samples.len() * 2,
            ImageBuffer::F32(samples) => samples.len() * 4,
            ImageBuffer::Encapsulated(bytes) => bytes.len(),
        }
    }
}

/// The acquisition attributes that shape the rescale operation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RescaleShape {
    /// image dimensions as columns, rows
    pub dims: [u32; 2],
    /// samples per pixel
    pub components: u32,
    /// bits allocated per sample (8 or 16)
    pub bits_allocated: u16,
    /// 0 for unsigned samples, 1 for signed
    pub pixel_representation: u16,
    /// rescale slope
    pub slope: f32,
    /// rescale offset (intercept)
    pub offset: f32,
}

impl Default for RescaleShape {
    fn default() -> Self {
        RescaleShape {
            dims: [0, 0],
            components: 1,
            bits_allocated: 8,
            pixel_representation: 0,
            slope: 1.0,
            offset: 0.0,
        }
    }
}

impl RescaleShape {
    /// Whether the rescale transform produces fractional values:
    /// true when slope or offset differs from its truncation.
    pub fn is_fractional(&self) -> bool {
        self.slope.trunc() != self.slope || self.offset.trunc() != self.offset
    }

    fn sample_size(&self) -> usize {
        if self.bits_allocated <= 8 {
            1
        } else {
            2
        }
    }

    /// The number of samples to read: the declared pixel count, except
    /// when the element length is shorter. A declared element length of
    /// 0xFFFF comes from writers that leave the OW length undefined; in
    /// that case the computed pixel count alone decides.
    fn sample_limit(&self, declared_len: u32, available: usize) -> usize {
        let declared = (self.dims[0] as usize) * (self.dims[1] as usize) * self.components as usize;
        let from_value = available / self.sample_size();
        if declared_len == 0xFFFF {
            declared.min(from_value)
        } else {
            declared.min((declared_len as usize / self.sample_size()).min(from_value))
        }
    }
}

/// Rescale the raw pixel samples of one element into a new buffer.
///
/// `declared_len` is the element's declared length in bytes; `bytes`
/// holds the value actually read, in the byte order given.
pub fn rescale(
    bytes: &[u8],
    endianness: Endianness,
    shape: &RescaleShape,
    declared_len: u32,
) -> ImageBuffer {
    let n = shape.sample_limit(declared_len, bytes.len());
    let slope = shape.slope;
    let offset = shape.offset;

    if shape.is_fractional() {
        let mut out = Vec::with_capacity(n);
        if shape.sample_size() == 1 {
            out.extend(
                bytes[..n]
                    .iter()
                    .map(|&x| slope * f32::from(x) + offset),
            );
        } else if shape.pixel_representation == 1 {
            let samples = primitive::read_ss_all(&bytes[..n * 2], endianness);
            out.extend(samples.iter().map(|&x| slope * f32::from(x) + offset));
        } else {
            let samples = primitive::read_us_all(&bytes[..n * 2], endianness);
            out.extend(samples.iter().map(|&x| slope * f32::from(x) + offset));
        }
        ImageBuffer::F32(out)
    } else if shape.sample_size() == 1 {
        let out = bytes[..n]
            .iter()
            .map(|&x| (slope * f32::from(x) + offset) as u8)
            .collect();
        ImageBuffer::U8(out)
    } else {
        let samples = if shape.pixel_representation == 1 {
            primitive::read_ss_all(&bytes[..n * 2], endianness)
        } else {
            primitive::read_us_all(&bytes[..n * 2], endianness)
                .into_iter()
                .map(|x| x as i16)
                .collect()
        };
        let out = samples
            .iter()
            .map(|&x| (slope * f32::from(x) + offset) as i16)
            .collect();
        ImageBuffer::I16(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_16(signed: bool) -> RescaleShape {
        RescaleShape {
            dims: [2, 2],
            components: 1,
            bits_allocated: 16,
            pixel_representation: u16::from(signed),
            slope: 1.0,
            offset: 0.0,
        }
    }

    #[test]
    fn integer_rescale_keeps_width() {
        // CT style: 16-bit samples, slope 1, offset -1024
        let mut shape = shape_16(false);
        shape.offset = -1024.0;
        let raw: Vec<u8> = [2048u16, 1024, 0, 4095]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let out = rescale(&raw, Endianness::Little, &shape, raw.len() as u32);
        assert_eq!(out.vr(), VR::OW);
        assert_eq!(out, ImageBuffer::I16(vec![1024, 0, -1024, 3071]));
    }

    #[test]
    fn fractional_rescale_widens_to_float() {
        let shape = RescaleShape {
            dims: [4, 1],
            slope: 1.5,
            ..RescaleShape::default()
        };
        let raw = [0u8, 1, 2, 100];
        let out = rescale(&raw, Endianness::Little, &shape, 4);
        assert_eq!(out.vr(), VR::FL);
        assert_eq!(out, ImageBuffer::F32(vec![0.0, 1.5, 3.0, 150.0]));
    }

    #[test]
    fn undefined_ow_length_uses_computed_count() {
        // length 0xFFFF: the declared dimensions decide
        let shape = shape_16(false);
        let raw: Vec<u8> = (0u16..4).flat_map(|v| v.to_le_bytes()).collect();
        let out = rescale(&raw, Endianness::Little, &shape, 0xFFFF);
        assert_eq!(out.sample_count(), 4);
    }

    #[test]
    fn short_element_clamps_sample_count() {
        let shape = shape_16(false);
        // 4 samples declared by the dimensions, only 2 present
        let raw: Vec<u8> = (0u16..2).flat_map(|v| v.to_le_bytes()).collect();
        let out = rescale(&raw, Endianness::Little, &shape, raw.len() as u32);
        assert_eq!(out, ImageBuffer::I16(vec![0, 1]));
    }

    #[test]
    fn big_endian_samples_reassemble() {
        let mut shape = shape_16(false);
        shape.dims = [1, 1];
        let raw = 16u16.to_be_bytes();
        let out = rescale(&raw, Endianness::Big, &shape, 2);
        assert_eq!(out, ImageBuffer::I16(vec![16]));
    }

    #[test]
    fn inverse_rescale_is_bit_exact_for_integers() {
        let mut shape = shape_16(true);
        shape.slope = 2.0;
        shape.offset = -100.0;
        let raw_samples: [i16; 4] = [-32, 0, 150, 2047];
        let raw: Vec<u8> = raw_samples.iter().flat_map(|v| v.to_le_bytes()).collect();
        let out = rescale(&raw, Endianness::Little, &shape, raw.len() as u32);
        let ImageBuffer::I16(samples) = out else {
            panic!("expected I16 output")
        };
        for (y, x) in samples.iter().zip(raw_samples) {
            assert_eq!(((y - shape.offset as i16) as f32 / shape.slope) as i16, x);
        }
    }
}
