//! Element kinds, decoded element values, and buffer usage flags.

use std::fmt;
use std::ops::BitOr;

use smallvec::SmallVec;

/// Semantic kind of the elements stored in a buffer.
///
/// The kind only affects inspection ([`ElementKind::decode`]); storage is
/// always raw bytes with a fixed per-buffer stride.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ElementKind {
    /// Opaque bytes with no declared interpretation.
    #[default]
    Misc,
    /// One `u32` per element.
    UInt,
    /// One `i32` per element.
    Int,
    /// One `f32` per element.
    Float,
    /// Three packed `f32` components per element.
    Float3,
    /// Four packed `f32` components per element.
    Float4,
}

impl ElementKind {
    /// Bytes required to decode one element of this kind.
    ///
    /// Returns `None` for [`ElementKind::Misc`], which has no fixed layout.
    pub fn byte_width(self) -> Option<usize> {
        match self {
            Self::Misc => None,
            Self::UInt | Self::Int | Self::Float => Some(4),
            Self::Float3 => Some(12),
            Self::Float4 => Some(16),
        }
    }

    /// Decode the leading bytes of `bytes` as one element of this kind.
    ///
    /// Values are read in native byte order. Returns `None` for `Misc`
    /// or when `bytes` is shorter than [`byte_width`](Self::byte_width).
    pub fn decode(self, bytes: &[u8]) -> Option<SmallVec<[ElementValue; 4]>> {
        let width = self.byte_width()?;
        if bytes.len() < width {
            return None;
        }
        let words = bytes[..width]
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]]);
        let values = match self {
            Self::Misc => return None,
            Self::UInt => words.map(|w| ElementValue::UInt(u32::from_ne_bytes(w))).collect(),
            Self::Int => words.map(|w| ElementValue::Int(i32::from_ne_bytes(w))).collect(),
            Self::Float | Self::Float3 | Self::Float4 => words
                .map(|w| ElementValue::Float(f32::from_ne_bytes(w)))
                .collect(),
        };
        Some(values)
    }
}

/// One decoded scalar component of an element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ElementValue {
    /// Unsigned 32-bit integer.
    UInt(u32),
    /// Signed 32-bit integer.
    Int(i32),
    /// 32-bit float, rendered with six decimal places.
    Float(f32),
}

impl fmt::Display for ElementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:.6}"),
        }
    }
}

/// Where a buffer's storage lives.
///
/// A small bitset: `CPU` storage is always present in practice, `DEVICE`
/// additionally asks the table to keep a device mirror allocated through
/// the injected [`DeviceMirror`](crate::DeviceMirror).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct UsageFlags(u8);

impl UsageFlags {
    /// Host-resident storage.
    pub const CPU: UsageFlags = UsageFlags(0b01);
    /// Device-resident mirror.
    pub const DEVICE: UsageFlags = UsageFlags(0b10);

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits, dropping unknown bits.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is also set in `self`.
    pub const fn contains(self, other: UsageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flags are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for UsageFlags {
    type Output = UsageFlags;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for UsageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Self::CPU), self.contains(Self::DEVICE)) {
            (true, true) => write!(f, "cpu|device"),
            (true, false) => write!(f, "cpu"),
            (false, true) => write!(f, "device"),
            (false, false) => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_widths() {
        assert_eq!(ElementKind::Misc.byte_width(), None);
        assert_eq!(ElementKind::UInt.byte_width(), Some(4));
        assert_eq!(ElementKind::Float3.byte_width(), Some(12));
        assert_eq!(ElementKind::Float4.byte_width(), Some(16));
    }

    #[test]
    fn decode_signed_int() {
        let bytes = (-5i32).to_ne_bytes();
        let values = ElementKind::Int.decode(&bytes).unwrap();
        assert_eq!(values.as_slice(), &[ElementValue::Int(-5)]);
    }

    #[test]
    fn decode_float3_reads_three_components() {
        let mut bytes = Vec::new();
        for v in [1.0f32, 2.5, -3.0] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        let values = ElementKind::Float3.decode(&bytes).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1], ElementValue::Float(2.5));
    }

    #[test]
    fn decode_short_input_is_none() {
        assert!(ElementKind::Float4.decode(&[0u8; 12]).is_none());
        assert!(ElementKind::Misc.decode(&[0u8; 16]).is_none());
    }

    #[test]
    fn float_renders_six_decimals() {
        assert_eq!(ElementValue::Float(1.5).to_string(), "1.500000");
        assert_eq!(ElementValue::UInt(9).to_string(), "9");
    }

    #[test]
    fn usage_flags_combine() {
        let both = UsageFlags::CPU | UsageFlags::DEVICE;
        assert!(both.contains(UsageFlags::CPU));
        assert!(both.contains(UsageFlags::DEVICE));
        assert!(!UsageFlags::CPU.contains(UsageFlags::DEVICE));
        assert!(UsageFlags::empty().is_empty());
        assert_eq!(UsageFlags::from_bits_truncate(0xff), both);
        assert_eq!(both.to_string(), "cpu|device");
    }
}
