use std::{
    any::TypeId,
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use crate::foundation::error::{ReprError, ReprResult};

/// Stable identity of one representation kind.
///
/// Equality and hashing use only the [`TypeId`]; the type name is carried for diagnostics and
/// for a deterministic ordering when ranking candidates.
#[derive(Clone, Copy)]
pub struct ReprKind {
    id: TypeId,
    name: &'static str,
}

impl ReprKind {
    /// Kind tag for the concrete type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Underlying type identity.
    pub fn type_id(self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(self) -> &'static str {
        self.name
    }

    /// Type name with module paths stripped, e.g. `ImageRam<u8>`.
    pub fn short_name(self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut segment = String::new();
        for ch in self.name.chars() {
            match ch {
                ':' => segment.clear(),
                '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                    out.push_str(&segment);
                    segment.clear();
                    out.push(ch);
                }
                _ => segment.push(ch),
            }
        }
        out.push_str(&segment);
        out
    }
}

impl PartialEq for ReprKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ReprKind {}

impl Hash for ReprKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ReprKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReprKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for ReprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReprKind({})", self.short_name())
    }
}

impl fmt::Display for ReprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

impl serde::Serialize for ReprKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.short_name())
    }
}

/// Ranking hint: a larger value means cheaper to read from or more capable.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
)]
pub struct Priority(pub u32);

impl Priority {
    /// Disk-backed stores.
    pub const DISK: Self = Self(0);
    /// Host memory arrays.
    pub const RAM: Self = Self(100);
    /// Device compute buffers.
    pub const COMPUTE: Self = Self(200);
    /// Device textures.
    pub const TEXTURE: Self = Self(300);
}

/// Numeric format of one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SampleFormat {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// 32-bit float.
    F32,
}

impl SampleFormat {
    /// Size of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F32 => 4,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::F32 => "f32",
        })
    }
}

/// Scalar sample type storable in host arrays and device buffers.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Format tag matching this type.
    const FORMAT: SampleFormat;

    /// Append the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode one sample from exactly [`SampleFormat::bytes_per_sample`] bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Decode a luminance plane from a decoded image.
    fn luma_from_image(img: &image::DynamicImage) -> Vec<Self>;
}

impl Sample for u8 {
    const FORMAT: SampleFormat = SampleFormat::U8;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn luma_from_image(img: &image::DynamicImage) -> Vec<Self> {
        img.to_luma8().into_raw()
    }
}

impl Sample for u16 {
    const FORMAT: SampleFormat = SampleFormat::U16;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn luma_from_image(img: &image::DynamicImage) -> Vec<Self> {
        img.to_luma16().into_raw()
    }
}

impl Sample for f32 {
    const FORMAT: SampleFormat = SampleFormat::F32;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn luma_from_image(img: &image::DynamicImage) -> Vec<Self> {
        img.to_luma32f().into_raw()
    }
}

/// Encode samples as tightly packed little-endian bytes.
pub fn samples_to_le_bytes<T: Sample>(samples: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * T::FORMAT.bytes_per_sample());
    for &s in samples {
        s.write_le(&mut out);
    }
    out
}

/// Decode tightly packed little-endian bytes into samples.
pub fn samples_from_le_bytes<T: Sample>(bytes: &[u8]) -> ReprResult<Vec<T>> {
    let stride = T::FORMAT.bytes_per_sample();
    if bytes.len() % stride != 0 {
        return Err(ReprError::unsupported_format(format!(
            "{} bytes is not a whole number of {} samples",
            bytes.len(),
            T::FORMAT
        )));
    }
    Ok(bytes.chunks_exact(stride).map(T::read_le).collect())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
