use super::Endian;
use num_enum::{FromPrimitive, IntoPrimitive};
use num_traits::NumCast;
use std::fmt::Display;

mod data;
mod id;

pub use data::TagData;
pub use id::{TagId, RESOLUTION_UNIT_CM, SUBFILE_FULL, SUBFILE_REDUCED};

#[derive(Clone, Debug)]
pub struct Tag {
    pub code: u16,
    pub datatype: TagType,
    pub count: usize,
    pub data: Vec<u8>,
    pub endian: Endian,
}

impl Tag {
    pub fn new(code: u16, data: TagData, endian: Endian) -> Self {
        Self {
            code,
            datatype: data.tag_type(),
            count: data.len(),
            data: data.bytes(endian),
            endian,
        }
    }

    pub fn id(&self) -> Option<TagId> {
        TagId::try_from(self.code).ok()
    }

    pub fn values<T: NumCast>(&self) -> Option<Vec<T>> {
        let e = self.endian;
        match self.datatype {
            TagType::Byte | TagType::Ascii | TagType::Undefined => {
                self.data.iter().map(|v| T::from(*v)).collect()
            }
            TagType::Short => e.decode_all_to_primative::<2, u16, T>(&self.data),
            TagType::Long | TagType::Ifd => e.decode_all_to_primative::<4, u32, T>(&self.data),
            TagType::SByte => e.decode_all_to_primative::<1, i8, T>(&self.data),
            TagType::SShort => e.decode_all_to_primative::<2, i16, T>(&self.data),
            TagType::SLong => e.decode_all_to_primative::<4, i32, T>(&self.data),
            TagType::Float => e.decode_all_to_primative::<4, f32, T>(&self.data),
            TagType::Double => e.decode_all_to_primative::<8, f64, T>(&self.data),
            TagType::Long8 | TagType::Ifd8 => e.decode_all_to_primative::<8, u64, T>(&self.data),
            TagType::SLong8 => e.decode_all_to_primative::<8, i64, T>(&self.data),
            _ => None,
        }
    }

    pub fn value<T: NumCast + Copy>(&self) -> Option<T> {
        self.values().and_then(|v: Vec<T>| v.first().copied())
    }

    pub fn rationals(&self) -> Option<Vec<(u32, u32)>> {
        if self.datatype != TagType::Rational {
            return None;
        }
        let flat: Vec<u32> = self.endian.decode_all(&self.data)?;
        Some(flat.chunks_exact(2).map(|c| (c[0], c[1])).collect())
    }

    pub fn ascii(&self) -> Option<String> {
        if self.datatype != TagType::Ascii {
            return None;
        }
        let end = self
            .data
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.data.len());
        String::from_utf8(self.data[..end].to_vec()).ok()
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_string = match self.id() {
            Some(id) => format!("{id:?}"),
            None => format!("Unknown({})", self.code),
        };
        let mut value_string = match self.datatype {
            TagType::Ascii => self.ascii().unwrap_or_else(|| "?".to_string()),
            TagType::Rational => format!("{:?}", self.rationals().unwrap_or_default()),
            _ => match self.values::<f64>() {
                Some(values) if values.len() == 1 => format!("{}", values[0]),
                Some(values) => format!("{values:?}"),
                None => "?".to_string(),
            },
        };
        if value_string.len() > 100 {
            value_string.truncate(98);
            value_string.push_str("...");
        }
        write!(
            f,
            "{} {:?}[{}]: {}",
            id_string, self.datatype, self.count, value_string
        )
    }
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum TagType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
    Ifd = 13,
    Long8 = 16,
    SLong8 = 17,
    Ifd8 = 18,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

impl TagType {
    pub fn size_in_bytes(&self) -> usize {
        match self {
            TagType::Byte => 1,
            TagType::Ascii => 1,
            TagType::Short => 2,
            TagType::Long => 4,
            TagType::Rational => 8,
            TagType::SByte => 1,
            TagType::Undefined => 1,
            TagType::SShort => 2,
            TagType::SLong => 4,
            TagType::SRational => 8,
            TagType::Float => 4,
            TagType::Double => 8,
            TagType::Ifd => 4,
            TagType::Long8 => 8,
            TagType::SLong8 => 8,
            TagType::Ifd8 => 8,

            TagType::Unknown => 1,
        }
    }
}
