//! Fixed width numeric leaf values.

use std::fmt;

use crate::errors::DecodeError;
use crate::protocol::{PacketReader, PacketWriter};

use super::Type;

/// The current value of a numeric leaf, tagged with its wire type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Float(f32),
    Double(f64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
}

/// A Rust number that can live in a numeric leaf
pub trait NumericValue: Copy + Send + Sync + 'static {
    /// The wire type of this number
    const TYPE: Type;

    const ZERO: Self;

    fn into_number(self) -> Number;

    /// Extracts the value if `number` has exactly this type
    fn from_number(number: Number) -> Option<Self>;
}

macro_rules! numeric_value {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl NumericValue for $t {
                const TYPE: Type = Type::$variant;

                const ZERO: Self = 0 as $t;

                fn into_number(self) -> Number {
                    Number::$variant(self)
                }

                fn from_number(number: Number) -> Option<Self> {
                    match number {
                        Number::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl From<$t> for Number {
                fn from(v: $t) -> Number {
                    Number::$variant(v)
                }
            }
        )*
    };
}

numeric_value! {
    f32 => Float,
    f64 => Double,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
}

impl Number {
    /// The zero value of a numeric type, `None` for records and strings
    pub fn zero(t: Type) -> Option<Number> {
        Some(match t {
            Type::Float => Number::Float(0.0),
            Type::Double => Number::Double(0.0),
            Type::Uint8 => Number::Uint8(0),
            Type::Uint16 => Number::Uint16(0),
            Type::Uint32 => Number::Uint32(0),
            Type::Uint64 => Number::Uint64(0),
            Type::Int8 => Number::Int8(0),
            Type::Int16 => Number::Int16(0),
            Type::Int32 => Number::Int32(0),
            Type::Int64 => Number::Int64(0),
            Type::Record | Type::String => return None,
        })
    }

    pub fn part_type(&self) -> Type {
        match self {
            Number::Float(_) => Type::Float,
            Number::Double(_) => Type::Double,
            Number::Uint8(_) => Type::Uint8,
            Number::Uint16(_) => Type::Uint16,
            Number::Uint32(_) => Type::Uint32,
            Number::Uint64(_) => Type::Uint64,
            Number::Int8(_) => Type::Int8,
            Number::Int16(_) => Type::Int16,
            Number::Int32(_) => Type::Int32,
            Number::Int64(_) => Type::Int64,
        }
    }

    /// Writes the raw little-endian bytes
    pub(crate) fn write(&self, writer: &mut PacketWriter) {
        match *self {
            Number::Float(v) => writer.write_number(v),
            Number::Double(v) => writer.write_number(v),
            Number::Uint8(v) => writer.write_number(v),
            Number::Uint16(v) => writer.write_number(v),
            Number::Uint32(v) => writer.write_number(v),
            Number::Uint64(v) => writer.write_number(v),
            Number::Int8(v) => writer.write_number(v),
            Number::Int16(v) => writer.write_number(v),
            Number::Int32(v) => writer.write_number(v),
            Number::Int64(v) => writer.write_number(v),
        }
    }

    /// Reads a value of the same type as `self`
    pub(crate) fn read_same(&self, reader: &mut PacketReader) -> Result<Number, DecodeError> {
        Ok(match self {
            Number::Float(_) => Number::Float(reader.get_number()?),
            Number::Double(_) => Number::Double(reader.get_number()?),
            Number::Uint8(_) => Number::Uint8(reader.get_number()?),
            Number::Uint16(_) => Number::Uint16(reader.get_number()?),
            Number::Uint32(_) => Number::Uint32(reader.get_number()?),
            Number::Uint64(_) => Number::Uint64(reader.get_number()?),
            Number::Int8(_) => Number::Int8(reader.get_number()?),
            Number::Int16(_) => Number::Int16(reader.get_number()?),
            Number::Int32(_) => Number::Int32(reader.get_number()?),
            Number::Int64(_) => Number::Int64(reader.get_number()?),
        })
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Every width prints as a number, 8 bit values included
        match self {
            Number::Float(v) => write!(f, "{v}"),
            Number::Double(v) => write!(f, "{v}"),
            Number::Uint8(v) => write!(f, "{v}"),
            Number::Uint16(v) => write!(f, "{v}"),
            Number::Uint32(v) => write!(f, "{v}"),
            Number::Uint64(v) => write!(f, "{v}"),
            Number::Int8(v) => write!(f, "{v}"),
            Number::Int16(v) => write!(f, "{v}"),
            Number::Int32(v) => write!(f, "{v}"),
            Number::Int64(v) => write!(f, "{v}"),
        }
    }
}
