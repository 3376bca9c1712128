//! The self-describing schema and value tree.
//!
//! A [`Part`] is a named node that is either a record of other parts, a
//! string, or a fixed width number. The same tree describes a channel's
//! schema (names, types and shape) and holds its current values, so it can
//! be written to the wire in two ways:
//!
//! * **schema**: `[type][name\0]`, and for records `[u32 count][fields...]`
//! * **data**: only the values, in field order, with nothing in between
//!
//! A receiver turns schema bytes back into a tree with [`make_decoder`] and
//! then fills that tree from data bytes with
//! [`Part::read_data_from_message`].

use std::fmt;
use std::sync::Arc;

use crate::errors::{DecodeError, EncodeError};
use crate::protocol::{PacketReader, PacketWriter};

pub mod number;
pub mod pretty;
pub mod visitor;

pub use number::{Number, NumericValue};
pub use visitor::{flatten, FlatValue, Upcast, UpcastNumbersVisitor, Visitor};

/// How deep records may nest inside a decoded schema
pub const MAX_SCHEMA_DEPTH: usize = 32;

/// A function that produces the current value of a leaf
pub type Fetcher<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// The one byte type tag that starts every schema entry
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Record = 0,
    String = 1,

    Double = 3,
    Float = 4,

    Uint8 = 5,
    Uint16 = 6,
    Uint32 = 7,
    Uint64 = 8,

    Int8 = 9,
    Int16 = 10,
    Int32 = 11,
    Int64 = 12,
}

impl TryFrom<u8> for Type {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Type::Record,
            1 => Type::String,
            3 => Type::Double,
            4 => Type::Float,
            5 => Type::Uint8,
            6 => Type::Uint16,
            7 => Type::Uint32,
            8 => Type::Uint64,
            9 => Type::Int8,
            10 => Type::Int16,
            11 => Type::Int32,
            12 => Type::Int64,
            _ => return Err(DecodeError::UnknownType(tag)),
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Type::Record => "record",
            Type::String => "string",
            Type::Float => "float",
            Type::Double => "double",
            Type::Uint8 => "uint8",
            Type::Uint16 => "uint16",
            Type::Uint32 => "uint32",
            Type::Uint64 => "uint64",
            Type::Int8 => "int8",
            Type::Int16 => "int16",
            Type::Int32 => "int32",
            Type::Int64 => "int64",
        })
    }
}

/// A string leaf
#[derive(Clone, Default)]
pub struct StringLeaf {
    value: String,
    fetcher: Option<Fetcher<String>>,
}

/// A numeric leaf
#[derive(Clone)]
pub struct NumberLeaf {
    value: Number,
    fetcher: Option<Fetcher<Number>>,
}

/// What a [`Part`] is
#[derive(Clone)]
pub enum PartKind {
    Record(Vec<Part>),
    String(StringLeaf),
    Number(NumberLeaf),
}

/// A node of a schema and value tree
#[derive(Clone)]
pub struct Part {
    name: String,
    kind: PartKind,
}

macro_rules! leaf_constructors {
    ($($name:ident => $t:ty),* $(,)?) => {
        $(
            #[doc = concat!("Creates a `", stringify!($t), "` leaf")]
            pub fn $name(name: impl Into<String>) -> Part {
                Part::number::<$t>(name)
            }
        )*
    };
}

impl Part {
    /// Creates a record owning `fields`, in order
    pub fn record(name: impl Into<String>, fields: Vec<Part>) -> Part {
        Part {
            name: name.into(),
            kind: PartKind::Record(fields),
        }
    }

    /// Creates an empty string leaf with no fetcher
    pub fn string(name: impl Into<String>) -> Part {
        Part {
            name: name.into(),
            kind: PartKind::String(StringLeaf::default()),
        }
    }

    /// Creates a string leaf whose value is refreshed by `fetcher`
    pub fn string_with<F>(name: impl Into<String>, fetcher: F) -> Part
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Part {
            name: name.into(),
            kind: PartKind::String(StringLeaf {
                value: String::new(),
                fetcher: Some(Arc::new(fetcher)),
            }),
        }
    }

    /// Creates a numeric leaf of type `T` holding zero
    pub fn number<T: NumericValue>(name: impl Into<String>) -> Part {
        Part::from_number(name, T::ZERO.into_number())
    }

    /// Creates a numeric leaf whose value is refreshed by `fetcher`
    pub fn number_with<T, F>(name: impl Into<String>, fetcher: F) -> Part
    where
        T: NumericValue,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Part {
            name: name.into(),
            kind: PartKind::Number(NumberLeaf {
                value: T::ZERO.into_number(),
                fetcher: Some(Arc::new(move || fetcher().into_number())),
            }),
        }
    }

    /// Creates a numeric leaf holding `value`
    pub fn from_number(name: impl Into<String>, value: Number) -> Part {
        Part {
            name: name.into(),
            kind: PartKind::Number(NumberLeaf {
                value,
                fetcher: None,
            }),
        }
    }

    leaf_constructors! {
        float => f32,
        double => f64,
        uint8 => u8,
        uint16 => u16,
        uint32 => u32,
        uint64 => u64,
        int8 => i8,
        int16 => i16,
        int32 => i32,
        int64 => i64,
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PartKind {
        &self.kind
    }

    pub fn part_type(&self) -> Type {
        match &self.kind {
            PartKind::Record(_) => Type::Record,
            PartKind::String(_) => Type::String,
            PartKind::Number(leaf) => leaf.value.part_type(),
        }
    }

    /// The fields of a record, empty for leaves
    pub fn fields(&self) -> &[Part] {
        match &self.kind {
            PartKind::Record(fields) => fields,
            _ => &[],
        }
    }

    /// The fields of a record, `None` for leaves
    pub fn fields_mut(&mut self) -> Option<&mut Vec<Part>> {
        match &mut self.kind {
            PartKind::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Replaces the fields of a record. Returns false for leaves.
    pub fn set_fields(&mut self, new_fields: Vec<Part>) -> bool {
        match self.fields_mut() {
            Some(fields) => {
                *fields = new_fields;
                true
            }
            None => false,
        }
    }

    /// The first field called `name`
    pub fn field(&self, name: &str) -> Option<&Part> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Part> {
        self.fields_mut()?.iter_mut().find(|f| f.name == name)
    }

    /// The value of a string leaf
    pub fn string_value(&self) -> Option<&str> {
        match &self.kind {
            PartKind::String(leaf) => Some(&leaf.value),
            _ => None,
        }
    }

    /// Sets the value of a string leaf. Returns false if this is not one.
    pub fn set_string(&mut self, value: impl Into<String>) -> bool {
        match &mut self.kind {
            PartKind::String(leaf) => {
                leaf.value = value.into();
                true
            }
            _ => false,
        }
    }

    /// The value of a numeric leaf
    pub fn number_value(&self) -> Option<Number> {
        match &self.kind {
            PartKind::Number(leaf) => Some(leaf.value),
            _ => None,
        }
    }

    /// The value of a numeric leaf of exactly type `T`
    pub fn value<T: NumericValue>(&self) -> Option<T> {
        self.number_value().and_then(T::from_number)
    }

    /// Sets the value of a numeric leaf of exactly type `T`.
    ///
    /// Returns false, leaving the value alone, if this is not such a leaf.
    pub fn set_value<T: NumericValue>(&mut self, value: T) -> bool {
        match &mut self.kind {
            PartKind::Number(leaf) if leaf.value.part_type() == T::TYPE => {
                leaf.value = value.into_number();
                true
            }
            _ => false,
        }
    }

    /// Refreshes every leaf from its fetcher.
    ///
    /// Leaves without a fetcher keep their current value.
    pub fn fetch(&mut self) {
        match &mut self.kind {
            PartKind::Record(fields) => {
                for field in fields {
                    field.fetch();
                }
            }
            PartKind::String(leaf) => {
                if let Some(fetcher) = &leaf.fetcher {
                    leaf.value = fetcher();
                }
            }
            PartKind::Number(leaf) => {
                if let Some(fetcher) = &leaf.fetcher {
                    let value = fetcher();
                    // Fetchers are built from a typed closure so this always holds
                    if value.part_type() == leaf.value.part_type() {
                        leaf.value = value;
                    }
                }
            }
        }
    }

    /// Encodes the schema of this tree
    pub fn write_schema(&self, writer: &mut PacketWriter) -> Result<(), EncodeError> {
        writer.write_type(self.part_type()); // Type
        writer.write_string(&self.name)?; // Name

        if let PartKind::Record(fields) = &self.kind {
            writer.write_number::<u32>(fields.len() as u32); // Number of fields
            for field in fields {
                field.write_schema(writer)?;
            }
        }

        Ok(())
    }

    /// Encodes the values currently held by this tree
    pub fn write_message(&self, writer: &mut PacketWriter) -> Result<(), EncodeError> {
        match &self.kind {
            PartKind::Record(fields) => {
                for field in fields {
                    field.write_message(writer)?;
                }
            }
            PartKind::String(leaf) => writer.write_string(&leaf.value)?,
            PartKind::Number(leaf) => leaf.value.write(writer),
        }
        Ok(())
    }

    /// Fills this tree with values read from a data message.
    ///
    /// On error the tree may be partially updated, decode into a copy if
    /// that matters.
    pub fn read_data_from_message(&mut self, reader: &mut PacketReader) -> Result<(), DecodeError> {
        match &mut self.kind {
            PartKind::Record(fields) => {
                for field in fields {
                    field.read_data_from_message(reader)?;
                }
            }
            PartKind::String(leaf) => leaf.value = reader.get_string()?,
            PartKind::Number(leaf) => leaf.value = leaf.value.read_same(reader)?,
        }
        Ok(())
    }

    /// True if both trees have the same names, types and shape
    pub fn same_schema(&self, other: &Part) -> bool {
        if self.name != other.name || self.part_type() != other.part_type() {
            return false;
        }

        let (ours, theirs) = (self.fields(), other.fields());
        ours.len() == theirs.len() && ours.iter().zip(theirs).all(|(a, b)| a.same_schema(b))
    }

    /// Hands this part to the matching method of `visitor`
    pub fn visit(&self, visitor: &mut dyn Visitor) {
        match &self.kind {
            PartKind::Record(fields) => visitor.visit_record(&self.name, fields),
            PartKind::String(leaf) => visitor.visit_string(&self.name, &leaf.value),
            PartKind::Number(leaf) => match leaf.value {
                Number::Float(v) => visitor.visit_float(&self.name, v),
                Number::Double(v) => visitor.visit_double(&self.name, v),
                Number::Uint8(v) => visitor.visit_uint8(&self.name, v),
                Number::Uint16(v) => visitor.visit_uint16(&self.name, v),
                Number::Uint32(v) => visitor.visit_uint32(&self.name, v),
                Number::Uint64(v) => visitor.visit_uint64(&self.name, v),
                Number::Int8(v) => visitor.visit_int8(&self.name, v),
                Number::Int16(v) => visitor.visit_int16(&self.name, v),
                Number::Int32(v) => visitor.visit_int32(&self.name, v),
                Number::Int64(v) => visitor.visit_int64(&self.name, v),
            },
        }
    }

    /// Renders the schema of this tree as indented text
    pub fn pretty_print(&self) -> String {
        pretty::PrettyPrinter::schema().print(self)
    }

    /// Renders the values of this tree as indented text
    pub fn pretty_print_data(&self) -> String {
        pretty::PrettyPrinter::data().print(self)
    }
}

/// Decodes one schema entry, and everything nested in it, into a fresh tree.
///
/// Every leaf of the new tree holds zero (or the empty string) and has no
/// fetcher.
pub fn make_decoder(reader: &mut PacketReader) -> Result<Part, DecodeError> {
    decode_schema(reader, 0)
}

fn decode_schema(reader: &mut PacketReader, depth: usize) -> Result<Part, DecodeError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(DecodeError::TooDeep(MAX_SCHEMA_DEPTH));
    }

    let t = reader.get_type()?;
    let name = reader.get_string()?;

    match t {
        Type::Record => {
            // Type and name are already read, the field count comes next
            let count = reader.get_number::<u32>()? as usize;

            // Each field takes at least a type byte and a name terminator, so
            // a bogus count can not make us reserve more than the packet holds
            let mut fields = Vec::with_capacity(count.min(reader.remaining() / 2));
            for _ in 0..count {
                fields.push(decode_schema(reader, depth + 1)?);
            }
            Ok(Part::record(name, fields))
        }
        Type::String => Ok(Part::string(name)),
        numeric => match Number::zero(numeric) {
            Some(zero) => Ok(Part::from_number(name, zero)),
            None => Err(DecodeError::UnknownType(numeric as u8)),
        },
    }
}

impl fmt::Debug for StringLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringLeaf")
            .field("value", &self.value)
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl fmt::Debug for NumberLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumberLeaf")
            .field("value", &self.value)
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl fmt::Debug for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartKind::Record(fields) => f.debug_tuple("Record").field(fields).finish(),
            PartKind::String(leaf) => fmt::Debug::fmt(leaf, f),
            PartKind::Number(leaf) => fmt::Debug::fmt(leaf, f),
        }
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Parts compare by name, shape and current values. Fetchers are ignored.
impl PartialEq for Part {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.kind, &other.kind) {
            (PartKind::Record(a), PartKind::Record(b)) => a == b,
            (PartKind::String(a), PartKind::String(b)) => a.value == b.value,
            (PartKind::Number(a), PartKind::Number(b)) => a.value == b.value,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicI32, Ordering};

    fn every_leaf() -> Part {
        Part::record(
            "all",
            vec![
                Part::string("s"),
                Part::float("f"),
                Part::double("d"),
                Part::uint8("u8"),
                Part::uint16("u16"),
                Part::uint32("u32"),
                Part::uint64("u64"),
                Part::int8("i8"),
                Part::int16("i16"),
                Part::int32("i32"),
                Part::int64("i64"),
                Part::record("nested", vec![Part::uint8("inner")]),
            ],
        )
    }

    fn encode_schema(part: &Part) -> Vec<u8> {
        let mut scratch = Vec::new();
        let mut writer = PacketWriter::new(&mut scratch);
        part.write_schema(&mut writer).unwrap();
        scratch
    }

    fn encode_data(part: &Part) -> Vec<u8> {
        let mut scratch = Vec::new();
        let mut writer = PacketWriter::new(&mut scratch);
        part.write_message(&mut writer).unwrap();
        scratch
    }

    fn roundtrip(part: &Part) -> Part {
        let schema = encode_schema(part);
        let mut decoded = make_decoder(&mut PacketReader::new(&schema)).unwrap();
        assert!(decoded.same_schema(part));

        let data = encode_data(part);
        let mut reader = PacketReader::new(&data);
        decoded.read_data_from_message(&mut reader).unwrap();
        assert_eq!(reader.remaining(), 0);
        decoded
    }

    fn fill(part: &mut Part, values: &[(&str, Number)], text: &str) {
        for (name, value) in values {
            let field = part.field_mut(name).unwrap();
            *field = Part::from_number(*name, *value);
        }
        part.field_mut("s").unwrap().set_string(text);
    }

    #[test]
    fn test_type_tags() {
        for tag in 0..=255u8 {
            match Type::try_from(tag) {
                Ok(t) => assert_eq!(t as u8, tag),
                Err(e) => assert_eq!(e, DecodeError::UnknownType(tag)),
            }
        }
        assert_eq!(Type::try_from(2u8), Err(DecodeError::UnknownType(2)));
        assert_eq!(Type::Uint64.to_string(), "uint64");
    }

    #[test]
    fn test_roundtrip_max_values() {
        let mut part = every_leaf();
        fill(
            &mut part,
            &[
                ("f", Number::Float(f32::MAX)),
                ("d", Number::Double(f64::MIN)),
                ("u8", Number::Uint8(u8::MAX)),
                ("u16", Number::Uint16(u16::MAX)),
                ("u32", Number::Uint32(u32::MAX)),
                ("u64", Number::Uint64(u64::MAX)),
                ("i8", Number::Int8(i8::MIN)),
                ("i16", Number::Int16(i16::MIN)),
                ("i32", Number::Int32(i32::MAX)),
                ("i64", Number::Int64(i64::MIN)),
            ],
            "running",
        );
        part.field_mut("nested")
            .unwrap()
            .field_mut("inner")
            .unwrap()
            .set_value(200u8);

        assert_eq!(roundtrip(&part), part);
    }

    #[test]
    fn test_roundtrip_zero_and_negative() {
        let mut part = every_leaf();
        fill(
            &mut part,
            &[
                ("f", Number::Float(-0.25)),
                ("d", Number::Double(0.0)),
                ("u8", Number::Uint8(0)),
                ("u16", Number::Uint16(0)),
                ("u32", Number::Uint32(0)),
                ("u64", Number::Uint64(0)),
                ("i8", Number::Int8(-1)),
                ("i16", Number::Int16(-300)),
                ("i32", Number::Int32(-70000)),
                ("i64", Number::Int64(-5_000_000_000)),
            ],
            "",
        );

        assert_eq!(roundtrip(&part), part);
    }

    #[test]
    fn test_schema_encoding() {
        let part = Part::record("m", vec![Part::uint8("a")]);
        assert_eq!(encode_schema(&part), vec![0, b'm', 0, 1, 0, 0, 0, 5, b'a', 0]);
        assert_eq!(encode_data(&Part::int16("x")), vec![0, 0]);
    }

    #[test]
    fn test_empty_record() {
        let part = Part::record("empty", vec![]);
        let decoded = roundtrip(&part);
        assert!(decoded.fields().is_empty());
        assert!(encode_data(&part).is_empty());
    }

    #[test]
    fn test_decode_truncated_schema() {
        let schema = encode_schema(&every_leaf());
        for cut in 0..schema.len() {
            let mut reader = PacketReader::new(&schema[..cut]);
            assert!(make_decoder(&mut reader).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_decode_huge_field_count() {
        // A record claiming u32::MAX fields with nothing after it
        let bytes = [0, b'r', 0, 0xFF, 0xFF, 0xFF, 0xFF];
        let result = make_decoder(&mut PacketReader::new(&bytes));
        assert!(matches!(result, Err(DecodeError::OutOfBounds { .. })));
    }

    #[test]
    fn test_decode_too_deep() {
        let mut bytes = Vec::new();
        for _ in 0..=MAX_SCHEMA_DEPTH + 1 {
            bytes.extend_from_slice(&[0, b'r', 0, 1, 0, 0, 0]);
        }
        bytes.extend_from_slice(&[5, b'x', 0]);
        let result = make_decoder(&mut PacketReader::new(&bytes));
        assert_eq!(result.unwrap_err(), DecodeError::TooDeep(MAX_SCHEMA_DEPTH));
    }

    #[test]
    fn test_decode_unknown_type() {
        let bytes = [0, b'r', 0, 1, 0, 0, 0, 13, b'x', 0];
        let result = make_decoder(&mut PacketReader::new(&bytes));
        assert_eq!(result.unwrap_err(), DecodeError::UnknownType(13));
    }

    #[test]
    fn test_read_data_short() {
        let mut part = Part::record("m", vec![Part::int32("a"), Part::int32("b")]);
        let data = [1, 0, 0, 0, 2, 0];
        let result = part.read_data_from_message(&mut PacketReader::new(&data));
        assert!(matches!(result, Err(DecodeError::OutOfBounds { .. })));
    }

    #[test]
    fn test_fetch() {
        static RPM: AtomicI32 = AtomicI32::new(0);

        let mut part = Part::record(
            "motor",
            vec![
                Part::number_with("rpm", || RPM.load(Ordering::SeqCst)),
                Part::string_with("state", || "running".to_string()),
                Part::uint8("fixed"),
            ],
        );
        part.field_mut("fixed").unwrap().set_value(3u8);

        RPM.store(1500, Ordering::SeqCst);
        part.fetch();
        assert_eq!(part.field("rpm").unwrap().value::<i32>(), Some(1500));
        assert_eq!(part.field("state").unwrap().string_value(), Some("running"));
        assert_eq!(part.field("fixed").unwrap().value::<u8>(), Some(3));

        RPM.store(-20, Ordering::SeqCst);
        part.fetch();
        assert_eq!(part.field("rpm").unwrap().value::<i32>(), Some(-20));
    }

    #[test]
    fn test_set_value_type_checked() {
        let mut part = Part::int32("rpm");
        assert!(!part.set_value(5u8));
        assert!(part.set_value(5i32));
        assert_eq!(part.value::<i32>(), Some(5));
        assert_eq!(part.value::<u8>(), None);
        assert!(!part.set_string("nope"));
    }

    #[test]
    fn test_same_schema() {
        let a = Part::record("m", vec![Part::int32("rpm"), Part::string("state")]);
        let mut b = a.clone();
        b.field_mut("rpm").unwrap().set_value(10i32);
        assert!(a.same_schema(&b));
        assert_ne!(a, b);

        let c = Part::record("m", vec![Part::int16("rpm"), Part::string("state")]);
        assert!(!a.same_schema(&c));

        let d = Part::record("m", vec![Part::int32("rpm")]);
        assert!(!a.same_schema(&d));
    }

    #[test]
    fn test_set_fields() {
        let mut part = Part::record("m", vec![]);
        assert!(part.set_fields(vec![Part::uint8("a")]));
        assert_eq!(part.fields().len(), 1);
        assert!(!Part::uint8("leaf").set_fields(vec![]));
    }
}
