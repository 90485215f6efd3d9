//! Item schema and fixed-stride item codec.
//!
//! Every index declares once an ordered list of typed scalar fields. The
//! schema fixes both the in-memory shape of an [`Item`] and its on-disk
//! width: each field takes 8 bytes, followed by the item's rectangle as four
//! `f64` values.

use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;

use crate::bounding_box::Rect;
use crate::errors::{ErrorKind, QuindexError, QuindexResult};

/// Bytes taken by one serialized field value.
pub const FIELD_WIDTH: usize = 8;

/// Bytes taken by a serialized rectangle.
pub const RECT_WIDTH: usize = 4 * 8;

/// Scalar type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int64,
    Float64,
}

impl FieldType {
    /// Single character type code used in the serialized schema string.
    pub fn code(&self) -> char {
        match self {
            FieldType::Int64 => 'q',
            FieldType::Float64 => 'd',
        }
    }

    pub fn from_code(code: &str) -> QuindexResult<Self> {
        match code {
            "q" => Ok(FieldType::Int64),
            "d" => Ok(FieldType::Float64),
            other => Err(QuindexError::new(
                &format!("Unsupported field type code '{}'", other),
                ErrorKind::ConfigurationError,
            )),
        }
    }
}

/// A single typed value of an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Int(_) => FieldType::Int64,
            Value::Float(_) => FieldType::Float64,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(_) => None,
            Value::Float(v) => Some(*v),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// An ordered tuple of values shaped by an [`ItemSchema`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    values: SmallVec<[Value; 6]>,
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.len().hash(state);
        for value in &self.values {
            match value {
                Value::Int(v) => {
                    0u8.hash(state);
                    v.hash(state);
                }
                Value::Float(v) => {
                    1u8.hash(state);
                    v.to_bits().hash(state);
                }
            }
        }
    }
}

impl Item {
    pub fn new<I: IntoIterator<Item = Value>>(values: I) -> Self {
        Item {
            values: values.into_iter().collect(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

impl From<Vec<Value>> for Item {
    fn from(values: Vec<Value>) -> Self {
        Item::new(values)
    }
}

impl<const N: usize> From<[i64; N]> for Item {
    fn from(values: [i64; N]) -> Self {
        Item::new(values.into_iter().map(Value::Int))
    }
}

/// A named, typed field of an [`ItemSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    field_type: FieldType,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Field {
            name: name.to_string(),
            field_type,
        }
    }

    pub fn int64(name: &str) -> Self {
        Field::new(name, FieldType::Int64)
    }

    pub fn float64(name: &str) -> Self {
        Field::new(name, FieldType::Float64)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

/// Ordered field list shared by every item of one index.
///
/// The schema is resolved once into its field types and fixed record width,
/// so encoding and decoding an item is a straight walk over the fields.
///
/// # Examples
///
/// ```rust
/// use quindex::schema::{Field, ItemSchema, Value};
/// use quindex::{Item, Rect};
///
/// let schema = ItemSchema::new(vec![Field::int64("id"), Field::float64("score")]).unwrap();
/// assert_eq!(schema.to_schema_string(), "id:q,score:d");
/// assert_eq!(schema.record_width(), 2 * 8 + 4 * 8);
///
/// let item = Item::new([Value::Int(7), Value::Float(0.5)]);
/// let mut bytes = Vec::new();
/// schema.encode(&item, &Rect::new(0.0, 0.0, 1.0, 1.0), &mut bytes).unwrap();
/// let (decoded, rect) = schema.decode(&mut bytes.as_slice()).unwrap();
/// assert_eq!(decoded, item);
/// assert_eq!(rect, Rect::new(0.0, 0.0, 1.0, 1.0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemSchema {
    fields: Vec<Field>,
    types: Vec<FieldType>,
}

impl ItemSchema {
    /// Builds a schema from its fields.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for an empty field list, empty or
    /// duplicate names, or names containing `:` or `,`.
    pub fn new(fields: Vec<Field>) -> QuindexResult<Self> {
        if fields.is_empty() {
            return Err(QuindexError::new(
                "Item schema must declare at least one field",
                ErrorKind::ConfigurationError,
            ));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.name.is_empty() || field.name.contains([':', ',']) {
                return Err(QuindexError::new(
                    &format!("Invalid field name '{}'", field.name),
                    ErrorKind::ConfigurationError,
                ));
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(QuindexError::new(
                    &format!("Duplicate field name '{}'", field.name),
                    ErrorKind::ConfigurationError,
                ));
            }
        }

        let types = fields.iter().map(|f| f.field_type).collect();
        Ok(ItemSchema { fields, types })
    }

    /// Parses the serialized `name:code,name:code` form.
    pub fn parse(schema: &str) -> QuindexResult<Self> {
        let mut fields = Vec::new();
        for part in schema.split(',') {
            let (name, code) = part.split_once(':').ok_or_else(|| {
                QuindexError::new(
                    &format!("Malformed schema field '{}'", part),
                    ErrorKind::ConfigurationError,
                )
            })?;
            fields.push(Field::new(name, FieldType::from_code(code)?));
        }
        ItemSchema::new(fields)
    }

    pub fn to_schema_string(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}:{}", f.name, f.field_type.code()))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialized width of the item values alone.
    pub fn item_width(&self) -> usize {
        self.types.len() * FIELD_WIDTH
    }

    /// Serialized width of one item record: values followed by the rectangle.
    pub fn record_width(&self) -> usize {
        self.item_width() + RECT_WIDTH
    }

    /// Checks that `item` has the schema's arity and field types.
    pub fn validate(&self, item: &Item) -> QuindexResult<()> {
        if item.len() != self.types.len() {
            return Err(QuindexError::new(
                &format!(
                    "Item has {} values but the schema declares {} fields",
                    item.len(),
                    self.types.len()
                ),
                ErrorKind::SchemaMismatch,
            ));
        }
        for (i, (value, expected)) in item.values().iter().zip(&self.types).enumerate() {
            if value.field_type() != *expected {
                return Err(QuindexError::new(
                    &format!(
                        "Field '{}' expects {:?} but got {:?}",
                        self.fields[i].name,
                        expected,
                        value.field_type()
                    ),
                    ErrorKind::SchemaMismatch,
                ));
            }
        }
        Ok(())
    }

    /// Writes one item record. The item must already be validated.
    pub fn encode<W: Write>(&self, item: &Item, rect: &Rect, w: &mut W) -> std::io::Result<()> {
        for value in item.values() {
            match value {
                Value::Int(v) => w.write_i64::<LittleEndian>(*v)?,
                Value::Float(v) => w.write_f64::<LittleEndian>(*v)?,
            }
        }
        for corner in rect.to_array() {
            w.write_f64::<LittleEndian>(corner)?;
        }
        Ok(())
    }

    /// Reads one item record written by [`ItemSchema::encode`].
    pub fn decode<R: Read>(&self, r: &mut R) -> std::io::Result<(Item, Rect)> {
        let mut values = SmallVec::with_capacity(self.types.len());
        for field_type in &self.types {
            values.push(match field_type {
                FieldType::Int64 => Value::Int(r.read_i64::<LittleEndian>()?),
                FieldType::Float64 => Value::Float(r.read_f64::<LittleEndian>()?),
            });
        }
        let mut corners = [0f64; 4];
        r.read_f64_into::<LittleEndian>(&mut corners)?;
        Ok((Item { values }, Rect::from_array(corners)))
    }
}

/// A genomic interval record as stored in a chromosome tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntervalRecord {
    pub start: u64,
    pub end: u64,
    pub data_offset: u64,
    pub data_size: u64,
    pub file_id: u32,
}

impl IntervalRecord {
    pub fn new(start: u64, end: u64, data_offset: u64, data_size: u64, file_id: u32) -> Self {
        IntervalRecord {
            start,
            end,
            data_offset,
            data_size,
            file_id,
        }
    }

    /// The schema of interval items: five int64 fields.
    pub fn schema() -> ItemSchema {
        ItemSchema {
            fields: vec![
                Field::int64("start"),
                Field::int64("end"),
                Field::int64("data_offset"),
                Field::int64("data_size"),
                Field::int64("file_id"),
            ],
            types: vec![FieldType::Int64; 5],
        }
    }

    /// Inclusive overlap with `[start, end]`.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start <= end && self.end >= start
    }

    pub fn to_item(&self) -> QuindexResult<Item> {
        Ok(Item::new([
            Value::Int(to_i64(self.start, "start")?),
            Value::Int(to_i64(self.end, "end")?),
            Value::Int(to_i64(self.data_offset, "data_offset")?),
            Value::Int(to_i64(self.data_size, "data_size")?),
            Value::Int(i64::from(self.file_id)),
        ]))
    }

    pub fn from_item(item: &Item) -> QuindexResult<Self> {
        let field = |index: usize, name: &str| -> QuindexResult<i64> {
            item.get(index).and_then(Value::as_i64).ok_or_else(|| {
                QuindexError::new(
                    &format!("Item has no int64 '{}' field at position {}", name, index),
                    ErrorKind::SchemaMismatch,
                )
            })
        };
        if item.len() != 5 {
            return Err(QuindexError::new(
                &format!("Interval items have 5 fields, got {}", item.len()),
                ErrorKind::SchemaMismatch,
            ));
        }

        Ok(IntervalRecord {
            start: to_u64(field(0, "start")?, "start")?,
            end: to_u64(field(1, "end")?, "end")?,
            data_offset: to_u64(field(2, "data_offset")?, "data_offset")?,
            data_size: to_u64(field(3, "data_size")?, "data_size")?,
            file_id: u32::try_from(field(4, "file_id")?).map_err(|_| {
                QuindexError::new("file_id out of range", ErrorKind::SchemaMismatch)
            })?,
        })
    }
}

fn to_i64(value: u64, name: &str) -> QuindexResult<i64> {
    i64::try_from(value).map_err(|_| {
        QuindexError::new(
            &format!("{} value {} does not fit an int64 field", name, value),
            ErrorKind::SchemaMismatch,
        )
    })
}

fn to_u64(value: i64, name: &str) -> QuindexResult<u64> {
    u64::try_from(value).map_err(|_| {
        QuindexError::new(
            &format!("{} value {} is negative", name, value),
            ErrorKind::SchemaMismatch,
        )
    })
}
