//! Field declarations and the closed set of field kinds.
//!
//! A configuration structure implements [`Bind`] by listing its tagged fields.
//! Each listed field pairs a path segment with a mutable reference that is
//! turned into a [`FieldMut`], the tagged variant every traversal matches on.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

/// A structure whose tagged fields map onto store paths.
///
/// Fields left out of [`Bind::fields`] are untagged: Save, Load and Watch
/// never read, write or register them.
pub trait Bind: Send {
    fn fields(&mut self) -> Vec<Field<'_>>;
}

/// Implement [`Bind`] from `field => "segment"` pairs.
///
/// ```
/// #[derive(Default)]
/// struct Limits {
///     max_connections: i32,
///     note: String, // untagged
/// }
///
/// etcd_bind::bind!(Limits {
///     max_connections => "/max_connections",
/// });
/// ```
#[macro_export]
macro_rules! bind {
    ($ty:ty { $($field:ident => $segment:expr),* $(,)? }) => {
        impl $crate::Bind for $ty {
            fn fields(&mut self) -> ::std::vec::Vec<$crate::Field<'_>> {
                ::std::vec![$($crate::Field::new($segment, &mut self.$field)),*]
            }
        }
    };
}

/// Identity of a field's storage location: its address plus its type.
///
/// The type is part of the key because a structure and its first field
/// can share an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    addr: usize,
    type_id: TypeId,
}

impl FieldKey {
    pub fn of<F: 'static>(field: &F) -> Self {
        Self {
            addr: field as *const F as usize,
            type_id: TypeId::of::<F>(),
        }
    }
}

/// Scalar kinds a leaf can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Int32,
    Int64,
    Bool,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::String => "string",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Kind of a registered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Struct,
    ScalarList(ScalarKind),
    StructList,
    StringMap,
}

impl FieldKind {
    pub fn is_scalar(&self) -> bool {
        matches!(self, FieldKind::Scalar(_))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(kind) => write!(f, "{}", kind),
            FieldKind::Struct => f.write_str("struct"),
            FieldKind::ScalarList(kind) => write!(f, "list<{}>", kind),
            FieldKind::StructList => f.write_str("list<struct>"),
            FieldKind::StringMap => f.write_str("map<string,string>"),
        }
    }
}

/// One tagged field of a [`Bind`] structure.
pub struct Field<'a> {
    segment: &'a str,
    key: FieldKey,
    value: FieldMut<'a>,
}

impl<'a> Field<'a> {
    /// Declare `field` as rooted at `segment` below its parent. An empty
    /// segment leaves the field untagged.
    pub fn new<F: IntoField + 'static>(segment: &'a str, field: &'a mut F) -> Self {
        let key = FieldKey::of(&*field);
        Self {
            segment,
            key,
            value: field.as_field(),
        }
    }

    pub fn segment(&self) -> &str {
        self.segment
    }

    pub fn key(&self) -> FieldKey {
        self.key
    }

    pub fn kind(&self) -> FieldKind {
        self.value.kind()
    }

    pub fn is_tagged(&self) -> bool {
        !self.segment.trim_matches('/').is_empty()
    }

    pub fn into_value(self) -> FieldMut<'a> {
        self.value
    }
}

/// Mutable view of a field, one variant per supported kind.
pub enum FieldMut<'a> {
    Scalar(ScalarMut<'a>),
    Struct(&'a mut dyn Bind),
    ScalarList(ScalarListMut<'a>),
    StructList(&'a mut dyn StructList),
    /// `None` is an unallocated map.
    StringMap(Option<&'a mut HashMap<String, String>>),
}

impl FieldMut<'_> {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldMut::Scalar(scalar) => FieldKind::Scalar(scalar.kind()),
            FieldMut::Struct(_) => FieldKind::Struct,
            FieldMut::ScalarList(list) => FieldKind::ScalarList(list.kind()),
            FieldMut::StructList(_) => FieldKind::StructList,
            FieldMut::StringMap(_) => FieldKind::StringMap,
        }
    }
}

/// Conversion from a field reference into its [`FieldMut`] view.
pub trait IntoField: Send {
    fn as_field(&mut self) -> FieldMut<'_>;
}

impl<T: Bind> IntoField for T {
    fn as_field(&mut self) -> FieldMut<'_> {
        FieldMut::Struct(self)
    }
}

impl<T: Bind + Default + 'static> IntoField for Vec<T> {
    fn as_field(&mut self) -> FieldMut<'_> {
        FieldMut::StructList(self)
    }
}

impl IntoField for HashMap<String, String> {
    fn as_field(&mut self) -> FieldMut<'_> {
        FieldMut::StringMap(Some(self))
    }
}

impl IntoField for Option<HashMap<String, String>> {
    fn as_field(&mut self) -> FieldMut<'_> {
        FieldMut::StringMap(self.as_mut())
    }
}

/// Text encoding of a scalar kind.
trait ScalarValue: Sized {
    fn format(&self) -> String;
    fn parse(text: &str) -> Result<Self, String>;
}

impl ScalarValue for String {
    fn format(&self) -> String {
        self.clone()
    }

    fn parse(text: &str) -> Result<Self, String> {
        Ok(text.to_string())
    }
}

impl ScalarValue for i32 {
    fn format(&self) -> String {
        self.to_string()
    }

    fn parse(text: &str) -> Result<Self, String> {
        text.parse()
            .map_err(|e| format!("cannot parse {:?} as int32: {}", text, e))
    }
}

impl ScalarValue for i64 {
    fn format(&self) -> String {
        self.to_string()
    }

    fn parse(text: &str) -> Result<Self, String> {
        text.parse()
            .map_err(|e| format!("cannot parse {:?} as int64: {}", text, e))
    }
}

impl ScalarValue for bool {
    fn format(&self) -> String {
        self.to_string()
    }

    fn parse(text: &str) -> Result<Self, String> {
        match text {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(format!("cannot parse {:?} as bool", text)),
        }
    }
}

fn parse_all<T: ScalarValue>(texts: &[&str]) -> Result<Vec<T>, String> {
    texts.iter().map(|text| T::parse(text)).collect()
}

/// Mutable view of a scalar field.
pub enum ScalarMut<'a> {
    String(&'a mut String),
    Int32(&'a mut i32),
    Int64(&'a mut i64),
    Bool(&'a mut bool),
}

impl ScalarMut<'_> {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarMut::String(_) => ScalarKind::String,
            ScalarMut::Int32(_) => ScalarKind::Int32,
            ScalarMut::Int64(_) => ScalarKind::Int64,
            ScalarMut::Bool(_) => ScalarKind::Bool,
        }
    }

    /// Canonical text form: integers in base 10, bools as "true"/"false".
    pub fn format(&self) -> String {
        match self {
            ScalarMut::String(v) => v.format(),
            ScalarMut::Int32(v) => v.format(),
            ScalarMut::Int64(v) => v.format(),
            ScalarMut::Bool(v) => v.format(),
        }
    }

    /// Parse `text` into the field. The field is untouched on failure.
    pub fn assign(&mut self, text: &str) -> Result<(), String> {
        match self {
            ScalarMut::String(v) => **v = String::parse(text)?,
            ScalarMut::Int32(v) => **v = i32::parse(text)?,
            ScalarMut::Int64(v) => **v = i64::parse(text)?,
            ScalarMut::Bool(v) => **v = bool::parse(text)?,
        }
        Ok(())
    }
}

/// Mutable view of a list of scalars.
pub enum ScalarListMut<'a> {
    String(&'a mut Vec<String>),
    Int32(&'a mut Vec<i32>),
    Int64(&'a mut Vec<i64>),
    Bool(&'a mut Vec<bool>),
}

impl ScalarListMut<'_> {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarListMut::String(_) => ScalarKind::String,
            ScalarListMut::Int32(_) => ScalarKind::Int32,
            ScalarListMut::Int64(_) => ScalarKind::Int64,
            ScalarListMut::Bool(_) => ScalarKind::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScalarListMut::String(v) => v.len(),
            ScalarListMut::Int32(v) => v.len(),
            ScalarListMut::Int64(v) => v.len(),
            ScalarListMut::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements in sequence order, formatted like scalars.
    pub fn formatted(&self) -> Vec<String> {
        match self {
            ScalarListMut::String(v) => v.iter().map(ScalarValue::format).collect(),
            ScalarListMut::Int32(v) => v.iter().map(ScalarValue::format).collect(),
            ScalarListMut::Int64(v) => v.iter().map(ScalarValue::format).collect(),
            ScalarListMut::Bool(v) => v.iter().map(ScalarValue::format).collect(),
        }
    }

    /// Replace the whole list with the parsed `texts`. The list is untouched
    /// if any element fails to parse.
    pub fn replace(&mut self, texts: &[&str]) -> Result<(), String> {
        match self {
            ScalarListMut::String(v) => **v = parse_all(texts)?,
            ScalarListMut::Int32(v) => **v = parse_all(texts)?,
            ScalarListMut::Int64(v) => **v = parse_all(texts)?,
            ScalarListMut::Bool(v) => **v = parse_all(texts)?,
        }
        Ok(())
    }

    pub fn element_keys(&self) -> Vec<FieldKey> {
        match self {
            ScalarListMut::String(v) => v.iter().map(FieldKey::of).collect(),
            ScalarListMut::Int32(v) => v.iter().map(FieldKey::of).collect(),
            ScalarListMut::Int64(v) => v.iter().map(FieldKey::of).collect(),
            ScalarListMut::Bool(v) => v.iter().map(FieldKey::of).collect(),
        }
    }
}

/// A list of [`Bind`] structures, seen through a trait object.
pub trait StructList: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn elements(&mut self) -> Vec<&mut dyn Bind>;

    fn element_keys(&self) -> Vec<FieldKey>;

    /// Discard the current contents and hold `len` default elements.
    fn reset(&mut self, len: usize);
}

impl<T: Bind + Default + 'static> StructList for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn elements(&mut self) -> Vec<&mut dyn Bind> {
        self.iter_mut().map(|e| e as &mut dyn Bind).collect()
    }

    fn element_keys(&self) -> Vec<FieldKey> {
        self.iter().map(FieldKey::of).collect()
    }

    fn reset(&mut self, len: usize) {
        self.clear();
        self.resize_with(len, T::default);
    }
}

macro_rules! scalar_field {
    ($ty:ty, $variant:ident) => {
        impl IntoField for $ty {
            fn as_field(&mut self) -> FieldMut<'_> {
                FieldMut::Scalar(ScalarMut::$variant(self))
            }
        }

        impl IntoField for Vec<$ty> {
            fn as_field(&mut self) -> FieldMut<'_> {
                FieldMut::ScalarList(ScalarListMut::$variant(self))
            }
        }
    };
}

scalar_field!(String, String);
scalar_field!(i32, Int32);
scalar_field!(i64, Int64);
scalar_field!(bool, Bool);
