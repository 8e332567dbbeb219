//! Destination type descriptions
//!
//! Without runtime reflection the engine cannot discover the type of a
//! constructor parameter on its own, so the host hands it a
//! [`TypeDescriptor`]: a display name plus the structural [`Shape`] the
//! coercion rules dispatch on. Coercion produces a dynamically typed
//! [`Value`] that [`Bindable::from_value`] turns back into a concrete Rust type.

mod bindable;
mod names;
mod value;

pub use bindable::{value_mismatch, Bindable};
pub use value::Value;

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a host-defined scalar type, used to find its converter
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Numeric destination kinds, parsed with culture-invariant rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
}

impl NumberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberKind::I8 => "i8",
            NumberKind::I16 => "i16",
            NumberKind::I32 => "i32",
            NumberKind::I64 => "i64",
            NumberKind::I128 => "i128",
            NumberKind::Isize => "isize",
            NumberKind::U8 => "u8",
            NumberKind::U16 => "u16",
            NumberKind::U32 => "u32",
            NumberKind::U64 => "u64",
            NumberKind::U128 => "u128",
            NumberKind::Usize => "usize",
            NumberKind::F32 => "f32",
            NumberKind::F64 => "f64",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, NumberKind::F32 | NumberKind::F64)
    }

    /// Parse `raw` into the value representation for this kind.
    ///
    /// Integers are range checked against the exact kind, then widened to
    /// `i128`; `u128` values above `i128::MAX` are carried as [`Value::UInt`].
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        fn int<T>(raw: &str) -> Result<Value, String>
        where
            T: std::str::FromStr + TryInto<i128>,
            T::Err: fmt::Display,
        {
            let parsed = raw.parse::<T>().map_err(|e| e.to_string())?;
            parsed
                .try_into()
                .map(Value::Int)
                .map_err(|_| "number too large".to_string())
        }

        match self {
            NumberKind::I8 => int::<i8>(raw),
            NumberKind::I16 => int::<i16>(raw),
            NumberKind::I32 => int::<i32>(raw),
            NumberKind::I64 => int::<i64>(raw),
            NumberKind::I128 => int::<i128>(raw),
            NumberKind::Isize => int::<isize>(raw),
            NumberKind::U8 => int::<u8>(raw),
            NumberKind::U16 => int::<u16>(raw),
            NumberKind::U32 => int::<u32>(raw),
            NumberKind::U64 => int::<u64>(raw),
            NumberKind::U128 => {
                let parsed = raw.parse::<u128>().map_err(|e| e.to_string())?;
                Ok(Value::from_u128(parsed))
            }
            NumberKind::Usize => int::<usize>(raw),
            NumberKind::F32 => raw
                .parse::<f32>()
                .map(|v| Value::Float(f64::from(v)))
                .map_err(|e| e.to_string()),
            NumberKind::F64 => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| e.to_string()),
        }
    }
}

/// Structural shape of a destination type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    /// String-like: the raw value is used as is
    Text,
    Bool,
    Char,
    Number(NumberKind),
    /// Enumeration matched by case-sensitive variant name
    Enum(&'static [&'static str]),
    /// Nullable wrapper; absent values become [`Value::None`]
    Optional(Box<TypeDescriptor>),
    /// Single-type-argument sequence contract, resolved by family in the shape registry
    Sequence {
        family: Cow<'static, str>,
        element: Box<TypeDescriptor>,
    },
    /// Two-type-argument keyed mapping contract
    Map {
        family: Cow<'static, str>,
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
    /// Host-defined scalar converted through the converter registry
    Scalar(TypeKey),
}

/// Description of a destination type: name for diagnostics plus shape
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    name: Cow<'static, str>,
    shape: Shape,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    pub fn text() -> Self {
        Self::new("String", Shape::Text)
    }

    pub fn boolean() -> Self {
        Self::new("bool", Shape::Bool)
    }

    pub fn character() -> Self {
        Self::new("char", Shape::Char)
    }

    pub fn number(kind: NumberKind) -> Self {
        Self::new(kind.as_str(), Shape::Number(kind))
    }

    pub fn enumeration(name: impl Into<Cow<'static, str>>, variants: &'static [&'static str]) -> Self {
        Self::new(name, Shape::Enum(variants))
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::new(
            format!("Option<{}>", inner.name),
            Shape::Optional(Box::new(inner)),
        )
    }

    /// Sequence descriptor, named `Family<Element>`
    pub fn sequence(family: impl Into<Cow<'static, str>>, element: TypeDescriptor) -> Self {
        let family = family.into();
        Self::new(
            format!("{family}<{}>", element.name),
            Shape::Sequence {
                family,
                element: Box::new(element),
            },
        )
    }

    /// Map descriptor, named `Family<Key, Value>`
    pub fn map(
        family: impl Into<Cow<'static, str>>,
        key: TypeDescriptor,
        value: TypeDescriptor,
    ) -> Self {
        let family = family.into();
        Self::new(
            format!("{family}<{}, {}>", key.name, value.name),
            Shape::Map {
                family,
                key: Box::new(key),
                value: Box::new(value),
            },
        )
    }

    pub fn scalar<T: 'static>() -> Self {
        let key = TypeKey::of::<T>();
        Self::new(key.name(), Shape::Scalar(key))
    }

    /// Parse a Rust-style type name such as `Vec<i32>` or `HashMap<String, bool>`.
    ///
    /// Only built-in shapes are understood; host scalars have no name here
    /// because their converters are keyed by `TypeId`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        names::parse_type_name(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// True for destinations that have no empty representation
    pub fn requires_value(&self) -> bool {
        matches!(
            self.shape,
            Shape::Bool | Shape::Char | Shape::Number(_) | Shape::Enum(_) | Shape::Scalar(_)
        )
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// `alloc::string::String` → `String`, `core::option::Option<i32>` → `Option<i32>`
fn short_type_name(full: &'static str) -> &'static str {
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}
