use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;

use super::{NumberKind, Shape, TypeDescriptor, Value};
use crate::errors::{BindingError, BindingResult};

/// A Rust type that configuration values can be coerced into
///
/// The descriptor tells the engine which rules apply; `from_value` rebuilds
/// the concrete type from the engine's output. `into_value` is the inverse,
/// used for values supplied in code and for converter results.
pub trait Bindable: Sized + Send + Sync + 'static {
    fn descriptor() -> TypeDescriptor;

    fn from_value(value: Value) -> BindingResult<Self>;

    fn into_value(self) -> Value;
}

/// Error for a value whose variant does not fit the requested type
#[doc(hidden)]
pub fn value_mismatch(destination: &str, value: &Value) -> BindingError {
    BindingError::coercion(
        destination,
        value.as_str(),
        format!("unexpected {} value", value.kind()),
    )
}

impl Bindable for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::text()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Text(text) => Ok(text),
            other => Err(value_mismatch("String", &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl Bindable for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::boolean()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Bool(flag) => Ok(flag),
            other => Err(value_mismatch("bool", &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl Bindable for char {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::character()
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Char(ch) => Ok(ch),
            other => Err(value_mismatch("char", &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Char(self)
    }
}

macro_rules! bindable_int {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl Bindable for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::number(NumberKind::$kind)
                }

                fn from_value(value: Value) -> BindingResult<Self> {
                    match value {
                        Value::Int(number) => <$ty>::try_from(number).map_err(|_| {
                            BindingError::coercion(
                                stringify!($ty),
                                Some(&number.to_string()),
                                "number out of range",
                            )
                        }),
                        Value::UInt(number) => Err(BindingError::coercion(
                            stringify!($ty),
                            Some(&number.to_string()),
                            "number out of range",
                        )),
                        other => Err(value_mismatch(stringify!($ty), &other)),
                    }
                }

                fn into_value(self) -> Value {
                    Value::Int(self as i128)
                }
            }
        )+
    };
}

bindable_int!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
);

impl Bindable for u128 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::number(NumberKind::U128)
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::UInt(number) => Ok(number),
            Value::Int(number) => u128::try_from(number).map_err(|_| {
                BindingError::coercion("u128", Some(&number.to_string()), "number out of range")
            }),
            other => Err(value_mismatch("u128", &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::from_u128(self)
    }
}

impl Bindable for f64 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::number(NumberKind::F64)
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::Float(number) => Ok(number),
            other => Err(value_mismatch("f64", &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl Bindable for f32 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::number(NumberKind::F32)
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            // values were parsed as f32 and widened losslessly
            Value::Float(number) => Ok(number as f32),
            other => Err(value_mismatch("f32", &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Some(inner) => inner.into_value(),
            None => Value::None,
        }
    }
}

fn list_items(destination: &str, value: Value) -> BindingResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(value_mismatch(destination, &other)),
    }
}

fn map_entries(destination: &str, value: Value) -> BindingResult<Vec<(Value, Value)>> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(value_mismatch(destination, &other)),
    }
}

impl<T: Bindable> Bindable for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence("Vec", T::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        list_items("Vec", value)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Bindable::into_value).collect())
    }
}

impl<T: Bindable> Bindable for VecDeque<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence("VecDeque", T::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        list_items("VecDeque", value)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Bindable::into_value).collect())
    }
}

impl<T: Bindable> Bindable for LinkedList<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence("LinkedList", T::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        list_items("LinkedList", value)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Bindable::into_value).collect())
    }
}

// Fixed-size slices materialise through the `Slice` family (a `Vec` alias)
impl<T: Bindable> Bindable for Box<[T]> {
    fn descriptor() -> TypeDescriptor {
        let element = T::descriptor();
        TypeDescriptor::new(
            format!("Box<[{}]>", element.name()),
            Shape::Sequence {
                family: "Slice".into(),
                element: Box::new(element),
            },
        )
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        Vec::<T>::from_value(value).map(Vec::into_boxed_slice)
    }

    fn into_value(self) -> Value {
        self.into_vec().into_value()
    }
}

impl<T: Bindable + Eq + Hash> Bindable for HashSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence("HashSet", T::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        list_items("HashSet", value)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Bindable::into_value).collect())
    }
}

impl<T: Bindable + Ord> Bindable for BTreeSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence("BTreeSet", T::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        list_items("BTreeSet", value)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Bindable::into_value).collect())
    }
}

impl<K, V> Bindable for HashMap<K, V>
where
    K: Bindable + Eq + Hash,
    V: Bindable,
{
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map("HashMap", K::descriptor(), V::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        map_entries("HashMap", value)?
            .into_iter()
            .map(|(key, value)| Ok((K::from_value(key)?, V::from_value(value)?)))
            .collect()
    }

    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(key, value)| (key.into_value(), value.into_value()))
                .collect(),
        )
    }
}

impl<K, V> Bindable for IndexMap<K, V>
where
    K: Bindable + Eq + Hash,
    V: Bindable,
{
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map("IndexMap", K::descriptor(), V::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        map_entries("IndexMap", value)?
            .into_iter()
            .map(|(key, value)| Ok((K::from_value(key)?, V::from_value(value)?)))
            .collect()
    }

    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(key, value)| (key.into_value(), value.into_value()))
                .collect(),
        )
    }
}

impl<K, V> Bindable for BTreeMap<K, V>
where
    K: Bindable + Ord,
    V: Bindable,
{
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map("BTreeMap", K::descriptor(), V::descriptor())
    }

    fn from_value(value: Value) -> BindingResult<Self> {
        map_entries("BTreeMap", value)?
            .into_iter()
            .map(|(key, value)| Ok((K::from_value(key)?, V::from_value(value)?)))
            .collect()
    }

    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(key, value)| (key.into_value(), value.into_value()))
                .collect(),
        )
    }
}

// Scalars that ship with a converter in `ConverterRegistry::with_defaults`
crate::bindable_scalar!(IpAddr, "IpAddr");
crate::bindable_scalar!(Ipv4Addr, "Ipv4Addr");
crate::bindable_scalar!(Ipv6Addr, "Ipv6Addr");
crate::bindable_scalar!(SocketAddr, "SocketAddr");
crate::bindable_scalar!(PathBuf, "PathBuf");
crate::bindable_scalar!(DateTime<Utc>, "DateTime<Utc>");
crate::bindable_scalar!(NaiveDate, "NaiveDate");
crate::bindable_scalar!(NaiveDateTime, "NaiveDateTime");
