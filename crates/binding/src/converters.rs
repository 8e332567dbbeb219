//! Converter registry
//!
//! Extension point for scalar `&str -> T` conversions the engine has no
//! structural rule for (addresses, dates, host value objects). Converters are
//! addressed by the destination's [`TypeKey`]; per-member overrides are
//! addressed by `(declaring type, member name)` and take precedence over every
//! other rule when the coercion request carries a matching [`MemberHint`].

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::types::{Bindable, TypeKey, Value};

type ConvertFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// Type-erased scalar converter
#[derive(Clone)]
pub struct Converter {
    target: &'static str,
    convert: Arc<ConvertFn>,
}

impl Converter {
    fn new<T, F, E>(parse: F) -> Self
    where
        T: Bindable,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self {
            target: std::any::type_name::<T>(),
            convert: Arc::new(move |raw| {
                parse(raw)
                    .map(Bindable::into_value)
                    .map_err(|e| e.to_string())
            }),
        }
    }

    pub fn convert(&self, raw: &str) -> Result<Value, String> {
        (self.convert)(raw)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("target", &self.target)
            .finish()
    }
}

/// Member a value is ultimately bound to, used for converter overrides
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberHint {
    pub declaring_type: String,
    pub member: String,
}

impl MemberHint {
    pub fn new(declaring_type: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            member: member.into(),
        }
    }
}

impl fmt::Display for MemberHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.member)
    }
}

/// Scalar converters keyed by destination type, plus per-member overrides
#[derive(Debug, Clone, Default)]
pub struct ConverterRegistry {
    by_type: HashMap<TypeKey, Converter>,
    by_member: HashMap<MemberHint, Converter>,
}

impl ConverterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Converters for the scalar types `Bindable` is implemented for out of the box
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_from_str::<IpAddr>();
        registry.register_from_str::<Ipv4Addr>();
        registry.register_from_str::<Ipv6Addr>();
        registry.register_from_str::<SocketAddr>();
        registry.register_from_str::<PathBuf>();
        registry.register::<DateTime<Utc>, _, _>(|raw| {
            DateTime::parse_from_rfc3339(raw.trim()).map(|dt| dt.with_timezone(&Utc))
        });
        registry.register::<NaiveDate, _, _>(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d"));
        registry.register::<NaiveDateTime, _, _>(|raw| {
            NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f")
        });
        registry
    }

    /// Register a parser for destination type `T`, replacing any previous one
    pub fn register<T, F, E>(&mut self, parse: F) -> &mut Self
    where
        T: Bindable,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        self.by_type.insert(TypeKey::of::<T>(), Converter::new(parse));
        self
    }

    /// Register `T`'s `FromStr` implementation as its converter
    pub fn register_from_str<T>(&mut self) -> &mut Self
    where
        T: Bindable + FromStr,
        T::Err: fmt::Display,
    {
        self.register::<T, _, _>(|raw| raw.parse::<T>())
    }

    /// Override conversion for one member of one type, whatever its declared shape
    pub fn register_for_member<T, F, E>(
        &mut self,
        declaring_type: impl Into<String>,
        member: impl Into<String>,
        parse: F,
    ) -> &mut Self
    where
        T: Bindable,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        self.by_member.insert(
            MemberHint::new(declaring_type, member),
            Converter::new(parse),
        );
        self
    }

    pub fn for_type(&self, key: &TypeKey) -> Option<&Converter> {
        self.by_type.get(key)
    }

    pub fn for_member(&self, hint: &MemberHint) -> Option<&Converter> {
        self.by_member.get(hint)
    }

    pub fn len(&self) -> usize {
        self.by_type.len() + self.by_member.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
