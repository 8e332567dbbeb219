//! Helper macros for implementing [`Bindable`](crate::Bindable) on host types

/// Implement `Bindable` for a host value object converted by the converter registry.
///
/// The type must be `Clone + Send + Sync + 'static`; a converter for it has to
/// be registered with `ConverterRegistry::register` before coercion.
///
/// ```ignore
/// bindable_scalar!(Email, "Email");
/// ```
#[macro_export]
macro_rules! bindable_scalar {
    ($ty:ty, $name:expr) => {
        impl $crate::Bindable for $ty {
            fn descriptor() -> $crate::TypeDescriptor {
                $crate::TypeDescriptor::new(
                    $name,
                    $crate::Shape::Scalar($crate::TypeKey::of::<$ty>()),
                )
            }

            fn from_value(value: $crate::Value) -> $crate::BindingResult<Self> {
                match value.downcast_ref::<$ty>() {
                    Some(inner) => Ok(::std::clone::Clone::clone(inner)),
                    None => Err($crate::types::value_mismatch($name, &value)),
                }
            }

            fn into_value(self) -> $crate::Value {
                $crate::Value::custom(self)
            }
        }
    };
}

/// Implement `Bindable` for a fieldless enum, parsed by case-sensitive variant name.
///
/// ```ignore
/// bindable_enum!(LogLevel { Debug, Info, Warn });
/// ```
#[macro_export]
macro_rules! bindable_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::Bindable for $ty {
            fn descriptor() -> $crate::TypeDescriptor {
                $crate::TypeDescriptor::enumeration(
                    stringify!($ty),
                    &[$(stringify!($variant)),+],
                )
            }

            fn from_value(value: $crate::Value) -> $crate::BindingResult<Self> {
                match value {
                    $($crate::Value::Enum(stringify!($variant)) => Ok($ty::$variant),)+
                    other => Err($crate::types::value_mismatch(stringify!($ty), &other)),
                }
            }

            fn into_value(self) -> $crate::Value {
                match self {
                    $($ty::$variant => $crate::Value::Enum(stringify!($variant)),)+
                }
            }
        }
    };
}
