//! Configuration-driven parameter binding
//!
//! Loads hierarchical configuration into an immutable [`ConfigTree`], coerces
//! nodes into destination types with the [`CoercionEngine`], and hands a DI
//! host [`DeferredParameter`] capabilities that bind configured values to
//! constructor parameters and properties by name.

#[macro_use]
mod macros;

pub mod coercion;
pub mod converters;
pub mod errors;
pub mod list;
pub mod loader;
pub mod node;
pub mod parameters;
pub mod shapes;
pub mod types;

pub use coercion::{CoercionEngine, CoercionRequest};
pub use converters::{Converter, ConverterRegistry, MemberHint};
pub use errors::{BindingError, BindingResult, LoadResult, LoaderError};
pub use list::{ListLayout, ListMaterializer};
pub use loader::{ConfigFormat, ConfigurationLoader};
pub use node::{ConfigNode, ConfigNodeBuilder, ConfigStore, ConfigTree, KEY_DELIMITER};
pub use parameters::{
    BindingScope, Candidate, DeferredParameter, MemberKind, MemberOwner, NamedValue,
    ParameterBinder, ParameterCapability,
};
pub use shapes::{MapStrategy, SequenceStrategy, ShapeRegistry};
pub use types::{Bindable, NumberKind, Shape, TypeDescriptor, TypeKey, Value};
