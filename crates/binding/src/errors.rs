//! Binding errors
//!
//! Every failure raised while reading configuration, coercing values or
//! resolving deferred parameters surfaces as a [`BindingError`]. Messages
//! always name the destination type and the raw value or key so that a broken
//! configuration file can be fixed without reading the source.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the coercion engine and the parameter binder
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    /// Required input (configuration key, section) absent or empty
    #[error("Invalid argument '{argument}': {reason}")]
    Argument { argument: String, reason: String },

    /// Destination claims to be a sequence/map but no concrete container exists for it
    #[error("Unsupported collection shape '{family}' for destination type {destination}{}", key_suffix(.key))]
    UnsupportedCollectionShape {
        destination: String,
        family: String,
        key: Option<String>,
    },

    /// Conversion of a present (or required) raw value failed
    #[error("Cannot convert {} to {destination}{}: {reason}", raw_display(.raw), key_suffix(.key))]
    Coercion {
        destination: String,
        raw: Option<String>,
        key: Option<String>,
        reason: String,
    },

    /// No structural rule and no registered converter for the destination type
    #[error("No converter registered for destination type {destination} (raw value {}){}", raw_display(.raw), key_suffix(.key))]
    MissingConverter {
        destination: String,
        raw: Option<String>,
        key: Option<String>,
    },
}

pub type BindingResult<T> = Result<T, BindingError>;

/// Errors raised while turning a configuration document into a tree
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} configuration: {reason}")]
    Parse { format: &'static str, reason: String },

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type LoadResult<T> = Result<T, LoaderError>;

fn raw_display(raw: &Option<String>) -> String {
    match raw {
        Some(raw) => format!("'{raw}'"),
        None => "<no value>".to_string(),
    }
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        Some(key) => format!(" at key '{key}'"),
        None => String::new(),
    }
}

impl BindingError {
    pub fn argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Argument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    pub fn coercion(
        destination: impl Into<String>,
        raw: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Coercion {
            destination: destination.into(),
            raw: raw.map(str::to_string),
            key: None,
            reason: reason.into(),
        }
    }

    pub fn missing_converter(destination: impl Into<String>, raw: Option<&str>) -> Self {
        Self::MissingConverter {
            destination: destination.into(),
            raw: raw.map(str::to_string),
            key: None,
        }
    }

    pub fn unsupported_shape(destination: impl Into<String>, family: impl Into<String>) -> Self {
        Self::UnsupportedCollectionShape {
            destination: destination.into(),
            family: family.into(),
            key: None,
        }
    }

    /// Prefix the key the failure belongs to with `at`.
    ///
    /// Nested coercions add their child name on the way out, so a failure deep
    /// inside a list of maps ends up carrying `servers:1:port`.
    pub fn at_key(mut self, at: &str) -> Self {
        match &mut self {
            Self::Argument { .. } => {}
            Self::UnsupportedCollectionShape { key, .. }
            | Self::Coercion { key, .. }
            | Self::MissingConverter { key, .. } => {
                *key = Some(match key.take() {
                    Some(inner) => format!("{at}:{inner}"),
                    None => at.to_string(),
                });
            }
        }
        self
    }

    /// Destination type named by the error, if any
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Argument { .. } => None,
            Self::UnsupportedCollectionShape { destination, .. }
            | Self::Coercion { destination, .. }
            | Self::MissingConverter { destination, .. } => Some(destination),
        }
    }
}
