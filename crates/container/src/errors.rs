//! Container errors

use binding::BindingError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContainerError {
    /// Coercion or parameter binding failed
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("Unknown component type '{name}' at key '{key}'")]
    UnknownType { name: String, key: String },

    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    #[error("No viable constructor for {component}: unmatched parameters [{}]", .unmatched.join(", "))]
    NoViableConstructor {
        component: String,
        unmatched: Vec<String>,
    },

    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("Invalid configuration at '{key}': {reason}")]
    Configuration { key: String, reason: String },

    #[error("Activation of {component} failed: {reason}")]
    Activation { component: String, reason: String },
}

pub type ContainerResult<T> = Result<T, ContainerError>;

impl ContainerError {
    pub fn configuration(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn activation(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Activation {
            component: component.into(),
            reason: reason.into(),
        }
    }
}
