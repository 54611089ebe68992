//! Common types for service binding projection: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group of the projector's annotations, as a literal for `concat!`
#[macro_export]
macro_rules! projector_group {
    () => {
        "projector.servicebinding.io"
    };
}

/// API group of the projector's annotations
pub const PROJECTOR_GROUP: &str = projector_group!();

/// Env var naming the directory bindings are mounted under
pub const SERVICE_BINDING_ROOT_ENV: &str = "SERVICE_BINDING_ROOT";

/// Binding root used when a container does not set `SERVICE_BINDING_ROOT`
pub const DEFAULT_SERVICE_BINDING_ROOT: &str = "/bindings";
