//! Custom Resource Definitions consumed by the projector
//!
//! Both CRDs live in the `servicebinding.io/v1` group.

mod binding;
mod mapping;

pub use binding::{
    EnvMapping, ServiceBinding, ServiceBindingSecretReference, ServiceBindingServiceReference,
    ServiceBindingSpec, ServiceBindingStatus, ServiceBindingWorkloadReference,
};
pub use mapping::{
    ClusterWorkloadResourceMapping, ClusterWorkloadResourceMappingContainer,
    ClusterWorkloadResourceMappingSpec, ClusterWorkloadResourceMappingTemplate,
    DEFAULT_ANNOTATIONS_PATH, DEFAULT_CONTAINERS_PATH, DEFAULT_ENV_PATH,
    DEFAULT_INIT_CONTAINERS_PATH, DEFAULT_NAME_PATH, DEFAULT_VOLUMES_PATH,
    DEFAULT_VOLUME_MOUNTS_PATH, WILDCARD_VERSION,
};
