//! ClusterWorkloadResourceMapping CRD
//!
//! Describes where the pod template fields live inside a workload resource
//! that is not a plain PodSpec-able type. Mappings are cluster scoped and
//! named `<plural>.<group>` (e.g. `cronjobs.batch`) after the resource they
//! describe. Each entry in `versions` applies to one resource version, or to
//! every version when it is `*`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Version that matches any resource version
pub const WILDCARD_VERSION: &str = "*";

/// Default path to the pod template annotations
pub const DEFAULT_ANNOTATIONS_PATH: &str = ".spec.template.metadata.annotations";
/// Default path to the pod template volumes
pub const DEFAULT_VOLUMES_PATH: &str = ".spec.template.spec.volumes";
/// Default path to the init containers
pub const DEFAULT_INIT_CONTAINERS_PATH: &str = ".spec.template.spec.initContainers[*]";
/// Default path to the containers
pub const DEFAULT_CONTAINERS_PATH: &str = ".spec.template.spec.containers[*]";
/// Default container name path, relative to a container
pub const DEFAULT_NAME_PATH: &str = ".name";
/// Default env path, relative to a container
pub const DEFAULT_ENV_PATH: &str = ".env";
/// Default volume mounts path, relative to a container
pub const DEFAULT_VOLUME_MOUNTS_PATH: &str = ".volumeMounts";

/// ClusterWorkloadResourceMapping declares pod template locations for a resource.
///
/// Example:
/// ```yaml
/// apiVersion: servicebinding.io/v1
/// kind: ClusterWorkloadResourceMapping
/// metadata:
///   name: cronjobs.batch
/// spec:
///   versions:
///     - version: "*"
///       annotations: .spec.jobTemplate.spec.template.metadata.annotations
///       containers:
///         - path: .spec.jobTemplate.spec.template.spec.containers[*]
///           name: .name
///       volumes: .spec.jobTemplate.spec.template.spec.volumes
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "servicebinding.io",
    version = "v1",
    kind = "ClusterWorkloadResourceMapping",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterWorkloadResourceMappingSpec {
    /// Per-version mapping templates
    #[serde(default)]
    pub versions: Vec<ClusterWorkloadResourceMappingTemplate>,
}

/// Field locations for one version of a workload resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterWorkloadResourceMappingTemplate {
    /// Resource version this template applies to, or `*`
    pub version: String,

    /// Path to the pod template annotations map
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub annotations: String,

    /// Container locations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ClusterWorkloadResourceMappingContainer>,

    /// Path to the pod template volumes list
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub volumes: String,
}

/// Location of a set of containers and their fields
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterWorkloadResourceMappingContainer {
    /// Path to the container object(s); may contain `[*]`
    pub path: String,

    /// Path to the container name, relative to the container. Empty means the
    /// containers are unnamed and always selected.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Path to the env list, relative to the container
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env: String,

    /// Path to the volume mounts list, relative to the container
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub volume_mounts: String,
}

impl ClusterWorkloadResourceMappingSpec {
    /// Mapping with a single wildcard template, i.e. a PodSpec-able resource
    pub fn wildcard() -> Self {
        Self {
            versions: vec![ClusterWorkloadResourceMappingTemplate::new(
                WILDCARD_VERSION,
            )],
        }
    }

    /// Select the template for a resource version, with defaults applied.
    ///
    /// An exact version match wins over `*`; with neither present the result
    /// is the default PodSpec-able template.
    pub fn template_for(&self, version: &str) -> ClusterWorkloadResourceMappingTemplate {
        let exact = self.versions.iter().find(|t| t.version == version);
        let wildcard = || self.versions.iter().find(|t| t.version == WILDCARD_VERSION);
        exact
            .or_else(wildcard)
            .cloned()
            .unwrap_or_else(|| ClusterWorkloadResourceMappingTemplate::new(version))
            .with_defaults()
    }

    /// Apply defaults to every version template
    pub fn with_defaults(mut self) -> Self {
        self.versions = self
            .versions
            .into_iter()
            .map(ClusterWorkloadResourceMappingTemplate::with_defaults)
            .collect();
        self
    }
}

impl ClusterWorkloadResourceMappingTemplate {
    /// Create an empty template for a version
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Fill in unset paths with the PodSpec-able defaults
    pub fn with_defaults(mut self) -> Self {
        if self.annotations.is_empty() {
            self.annotations = DEFAULT_ANNOTATIONS_PATH.to_string();
        }
        if self.volumes.is_empty() {
            self.volumes = DEFAULT_VOLUMES_PATH.to_string();
        }
        if self.containers.is_empty() {
            self.containers = vec![
                ClusterWorkloadResourceMappingContainer::named(DEFAULT_INIT_CONTAINERS_PATH),
                ClusterWorkloadResourceMappingContainer::named(DEFAULT_CONTAINERS_PATH),
            ];
        }
        self.containers = self
            .containers
            .into_iter()
            .map(ClusterWorkloadResourceMappingContainer::with_defaults)
            .collect();
        self
    }
}

impl ClusterWorkloadResourceMappingContainer {
    /// Container location whose entries are named by `.name`
    pub fn named(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: DEFAULT_NAME_PATH.to_string(),
            ..Default::default()
        }
    }

    /// Fill in unset env and volume mount paths
    pub fn with_defaults(mut self) -> Self {
        if self.env.is_empty() {
            self.env = DEFAULT_ENV_PATH.to_string();
        }
        if self.volume_mounts.is_empty() {
            self.volume_mounts = DEFAULT_VOLUME_MOUNTS_PATH.to_string();
        }
        self
    }
}

impl ClusterWorkloadResourceMapping {
    /// Name of the mapping resource for a resource plural and group
    ///
    /// Core group resources have no group suffix.
    pub fn name_for(plural: &str, group: &str) -> String {
        if group.is_empty() {
            plural.to_string()
        } else {
            format!("{}.{}", plural, group)
        }
    }
}
