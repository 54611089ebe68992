//! In-memory mapping source
//!
//! Used when no cluster is available (offline projection, tests) and as a
//! registry of the well-known workload kinds.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;

use servicebinding_common::crd::{
    ClusterWorkloadResourceMapping, ClusterWorkloadResourceMappingContainer,
    ClusterWorkloadResourceMappingSpec, ClusterWorkloadResourceMappingTemplate, WILDCARD_VERSION,
};
use servicebinding_common::kube_utils::{build_api_resource, format_gvk, object_gvk};
use servicebinding_common::{Error, Result};

use super::MappingSource;

/// PodSpec-able kinds served with the default template
const PODSPECABLE_WORKLOADS: &[(&str, &str)] = &[
    ("apps/v1", "Deployment"),
    ("apps/v1", "ReplicaSet"),
    ("apps/v1", "StatefulSet"),
    ("apps/v1", "DaemonSet"),
    ("batch/v1", "Job"),
];

/// Registry of API resources and workload mappings
#[derive(Clone, Debug, Default)]
pub struct StaticMappingSource {
    resources: BTreeMap<(String, String, String), ApiResource>,
    mappings: BTreeMap<String, ClusterWorkloadResourceMappingSpec>,
}

impl StaticMappingSource {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the core workload kinds
    ///
    /// Deployments, ReplicaSets, StatefulSets, DaemonSets and Jobs use the
    /// default template; CronJobs map to their job template.
    pub fn with_builtin_workloads() -> Self {
        let mut source = Self::new();
        for (api_version, kind) in PODSPECABLE_WORKLOADS {
            let resource = build_api_resource(api_version, kind);
            source.register_mapping(
                ClusterWorkloadResourceMapping::name_for(&resource.plural, &resource.group),
                ClusterWorkloadResourceMappingSpec::wildcard(),
            );
            source.register_resource(resource);
        }
        let cronjobs = build_api_resource("batch/v1", "CronJob");
        source.register_mapping(
            ClusterWorkloadResourceMapping::name_for(&cronjobs.plural, &cronjobs.group),
            cronjob_mapping(),
        );
        source.register_resource(cronjobs);
        source
    }

    /// Register a resource by apiVersion and kind, deriving its plural
    pub fn register_kind(&mut self, api_version: &str, kind: &str) -> &mut Self {
        self.register_resource(build_api_resource(api_version, kind))
    }

    /// Register a resource
    pub fn register_resource(&mut self, resource: ApiResource) -> &mut Self {
        self.resources.insert(
            (
                resource.group.clone(),
                resource.version.clone(),
                resource.kind.clone(),
            ),
            resource,
        );
        self
    }

    /// Register a workload mapping under its resource name (`<plural>.<group>`)
    pub fn register_mapping(
        &mut self,
        name: impl Into<String>,
        mapping: ClusterWorkloadResourceMappingSpec,
    ) -> &mut Self {
        self.mappings.insert(name.into(), mapping);
        self
    }

    /// Register a mapping resource under its own name
    pub fn register_cluster_mapping(&mut self, mapping: ClusterWorkloadResourceMapping) -> &mut Self {
        let name = mapping.metadata.name.clone().unwrap_or_default();
        self.register_mapping(name, mapping.spec)
    }

    /// Whether a mapping is registered under `name`
    pub fn has_mapping(&self, name: &str) -> bool {
        self.mappings.contains_key(name)
    }
}

fn cronjob_mapping() -> ClusterWorkloadResourceMappingSpec {
    let base = ".spec.jobTemplate.spec.template";
    ClusterWorkloadResourceMappingSpec {
        versions: vec![ClusterWorkloadResourceMappingTemplate {
            version: WILDCARD_VERSION.to_string(),
            annotations: format!("{}.metadata.annotations", base),
            containers: vec![
                ClusterWorkloadResourceMappingContainer::named(format!(
                    "{}.spec.initContainers[*]",
                    base
                )),
                ClusterWorkloadResourceMappingContainer::named(format!(
                    "{}.spec.containers[*]",
                    base
                )),
            ],
            volumes: format!("{}.spec.volumes", base),
        }],
    }
}

#[async_trait]
impl MappingSource for StaticMappingSource {
    async fn lookup_rest_mapping(&self, workload: &DynamicObject) -> Result<ApiResource> {
        let gvk = object_gvk(workload)?;
        self.resources
            .get(&(gvk.group.clone(), gvk.version.clone(), gvk.kind.clone()))
            .cloned()
            .ok_or_else(|| Error::lookup_not_found(format_gvk(&gvk), "kind is not registered"))
    }

    async fn lookup_workload_mapping(
        &self,
        resource: &ApiResource,
    ) -> Result<ClusterWorkloadResourceMappingSpec> {
        let name = ClusterWorkloadResourceMapping::name_for(&resource.plural, &resource.group);
        self.mappings
            .get(&name)
            .cloned()
            .map(ClusterWorkloadResourceMappingSpec::with_defaults)
            .ok_or_else(|| Error::lookup_not_found(name, "ClusterWorkloadResourceMapping not found"))
    }
}
