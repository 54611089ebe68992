//! Mapping source backed by the Kubernetes API

use async_trait::async_trait;
use kube::api::{Api, DynamicObject};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::debug;

use servicebinding_common::crd::{ClusterWorkloadResourceMapping, ClusterWorkloadResourceMappingSpec};
use servicebinding_common::kube_utils::{discover_api_resource, object_gvk};
use servicebinding_common::{Error, Result};

use super::MappingSource;

/// Resolves REST mappings through API discovery and workload mappings from
/// `ClusterWorkloadResourceMapping` resources.
#[derive(Clone)]
pub struct ClusterMappingSource {
    client: Client,
    podspecable_fallback: bool,
}

impl ClusterMappingSource {
    /// Source that fails lookups for resources without a mapping
    pub fn new(client: Client) -> Self {
        Self {
            client,
            podspecable_fallback: false,
        }
    }

    /// Treat resources without a mapping as PodSpec-able instead of failing
    pub fn with_podspecable_fallback(mut self, enabled: bool) -> Self {
        self.podspecable_fallback = enabled;
        self
    }
}

#[async_trait]
impl MappingSource for ClusterMappingSource {
    async fn lookup_rest_mapping(&self, workload: &DynamicObject) -> Result<ApiResource> {
        let gvk = object_gvk(workload)?;
        discover_api_resource(&self.client, &gvk).await
    }

    async fn lookup_workload_mapping(
        &self,
        resource: &ApiResource,
    ) -> Result<ClusterWorkloadResourceMappingSpec> {
        let name = ClusterWorkloadResourceMapping::name_for(&resource.plural, &resource.group);
        let api: Api<ClusterWorkloadResourceMapping> = Api::all(self.client.clone());

        match api.get_opt(&name).await {
            Ok(Some(mapping)) => Ok(mapping.spec.with_defaults()),
            Ok(None) if self.podspecable_fallback => {
                debug!(mapping = %name, "no workload mapping, assuming PodSpec-able resource");
                Ok(ClusterWorkloadResourceMappingSpec::wildcard().with_defaults())
            }
            Ok(None) => Err(Error::lookup_not_found(
                name,
                "ClusterWorkloadResourceMapping not found",
            )),
            Err(e) => Err(Error::lookup(name, e.to_string())),
        }
    }
}
