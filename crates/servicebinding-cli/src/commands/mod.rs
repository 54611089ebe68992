//! CLI commands

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use kube::api::DynamicObject;
use serde::Deserialize;
use tracing::{debug, warn};

use servicebinding_common::crd::{
    ClusterWorkloadResourceMapping, ClusterWorkloadResourceMappingSpec, ServiceBinding,
};
use servicebinding_common::kube_utils::{build_api_resource, create_client};
use servicebinding_projector::{
    ClusterMappingSource, MappingSource, RequestContext, StaticMappingSource,
};

use crate::{Error, Result};

pub mod crd;
pub mod project;
pub mod status;

/// Where mappings come from and how long a request may take
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Resolve REST and workload mappings from the cluster
    #[arg(long)]
    pub cluster: bool,

    /// Kubeconfig used with --cluster (defaults to the usual kube resolution)
    #[arg(long, env = "SBPROJ_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Treat kinds without a ClusterWorkloadResourceMapping as PodSpec-able
    #[arg(long)]
    pub podspecable_fallback: bool,

    /// Abort the request after this many seconds
    #[arg(long, env = "SBPROJ_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

impl SourceArgs {
    /// Request context honouring the configured timeout
    pub fn request_context(&self) -> RequestContext {
        match self.timeout_secs {
            Some(secs) => RequestContext::new().with_timeout(Duration::from_secs(secs)),
            None => RequestContext::new(),
        }
    }

    /// Build the mapping source for `workload`
    ///
    /// Offline, the built-in workload kinds plus `mappings` are known and the
    /// workload's own kind is registered from its type metadata.
    pub async fn mapping_source(
        &self,
        workload: &DynamicObject,
        mappings: Vec<ClusterWorkloadResourceMapping>,
    ) -> Result<Arc<dyn MappingSource>> {
        if self.cluster {
            if !mappings.is_empty() {
                return Err(Error::validation(
                    "--mapping files cannot be combined with --cluster",
                ));
            }
            let client = create_client(self.kubeconfig.as_deref()).await?;
            debug!(podspecable_fallback = self.podspecable_fallback, "using cluster mappings");
            return Ok(Arc::new(
                ClusterMappingSource::new(client)
                    .with_podspecable_fallback(self.podspecable_fallback),
            ));
        }

        if self.kubeconfig.is_some() {
            warn!("--kubeconfig is ignored without --cluster");
        }
        Ok(Arc::new(self.static_source(workload, mappings)?))
    }

    fn static_source(
        &self,
        workload: &DynamicObject,
        mappings: Vec<ClusterWorkloadResourceMapping>,
    ) -> Result<StaticMappingSource> {
        let types = workload
            .types
            .as_ref()
            .ok_or_else(|| Error::validation("workload has no apiVersion/kind"))?;

        let mut source = StaticMappingSource::with_builtin_workloads();
        for mapping in mappings {
            source.register_cluster_mapping(mapping);
        }

        let resource = build_api_resource(&types.api_version, &types.kind);
        let name = ClusterWorkloadResourceMapping::name_for(&resource.plural, &resource.group);
        if self.podspecable_fallback && !source.has_mapping(&name) {
            debug!(mapping = %name, "registering PodSpec-able fallback mapping");
            source.register_mapping(name, ClusterWorkloadResourceMappingSpec::wildcard());
        }
        source.register_resource(resource);
        Ok(source)
    }
}

/// Read a file into a string
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Load a single ServiceBinding
pub fn load_binding(path: &Path) -> Result<ServiceBinding> {
    let binding: ServiceBinding = serde_yaml::from_str(&read_file(path)?)?;
    if binding.metadata.uid.as_deref().unwrap_or_default().is_empty() {
        return Err(Error::validation(format!(
            "{}: ServiceBinding has no metadata.uid",
            path.display()
        )));
    }
    Ok(binding)
}

/// Load a single workload manifest
pub fn load_workload(path: &Path) -> Result<DynamicObject> {
    let workload: DynamicObject = serde_yaml::from_str(&read_file(path)?)?;
    if workload.types.is_none() {
        return Err(Error::validation(format!(
            "{}: workload has no apiVersion/kind",
            path.display()
        )));
    }
    Ok(workload)
}

/// Load every ClusterWorkloadResourceMapping from multi-document YAML files
pub fn load_mappings(paths: &[PathBuf]) -> Result<Vec<ClusterWorkloadResourceMapping>> {
    let mut mappings = Vec::new();
    for path in paths {
        let content = read_file(path)?;
        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            let mapping: ClusterWorkloadResourceMapping = serde_yaml::from_value(value)?;
            if mapping.metadata.name.is_none() {
                return Err(Error::validation(format!(
                    "{}: ClusterWorkloadResourceMapping has no metadata.name",
                    path.display()
                )));
            }
            mappings.push(mapping);
        }
    }
    Ok(mappings)
}

/// Write YAML to `output`, or stdout when unset
pub fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content).map_err(|e| Error::io(path, e)),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}
