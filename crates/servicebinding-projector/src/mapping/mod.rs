//! Workload mapping resolution
//!
//! A [`MappingSource`] answers two questions about a workload: which API
//! resource it is (REST mapping) and where that resource keeps its pod
//! template fields (workload mapping). [`resolve_mapping`] asks both once per
//! request context and caches the answer for the rest of the call chain.

mod cluster;
mod static_source;

pub use cluster::ClusterMappingSource;
pub use static_source::StaticMappingSource;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use servicebinding_common::crd::{
    ClusterWorkloadResourceMappingSpec, ClusterWorkloadResourceMappingTemplate,
};
use servicebinding_common::{Error, Result};

use crate::context::RequestContext;

/// Source of REST and workload mappings
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MappingSource: Send + Sync {
    /// Resolve the API resource of a workload from its type metadata
    async fn lookup_rest_mapping(&self, workload: &DynamicObject) -> Result<ApiResource>;

    /// Fetch the workload mapping for an API resource
    async fn lookup_workload_mapping(
        &self,
        resource: &ApiResource,
    ) -> Result<ClusterWorkloadResourceMappingSpec>;
}

/// Workload mapping together with the resource it was resolved for
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMapping {
    /// Workload mapping
    pub mapping: ClusterWorkloadResourceMappingSpec,
    /// API resource of the workload
    pub resource: ApiResource,
}

impl ResolvedMapping {
    /// Resource version the workload is served at
    pub fn version(&self) -> &str {
        &self.resource.version
    }

    /// Template of `mapping` for the resolved resource version
    pub fn template_of(
        &self,
        mapping: &ClusterWorkloadResourceMappingSpec,
    ) -> ClusterWorkloadResourceMappingTemplate {
        mapping.template_for(self.version())
    }
}

/// Resolve the mapping for `workload`, at most once per request context.
///
/// Both lookups honor the context's cancellation and deadline. Lookup
/// failures are returned unchanged and leave the cache empty.
pub async fn resolve_mapping(
    source: &dyn MappingSource,
    ctx: &RequestContext,
    workload: &DynamicObject,
) -> Result<ResolvedMapping> {
    let resolved = ctx
        .mapping_cache()
        .get_or_try_init(|| async {
            let resource = ctx
                .run("lookup_rest_mapping", || source.lookup_rest_mapping(workload))
                .await?;
            let mapping = ctx
                .run(
                    "lookup_workload_mapping",
                    || source.lookup_workload_mapping(&resource),
                )
                .await?;
            debug!(
                api_version = %resource.api_version,
                kind = %resource.kind,
                templates = mapping.versions.len(),
                "resolved workload mapping"
            );
            Ok::<_, Error>(ResolvedMapping { mapping, resource })
        })
        .await?;
    Ok(resolved.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicebinding_common::kube_utils::build_api_resource;
    use tokio_util::sync::CancellationToken;

    fn workload() -> DynamicObject {
        DynamicObject::new("web", &build_api_resource("apps/v1", "Deployment"))
    }

    fn counting_source() -> MockMappingSource {
        let mut source = MockMappingSource::new();
        source
            .expect_lookup_rest_mapping()
            .times(1)
            .returning(|_| Ok(build_api_resource("apps/v1", "Deployment")));
        source
            .expect_lookup_workload_mapping()
            .times(1)
            .returning(|_| Ok(ClusterWorkloadResourceMappingSpec::wildcard()));
        source
    }

    #[tokio::test]
    async fn lookups_run_once_per_context() {
        let source = counting_source();
        let ctx = RequestContext::new();
        let workload = workload();

        let first = resolve_mapping(&source, &ctx, &workload).await.expect("first");
        let second = resolve_mapping(&source, &ctx, &workload).await.expect("second");
        assert_eq!(first, second);
        assert_eq!(first.version(), "v1");
        assert_eq!(first.resource.plural, "deployments");
    }

    #[tokio::test]
    async fn new_context_resolves_again() {
        let mut source = MockMappingSource::new();
        source
            .expect_lookup_rest_mapping()
            .times(2)
            .returning(|_| Ok(build_api_resource("apps/v1", "Deployment")));
        source
            .expect_lookup_workload_mapping()
            .times(2)
            .returning(|_| Ok(ClusterWorkloadResourceMappingSpec::wildcard()));
        let workload = workload();

        let parent = RequestContext::new();
        resolve_mapping(&source, &parent, &workload).await.expect("parent");
        resolve_mapping(&source, &parent.child(), &workload)
            .await
            .expect("child");
    }

    #[tokio::test]
    async fn rest_mapping_failure_skips_workload_lookup() {
        let mut source = MockMappingSource::new();
        source
            .expect_lookup_rest_mapping()
            .times(1)
            .returning(|_| Err(Error::lookup_not_found("example.com/v1 Widget", "not served")));
        source.expect_lookup_workload_mapping().never();

        let ctx = RequestContext::new();
        let err = resolve_mapping(&source, &ctx, &workload())
            .await
            .expect_err("lookup error");
        assert!(matches!(err, Error::Lookup { retryable: false, .. }));
        assert!(ctx.mapping_cache().get().is_none());
    }

    #[tokio::test]
    async fn workload_mapping_failure_is_propagated() {
        let mut source = MockMappingSource::new();
        source
            .expect_lookup_rest_mapping()
            .returning(|_| Ok(build_api_resource("batch/v1", "CronJob")));
        source
            .expect_lookup_workload_mapping()
            .withf(|resource| resource.plural == "cronjobs")
            .returning(|_| Err(Error::lookup("cronjobs.batch", "connection reset")));

        let err = resolve_mapping(&source, &RequestContext::new(), &workload())
            .await
            .expect_err("lookup error");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn cancelled_context_skips_lookups() {
        let mut source = MockMappingSource::new();
        source.expect_lookup_rest_mapping().never();
        source.expect_lookup_workload_mapping().never();

        let token = CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::with_cancellation(token);
        let err = resolve_mapping(&source, &ctx, &workload())
            .await
            .expect_err("cancelled");
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[test]
    fn template_of_uses_resolved_version() {
        let resolved = ResolvedMapping {
            mapping: ClusterWorkloadResourceMappingSpec::default(),
            resource: build_api_resource("apps/v1", "Deployment"),
        };
        let template = resolved.template_of(&ClusterWorkloadResourceMappingSpec::wildcard());
        assert_eq!(template.version, "*");
        assert_eq!(resolved.template_of(&resolved.mapping).version, "v1");
    }
}
