//! Binding projector entry points
//!
//! [`ServiceBindingProjector`] ties mapping resolution, the pod template
//! view, the projection algorithms and the provenance stash together.
//! `project` always starts by unprojecting, so repeated calls converge on the
//! same workload regardless of what an earlier pass left behind.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
use tracing::{debug, info, instrument};

use servicebinding_common::crd::ServiceBinding;
use servicebinding_common::kube_utils::object_display_name;
use servicebinding_common::Result;

use crate::context::RequestContext;
use crate::mapping::{resolve_mapping, MappingSource};
use crate::names::BindingNames;
use crate::pod_template::MetaPodTemplate;
use crate::projection;
use crate::stash::{retrieve_local, stash_local};

/// Projects service bindings into workloads
#[async_trait]
pub trait BindingProjector: Send + Sync {
    /// Project `binding` into `workload`, replacing any earlier projection.
    ///
    /// A binding that is unbound or does not target the workload ends up
    /// unprojected.
    async fn project(
        &self,
        ctx: &RequestContext,
        binding: &ServiceBinding,
        workload: &mut DynamicObject,
    ) -> Result<()>;

    /// Remove everything `binding` projected into `workload`
    async fn unproject(
        &self,
        ctx: &RequestContext,
        binding: &ServiceBinding,
        workload: &mut DynamicObject,
    ) -> Result<()>;

    /// Whether `binding` is currently projected into `workload`
    fn is_projected(&self, binding: &ServiceBinding, workload: &DynamicObject) -> bool;
}

/// Projector resolving workload layouts through a [`MappingSource`]
#[derive(Clone)]
pub struct ServiceBindingProjector {
    mapping_source: Arc<dyn MappingSource>,
}

impl ServiceBindingProjector {
    /// Create a projector over a mapping source
    pub fn new(mapping_source: Arc<dyn MappingSource>) -> Self {
        Self { mapping_source }
    }
}

fn uid(binding: &ServiceBinding) -> &str {
    binding.metadata.uid.as_deref().unwrap_or_default()
}

#[async_trait]
impl BindingProjector for ServiceBindingProjector {
    #[instrument(
        skip_all,
        fields(binding = %uid(binding), workload = %object_display_name(workload))
    )]
    async fn project(
        &self,
        ctx: &RequestContext,
        binding: &ServiceBinding,
        workload: &mut DynamicObject,
    ) -> Result<()> {
        let resolved = resolve_mapping(self.mapping_source.as_ref(), ctx, workload).await?;

        self.unproject(ctx, binding, workload).await?;

        if !projection::should_project(binding, workload) {
            debug!("binding is unbound or does not target workload");
            return Ok(());
        }

        let template = resolved.template_of(&resolved.mapping);
        let mut view = MetaPodTemplate::new(workload, &template)?;
        projection::project(binding, &mut view);
        stash_local(binding, &mut view, Some(&resolved.mapping))?;
        view.write_to_workload(ctx, workload)?;

        info!(
            version = %resolved.version(),
            containers = view.containers.len(),
            "projected binding"
        );
        Ok(())
    }

    #[instrument(
        skip_all,
        fields(binding = %uid(binding), workload = %object_display_name(workload))
    )]
    async fn unproject(
        &self,
        ctx: &RequestContext,
        binding: &ServiceBinding,
        workload: &mut DynamicObject,
    ) -> Result<()> {
        let stashed = retrieve_local(binding, workload)?;
        let resolved = resolve_mapping(self.mapping_source.as_ref(), ctx, workload).await?;
        let mapping = match &stashed {
            Some(mapping) => mapping,
            None => {
                debug!("no stashed mapping, using live mapping");
                &resolved.mapping
            }
        };

        let template = resolved.template_of(mapping);
        let mut view = MetaPodTemplate::new(workload, &template)?;
        projection::unproject(binding, &mut view);
        stash_local(binding, &mut view, None)?;
        view.write_to_workload(ctx, workload)?;

        debug!(stashed = stashed.is_some(), "unprojected binding");
        Ok(())
    }

    fn is_projected(&self, binding: &ServiceBinding, workload: &DynamicObject) -> bool {
        let key = BindingNames::of(binding).mapping_annotation;
        workload
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|annotations| annotations.contains_key(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MockMappingSource;
    use servicebinding_common::crd::{
        ClusterWorkloadResourceMappingSpec, EnvMapping, ServiceBindingSecretReference,
        ServiceBindingSpec, ServiceBindingStatus, ServiceBindingWorkloadReference,
    };
    use servicebinding_common::kube_utils::build_api_resource;
    use servicebinding_common::Error;

    fn binding(secret: &str) -> ServiceBinding {
        let mut binding = ServiceBinding::new(
            "db",
            ServiceBindingSpec {
                name: "db".to_string(),
                workload: ServiceBindingWorkloadReference {
                    api_version: "apps/v1".to_string(),
                    kind: "Deployment".to_string(),
                    name: Some("web".to_string()),
                    ..Default::default()
                },
                env: vec![EnvMapping::new("DB_USER", "username")],
                ..Default::default()
            },
        );
        binding.metadata.uid = Some("uid-1".to_string());
        binding.status = Some(ServiceBindingStatus {
            binding: Some(ServiceBindingSecretReference {
                name: secret.to_string(),
            }),
            ..Default::default()
        });
        binding
    }

    fn workload() -> DynamicObject {
        serde_yaml::from_str(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
        - name: app
"#,
        )
        .expect("workload")
    }

    /// Mapping source expected to be consulted exactly once
    fn single_lookup_source() -> Arc<MockMappingSource> {
        let mut source = MockMappingSource::new();
        source
            .expect_lookup_rest_mapping()
            .times(1)
            .returning(|_| Ok(build_api_resource("apps/v1", "Deployment")));
        source
            .expect_lookup_workload_mapping()
            .times(1)
            .returning(|_| Ok(ClusterWorkloadResourceMappingSpec::wildcard().with_defaults()));
        Arc::new(source)
    }

    #[tokio::test]
    async fn project_resolves_mapping_once_for_nested_unproject() {
        let projector = ServiceBindingProjector::new(single_lookup_source());
        let binding = binding("db-secret");
        let mut workload = workload();

        projector
            .project(&RequestContext::new(), &binding, &mut workload)
            .await
            .expect("project");
        assert!(projector.is_projected(&binding, &workload));

        let doc = serde_json::to_value(&workload).expect("json");
        let container = &doc["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["volumeMounts"][0]["mountPath"], "/bindings/db");
        assert_eq!(
            container["env"][1]["valueFrom"]["secretKeyRef"]["name"],
            "db-secret"
        );
    }

    #[tokio::test]
    async fn unbound_binding_only_unprojects() {
        let mut source = MockMappingSource::new();
        source
            .expect_lookup_rest_mapping()
            .returning(|_| Ok(build_api_resource("apps/v1", "Deployment")));
        source
            .expect_lookup_workload_mapping()
            .returning(|_| Ok(ClusterWorkloadResourceMappingSpec::wildcard().with_defaults()));
        let projector = ServiceBindingProjector::new(Arc::new(source));

        let mut workload = workload();
        projector
            .project(&RequestContext::new(), &binding("db-secret"), &mut workload)
            .await
            .expect("project");
        projector
            .project(&RequestContext::new(), &binding(""), &mut workload)
            .await
            .expect("project unbound");

        assert!(!projector.is_projected(&binding(""), &workload));
        let doc = serde_json::to_value(&workload).expect("json");
        let spec = &doc["spec"]["template"]["spec"];
        assert!(spec.get("volumes").is_none());
        assert!(spec["containers"][0].get("volumeMounts").is_none());
    }

    #[tokio::test]
    async fn lookup_failure_leaves_workload_untouched() {
        let mut source = MockMappingSource::new();
        source
            .expect_lookup_rest_mapping()
            .returning(|_| Err(Error::lookup_not_found("apps/v1 Deployment", "not served")));
        let projector = ServiceBindingProjector::new(Arc::new(source));

        let mut workload = workload();
        let err = projector
            .project(&RequestContext::new(), &binding("s"), &mut workload)
            .await
            .expect_err("lookup");
        assert!(matches!(err, Error::Lookup { .. }));
        assert_eq!(
            serde_json::to_value(&workload).expect("json"),
            serde_json::to_value(self::workload()).expect("json")
        );
    }

    #[tokio::test]
    async fn undecodable_stash_fails_unproject() {
        let projector = ServiceBindingProjector::new(Arc::new(MockMappingSource::new()));
        let mut workload = workload();
        workload.metadata.annotations = Some(
            [(
                "projector.servicebinding.io/mapping-uid-1".to_string(),
                "{".to_string(),
            )]
            .into(),
        );
        let err = projector
            .unproject(&RequestContext::new(), &binding("s"), &mut workload)
            .await
            .expect_err("decode");
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn is_projected_reads_mapping_annotation() {
        let projector = ServiceBindingProjector::new(Arc::new(MockMappingSource::new()));
        let mut workload = workload();
        assert!(!projector.is_projected(&binding("s"), &workload));
        workload.metadata.annotations = Some(
            [(
                "projector.servicebinding.io/mapping-uid-1".to_string(),
                "{}".to_string(),
            )]
            .into(),
        );
        assert!(projector.is_projected(&binding("s"), &workload));
    }
}
