//! Provenance stash for workload mappings
//!
//! The mapping used to project a binding is recorded as JSON in a workload
//! annotation. Unprojection reads it back, so artifacts are found at the
//! locations they were written to even if the live mapping has changed
//! since. The annotation's presence also marks the binding as projected.

use kube::api::DynamicObject;

use servicebinding_common::crd::{ClusterWorkloadResourceMappingSpec, ServiceBinding};
use servicebinding_common::{Error, Result};

use crate::names::BindingNames;
use crate::pod_template::MetaPodTemplate;

fn binding_uid(binding: &ServiceBinding) -> String {
    binding.metadata.uid.clone().unwrap_or_default()
}

/// Read the mapping stashed for `binding` on `workload`, if any
pub fn retrieve_local(
    binding: &ServiceBinding,
    workload: &DynamicObject,
) -> Result<Option<ClusterWorkloadResourceMappingSpec>> {
    let key = BindingNames::of(binding).mapping_annotation;
    let Some(data) = workload
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(&key))
    else {
        return Ok(None);
    };
    serde_json::from_str(data)
        .map(Some)
        .map_err(|e| Error::decode(binding_uid(binding), e))
}

/// Stash `mapping` for `binding` on the view, or clear the stash with `None`
pub fn stash_local(
    binding: &ServiceBinding,
    view: &mut MetaPodTemplate,
    mapping: Option<&ClusterWorkloadResourceMappingSpec>,
) -> Result<()> {
    let key = BindingNames::of(binding).mapping_annotation;
    match mapping {
        Some(mapping) => {
            let data =
                serde_json::to_string(mapping).map_err(|e| Error::encode(binding_uid(binding), e))?;
            view.workload_annotations.insert(key, data);
        }
        None => {
            view.workload_annotations.remove(&key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use servicebinding_common::crd::ServiceBindingSpec;
    use servicebinding_common::kube_utils::build_api_resource;

    fn binding() -> ServiceBinding {
        let mut binding = ServiceBinding::new("db", ServiceBindingSpec::default());
        binding.metadata.uid = Some("uid-1".to_string());
        binding
    }

    fn workload_with(annotations: &[(&str, &str)]) -> DynamicObject {
        let mut workload =
            DynamicObject::new("web", &build_api_resource("apps/v1", "Deployment"));
        workload.data = serde_json::json!({"spec": {"template": {"spec": {"containers": []}}}});
        workload.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        workload
    }

    fn view_of(workload: &DynamicObject) -> MetaPodTemplate {
        let template = ClusterWorkloadResourceMappingSpec::wildcard().template_for("v1");
        MetaPodTemplate::new(workload, &template).expect("view")
    }

    #[test]
    fn absent_stash_is_none() {
        assert_eq!(retrieve_local(&binding(), &workload_with(&[])).expect("ok"), None);

        let mut workload = workload_with(&[]);
        workload.metadata.annotations = None;
        assert_eq!(retrieve_local(&binding(), &workload).expect("ok"), None);
    }

    #[test]
    fn stash_then_retrieve() {
        let binding = binding();
        let mapping = ClusterWorkloadResourceMappingSpec::wildcard().with_defaults();
        let workload = workload_with(&[]);
        let mut view = view_of(&workload);
        stash_local(&binding, &mut view, Some(&mapping)).expect("stash");

        let stashed = view
            .workload_annotations
            .get("projector.servicebinding.io/mapping-uid-1")
            .cloned()
            .expect("annotation");
        let workload = workload_with(&[("projector.servicebinding.io/mapping-uid-1", stashed.as_str())]);
        assert_eq!(retrieve_local(&binding, &workload).expect("decode"), Some(mapping));
    }

    #[test]
    fn clearing_removes_only_this_binding() {
        let workload = workload_with(&[
            ("projector.servicebinding.io/mapping-uid-1", "{}"),
            ("projector.servicebinding.io/mapping-uid-2", "{}"),
        ]);
        let mut view = view_of(&workload);
        stash_local(&binding(), &mut view, None).expect("clear");
        assert!(!view
            .workload_annotations
            .contains_key("projector.servicebinding.io/mapping-uid-1"));
        assert!(view
            .workload_annotations
            .contains_key("projector.servicebinding.io/mapping-uid-2"));
    }

    #[test]
    fn invalid_stash_is_a_decode_error() {
        let workload = workload_with(&[("projector.servicebinding.io/mapping-uid-1", "not json")]);
        let err = retrieve_local(&binding(), &workload).expect_err("decode");
        assert!(matches!(err, Error::Decode { ref binding, .. } if binding == "uid-1"));
        assert!(!err.is_retryable());
    }
}
