//! Projection and unprojection of one binding onto a pod template view
//!
//! Projection adds a projected volume holding the bound Secret (plus
//! downward API entries for the binding type and provider), mounts it into
//! each selected container under the container's binding root, and wires the
//! requested env vars. Unprojection removes exactly those artifacts again.
//!
//! Projected volumes, mounts and env vars always form a trailing block
//! sorted by name; everything else keeps its position.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::{
    DownwardAPIProjection, DownwardAPIVolumeFile, EnvVar, EnvVarSource, ObjectFieldSelector,
    ProjectedVolumeSource, SecretKeySelector, SecretProjection, Volume, VolumeMount,
    VolumeProjection,
};
use kube::api::DynamicObject;
use tracing::debug;

use servicebinding_common::crd::ServiceBinding;
use servicebinding_common::{DEFAULT_SERVICE_BINDING_ROOT, SERVICE_BINDING_ROOT_ENV};

use crate::names::{
    annotation_field_path, is_projector_field_path, BindingNames, SECRET_ANNOTATION_PREFIX,
    VOLUME_PREFIX,
};
use crate::ordering::sort_owned_last;
use crate::pod_template::{MetaContainer, MetaPodTemplate};
use crate::selector::LabelMatcher;

/// Env var key exposing the binding type
const TYPE_KEY: &str = "type";
/// Env var key exposing the binding provider
const PROVIDER_KEY: &str = "provider";

/// Whether `binding` should currently be projected onto `workload`.
///
/// Requires a bound Secret. An exact workload name wins over the selector;
/// with neither set the binding targets nothing. A malformed selector
/// matches nothing.
pub fn should_project(binding: &ServiceBinding, workload: &DynamicObject) -> bool {
    if binding.bound_secret_name().is_none() {
        return false;
    }
    if let Some(name) = binding.workload_name() {
        return workload.metadata.name.as_deref() == Some(name);
    }
    let Some(selector) = &binding.spec.workload.selector else {
        return false;
    };
    match LabelMatcher::from_selector(selector) {
        Ok(matcher) => matcher.matches(&workload.metadata.labels.clone().unwrap_or_default()),
        Err(e) => {
            debug!(error = %e, "ignoring binding with malformed workload selector");
            false
        }
    }
}

/// Apply the binding's volume, mounts and env vars to the view.
///
/// Does nothing for a binding without a bound Secret.
pub fn project(binding: &ServiceBinding, view: &mut MetaPodTemplate) {
    let Some(secret) = binding.bound_secret_name() else {
        return;
    };
    let names = BindingNames::of(binding);

    let volume = projected_volume(binding, &names, secret, &mut view.pod_template_annotations);
    view.volumes.push(volume);
    sort_owned_last(
        &mut view.volumes,
        |v| v.name.starts_with(VOLUME_PREFIX),
        |v| v.name.as_str(),
    );

    let annotations = &mut view.pod_template_annotations;
    for container in view
        .containers
        .iter_mut()
        .filter(|c| is_container_bindable(binding, c))
    {
        project_volume_mount(binding, &names, container);
        project_env(binding, &names, secret, annotations, container);
    }
}

/// Remove every artifact this binding added to the view.
///
/// `SERVICE_BINDING_ROOT` is left in place since other bindings may rely on
/// it. The stashed mapping annotation is handled separately.
pub fn unproject(binding: &ServiceBinding, view: &mut MetaPodTemplate) {
    let names = BindingNames::of(binding);
    let secret = view
        .pod_template_annotations
        .get(&names.secret_annotation)
        .cloned();
    let type_path = names.type_field_path();
    let provider_path = names.provider_field_path();

    view.volumes.retain(|v| v.name != names.volume);
    for container in &mut view.containers {
        container.volume_mounts.retain(|m| m.name != names.volume);
        container.env.retain(|e| {
            let from_secret = secret.as_deref().is_some_and(|secret| {
                secret_key_ref_name(e) == Some(secret)
            });
            let from_annotation = field_ref_path(e)
                .is_some_and(|path| path == type_path || path == provider_path);
            !(from_secret || from_annotation)
        });
    }

    for key in [
        &names.secret_annotation,
        &names.type_annotation,
        &names.provider_annotation,
    ] {
        view.pod_template_annotations.remove(key);
    }
}

fn projected_volume(
    binding: &ServiceBinding,
    names: &BindingNames,
    secret: &str,
    annotations: &mut BTreeMap<String, String>,
) -> Volume {
    annotations.insert(names.secret_annotation.clone(), secret.to_string());
    let mut sources = vec![VolumeProjection {
        secret: Some(SecretProjection {
            name: secret.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }];
    if !binding.spec.type_.is_empty() {
        let field_path = annotate(annotations, &names.type_annotation, &binding.spec.type_);
        sources.push(downward_api_source(TYPE_KEY, field_path));
    }
    if !binding.spec.provider.is_empty() {
        let field_path = annotate(
            annotations,
            &names.provider_annotation,
            &binding.spec.provider,
        );
        sources.push(downward_api_source(PROVIDER_KEY, field_path));
    }

    Volume {
        name: names.volume.clone(),
        projected: Some(ProjectedVolumeSource {
            sources: Some(sources),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn downward_api_source(path: &str, field_path: String) -> VolumeProjection {
    VolumeProjection {
        downward_api: Some(DownwardAPIProjection {
            items: Some(vec![DownwardAPIVolumeFile {
                path: path.to_string(),
                field_ref: Some(ObjectFieldSelector {
                    field_path,
                    ..Default::default()
                }),
                ..Default::default()
            }]),
        }),
        ..Default::default()
    }
}

fn project_volume_mount(binding: &ServiceBinding, names: &BindingNames, container: &mut MetaContainer) {
    let root = service_binding_root(container);
    container.volume_mounts.push(VolumeMount {
        name: names.volume.clone(),
        mount_path: join_path(&root, &binding.spec.name),
        read_only: Some(true),
        ..Default::default()
    });
    sort_owned_last(
        &mut container.volume_mounts,
        |m| m.name.starts_with(VOLUME_PREFIX),
        |m| m.name.as_str(),
    );
}

fn project_env(
    binding: &ServiceBinding,
    names: &BindingNames,
    secret: &str,
    annotations: &mut BTreeMap<String, String>,
    container: &mut MetaContainer,
) {
    for mapping in &binding.spec.env {
        let source = match mapping.key.as_str() {
            TYPE_KEY if !binding.spec.type_.is_empty() => field_ref_source(annotate(
                annotations,
                &names.type_annotation,
                &binding.spec.type_,
            )),
            PROVIDER_KEY if !binding.spec.provider.is_empty() => field_ref_source(annotate(
                annotations,
                &names.provider_annotation,
                &binding.spec.provider,
            )),
            key => EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.to_string(),
                    key: key.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        };
        container.env.push(EnvVar {
            name: mapping.name.clone(),
            value_from: Some(source),
            ..Default::default()
        });
    }

    let secrets = known_projected_secrets(annotations);
    sort_owned_last(
        &mut container.env,
        |e| is_projected_env(e, &secrets),
        |e| e.name.as_str(),
    );
}

fn field_ref_source(field_path: String) -> EnvVarSource {
    EnvVarSource {
        field_ref: Some(ObjectFieldSelector {
            field_path,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Record `value` under `key` and return the field path referencing it
fn annotate(annotations: &mut BTreeMap<String, String>, key: &str, value: &str) -> String {
    annotations.insert(key.to_string(), value.to_string());
    annotation_field_path(key)
}

fn is_container_bindable(binding: &ServiceBinding, container: &MetaContainer) -> bool {
    let allowed = &binding.spec.workload.containers;
    match &container.name {
        Some(name) => allowed.is_empty() || allowed.contains(name),
        None => true,
    }
}

/// Binding root of a container, defaulting (and recording) `/bindings`
fn service_binding_root(container: &mut MetaContainer) -> String {
    if let Some(env) = container
        .env
        .iter()
        .find(|e| e.name == SERVICE_BINDING_ROOT_ENV)
    {
        return env.value.clone().unwrap_or_default();
    }
    container.env.push(EnvVar {
        name: SERVICE_BINDING_ROOT_ENV.to_string(),
        value: Some(DEFAULT_SERVICE_BINDING_ROOT.to_string()),
        ..Default::default()
    });
    DEFAULT_SERVICE_BINDING_ROOT.to_string()
}

/// Secrets projected by any binding, read from the template annotations
fn known_projected_secrets(annotations: &BTreeMap<String, String>) -> BTreeSet<&str> {
    annotations
        .iter()
        .filter(|(key, _)| key.starts_with(SECRET_ANNOTATION_PREFIX))
        .map(|(_, secret)| secret.as_str())
        .collect()
}

fn is_projected_env(env: &EnvVar, secrets: &BTreeSet<&str>) -> bool {
    secret_key_ref_name(env).is_some_and(|name| secrets.contains(name))
        || field_ref_path(env).is_some_and(is_projector_field_path)
}

fn secret_key_ref_name(env: &EnvVar) -> Option<&str> {
    env.value_from
        .as_ref()
        .and_then(|source| source.secret_key_ref.as_ref())
        .map(|selector| selector.name.as_str())
}

fn field_ref_path(env: &EnvVar) -> Option<&str> {
    env.value_from
        .as_ref()
        .and_then(|source| source.field_ref.as_ref())
        .map(|selector| selector.field_path.as_str())
}

/// Join and clean slash separated path elements
fn join_path(root: &str, name: &str) -> String {
    let joined = [root, name]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        return String::new();
    }

    let absolute = joined.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." if parts.last().is_some_and(|p| *p != "..") => {
                parts.pop();
            }
            ".." if absolute => {}
            part => parts.push(part),
        }
    }

    let body = parts.join("/");
    match (absolute, body.is_empty()) {
        (true, _) => format!("/{}", body),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}
