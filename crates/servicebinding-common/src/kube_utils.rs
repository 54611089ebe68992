//! Kubernetes utility functions for API resource resolution and client setup

use std::path::Path;
use std::time::Duration;

use kube::api::{DynamicObject, GroupVersionKind};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use tracing::debug;

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from optional kubeconfig path with custom timeouts
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Ok(Client::try_from(config)?)
}

/// Parse an apiVersion into (group, version)
///
/// ```
/// use servicebinding_common::kube_utils::parse_api_version;
///
/// let (group, version) = parse_api_version("apps/v1");
/// assert_eq!(group, "apps");
/// assert_eq!(version, "v1");
///
/// let (group, version) = parse_api_version("v1");
/// assert_eq!(group, "");
/// assert_eq!(version, "v1");
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Known kinds whose plural is not derivable by the simple rules below
const KIND_PLURALS: &[(&str, &str)] = &[
    ("endpoints", "endpoints"),
    ("ingress", "ingresses"),
    ("networkpolicy", "networkpolicies"),
];

/// Pluralize a Kubernetes resource kind
///
/// Uses a lookup table for irregular kinds, falling back to simple
/// pluralization rules.
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    for (singular, plural) in KIND_PLURALS {
        if *singular == lower {
            return (*plural).to_string();
        }
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Build an ApiResource from a known apiVersion and kind.
///
/// The plural is derived with [`pluralize_kind`]; use discovery when the API
/// server's plural must be authoritative.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Read the group/version/kind from a dynamic object's type metadata
///
/// Objects without `apiVersion`/`kind` cannot be mapped and produce a
/// lookup error.
pub fn object_gvk(obj: &DynamicObject) -> Result<GroupVersionKind, Error> {
    let types = obj.types.as_ref().ok_or_else(|| {
        Error::lookup_not_found(
            object_display_name(obj),
            "object has no apiVersion/kind type metadata",
        )
    })?;
    let (group, version) = parse_api_version(&types.api_version);
    Ok(GroupVersionKind::gvk(&group, &version, &types.kind))
}

/// Resolve the ApiResource for a group/version/kind through API discovery.
///
/// Unlike a group-wide discovery run this pins the exact version the object
/// was written with, so the mapping template selected later matches the
/// object's own schema.
pub async fn discover_api_resource(
    client: &Client,
    gvk: &GroupVersionKind,
) -> Result<ApiResource, Error> {
    let resource = format_gvk(gvk);
    match kube::discovery::pinned_kind(client, gvk).await {
        Ok((ar, _caps)) => {
            debug!(
                api_version = %ar.api_version,
                kind = %ar.kind,
                plural = %ar.plural,
                "discovered REST mapping"
            );
            Ok(ar)
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => Err(Error::lookup_not_found(
            resource,
            format!("API group version not served: {}", ae.message),
        )),
        Err(kube::Error::Discovery(e)) => Err(Error::lookup_not_found(resource, e.to_string())),
        Err(e) => Err(Error::lookup(resource, e.to_string())),
    }
}

/// Human readable `group/version Kind` for logs and errors
pub fn format_gvk(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        format!("{} {}", gvk.version, gvk.kind)
    } else {
        format!("{}/{} {}", gvk.group, gvk.version, gvk.kind)
    }
}

/// `namespace/name` (or just `name`) of a dynamic object
pub fn object_display_name(obj: &DynamicObject) -> String {
    let name = obj.metadata.name.as_deref().unwrap_or("<unnamed>");
    match obj.metadata.namespace.as_deref() {
        Some(ns) => format!("{}/{}", ns, name),
        None => name.to_string(),
    }
}
