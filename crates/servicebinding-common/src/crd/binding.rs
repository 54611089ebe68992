//! ServiceBinding CRD
//!
//! A ServiceBinding links a workload to the Secret exposed by a provisioned
//! service. Once the binding's status names a bound Secret, the projector
//! mounts it into every selected container and wires any requested
//! environment variables.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ServiceBinding binds a provisioned service's Secret into a workload.
///
/// Example:
/// ```yaml
/// apiVersion: servicebinding.io/v1
/// kind: ServiceBinding
/// metadata:
///   name: account-db
/// spec:
///   name: account-db
///   type: mysql
///   service:
///     apiVersion: v1
///     kind: Secret
///     name: account-db-credentials
///   workload:
///     apiVersion: apps/v1
///     kind: Deployment
///     name: account-service
///   env:
///     - name: DB_USER
///       key: username
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "servicebinding.io",
    version = "v1",
    kind = "ServiceBinding",
    namespaced,
    status = "ServiceBindingStatus",
    printcolumn = r#"{"name":"Secret","type":"string","jsonPath":".status.binding.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingSpec {
    /// Name of the binding, used as the subdirectory under the binding root
    pub name: String,

    /// Type of the binding, exposed to the workload as the `type` entry
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub type_: String,

    /// Provider of the binding, exposed to the workload as the `provider` entry
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,

    /// Workload(s) the binding projects into
    pub workload: ServiceBindingWorkloadReference,

    /// Provisioned service the binding consumes
    #[serde(default)]
    pub service: ServiceBindingServiceReference,

    /// Environment variables to project, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvMapping>,
}

/// Reference to the workload(s) a binding targets
///
/// Either `name` or `selector` picks workloads of the given kind. When both are
/// absent the binding matches nothing.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingWorkloadReference {
    /// API version of the workload (e.g. "apps/v1")
    pub api_version: String,

    /// Kind of the workload (e.g. "Deployment")
    pub kind: String,

    /// Exact workload name; takes precedence over `selector`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Label selector for workloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    /// Container names to bind into; empty binds every container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<String>,
}

/// Reference to the provisioned service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingServiceReference {
    /// API version of the service resource
    pub api_version: String,

    /// Kind of the service resource
    pub kind: String,

    /// Name of the service resource
    pub name: String,
}

/// Maps a Secret key (or the `type`/`provider` entries) to an env var
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct EnvMapping {
    /// Environment variable name
    pub name: String,

    /// Secret key, or the literal `type`/`provider`
    pub key: String,
}

impl EnvMapping {
    /// Create an env mapping
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// ServiceBinding status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingStatus {
    /// Generation most recently observed by the reconciler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions reported by the reconciler
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Secret resolved from the provisioned service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<ServiceBindingSecretReference>,
}

/// Reference to the bound Secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ServiceBindingSecretReference {
    /// Secret name
    pub name: String,
}

impl ServiceBinding {
    /// Name of the bound Secret, or `None` if the binding is not bound yet
    pub fn bound_secret_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.binding.as_ref())
            .map(|b| b.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Exact workload name, ignoring an empty string
    pub fn workload_name(&self) -> Option<&str> {
        self.spec
            .workload
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_yaml_parses() {
        let yaml = r#"
apiVersion: servicebinding.io/v1
kind: ServiceBinding
metadata:
  name: account-db
  uid: 7c1e0b2a-0000-4000-8000-000000000001
spec:
  name: account-db
  type: mysql
  service:
    apiVersion: v1
    kind: Secret
    name: account-db-credentials
  workload:
    apiVersion: apps/v1
    kind: Deployment
    name: account-service
    containers: [app]
  env:
    - name: DB_TYPE
      key: type
    - name: DB_USER
      key: username
status:
  binding:
    name: account-db-credentials
"#;
        let binding: ServiceBinding = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(binding.spec.type_, "mysql");
        assert_eq!(binding.spec.provider, "");
        assert_eq!(binding.workload_name(), Some("account-service"));
        assert_eq!(binding.spec.workload.containers, vec!["app".to_string()]);
        assert_eq!(
            binding.spec.env,
            vec![
                EnvMapping::new("DB_TYPE", "type"),
                EnvMapping::new("DB_USER", "username")
            ]
        );
        assert_eq!(binding.bound_secret_name(), Some("account-db-credentials"));
    }

    #[test]
    fn selector_binding_yaml_parses() {
        let yaml = r#"
apiVersion: servicebinding.io/v1
kind: ServiceBinding
metadata:
  name: cache
spec:
  name: cache
  workload:
    apiVersion: apps/v1
    kind: Deployment
    selector:
      matchLabels:
        tier: web
"#;
        let binding: ServiceBinding = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(binding.workload_name(), None);
        let selector = binding.spec.workload.selector.as_ref().expect("selector");
        assert_eq!(
            selector
                .match_labels
                .as_ref()
                .and_then(|l| l.get("tier"))
                .map(String::as_str),
            Some("web")
        );
        assert_eq!(binding.bound_secret_name(), None);
    }

    #[test]
    fn empty_bound_secret_is_unbound() {
        let mut binding = ServiceBinding::new("b", ServiceBindingSpec::default());
        binding.status = Some(ServiceBindingStatus {
            binding: Some(ServiceBindingSecretReference {
                name: String::new(),
            }),
            ..Default::default()
        });
        assert_eq!(binding.bound_secret_name(), None);
    }

    #[test]
    fn empty_workload_name_is_ignored() {
        let mut spec = ServiceBindingSpec::default();
        spec.workload.name = Some(String::new());
        let binding = ServiceBinding::new("b", spec);
        assert_eq!(binding.workload_name(), None);
    }

    #[test]
    fn type_field_serializes_as_type() {
        let spec = ServiceBindingSpec {
            name: "db".to_string(),
            type_: "postgresql".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).expect("serialize");
        assert_eq!(value["type"], "postgresql");
        assert!(value.get("provider").is_none());
    }
}
