//! Names and annotation keys owned by the projector
//!
//! Every artifact written into a workload is keyed by the binding UID, so
//! any number of bindings can share a workload without colliding.

use servicebinding_common::crd::ServiceBinding;
use servicebinding_common::{projector_group, PROJECTOR_GROUP};

/// Prefix of projected volume and volume mount names
pub const VOLUME_PREFIX: &str = "servicebinding-";
/// Prefix of the template annotation recording the bound Secret
pub const SECRET_ANNOTATION_PREFIX: &str = concat!(projector_group!(), "/secret-");
/// Prefix of the template annotation carrying the binding type
pub const TYPE_ANNOTATION_PREFIX: &str = concat!(projector_group!(), "/type-");
/// Prefix of the template annotation carrying the binding provider
pub const PROVIDER_ANNOTATION_PREFIX: &str = concat!(projector_group!(), "/provider-");
/// Prefix of the workload annotation holding the stashed mapping
pub const MAPPING_ANNOTATION_PREFIX: &str = concat!(projector_group!(), "/mapping-");

/// Downward API field path referencing a template annotation
pub fn annotation_field_path(key: &str) -> String {
    format!("metadata.annotations['{}']", key)
}

/// Whether a downward API field path references any projector annotation
pub fn is_projector_field_path(field_path: &str) -> bool {
    field_path.starts_with(&format!("metadata.annotations['{}", PROJECTOR_GROUP))
}

/// Per-binding names, derived once from the binding UID
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingNames {
    /// Volume and volume mount name
    pub volume: String,
    /// Template annotation recording the bound Secret name
    pub secret_annotation: String,
    /// Template annotation carrying `spec.type`
    pub type_annotation: String,
    /// Template annotation carrying `spec.provider`
    pub provider_annotation: String,
    /// Workload annotation holding the stashed mapping
    pub mapping_annotation: String,
}

impl BindingNames {
    /// Names for a binding UID
    pub fn for_uid(uid: &str) -> Self {
        Self {
            volume: format!("{}{}", VOLUME_PREFIX, uid),
            secret_annotation: format!("{}{}", SECRET_ANNOTATION_PREFIX, uid),
            type_annotation: format!("{}{}", TYPE_ANNOTATION_PREFIX, uid),
            provider_annotation: format!("{}{}", PROVIDER_ANNOTATION_PREFIX, uid),
            mapping_annotation: format!("{}{}", MAPPING_ANNOTATION_PREFIX, uid),
        }
    }

    /// Names for a binding; a binding without a UID yields empty suffixes
    pub fn of(binding: &ServiceBinding) -> Self {
        Self::for_uid(binding.metadata.uid.as_deref().unwrap_or_default())
    }

    /// Field path of the type annotation
    pub fn type_field_path(&self) -> String {
        annotation_field_path(&self.type_annotation)
    }

    /// Field path of the provider annotation
    pub fn provider_field_path(&self) -> String {
        annotation_field_path(&self.provider_annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_live_in_projector_group() {
        for prefix in [
            SECRET_ANNOTATION_PREFIX,
            TYPE_ANNOTATION_PREFIX,
            PROVIDER_ANNOTATION_PREFIX,
            MAPPING_ANNOTATION_PREFIX,
        ] {
            assert!(prefix.starts_with(PROJECTOR_GROUP));
        }
        assert_eq!(SECRET_ANNOTATION_PREFIX, "projector.servicebinding.io/secret-");
        assert_eq!(MAPPING_ANNOTATION_PREFIX, "projector.servicebinding.io/mapping-");
    }

    #[test]
    fn names_are_keyed_by_uid() {
        let names = BindingNames::for_uid("abc-123");
        assert_eq!(names.volume, "servicebinding-abc-123");
        assert_eq!(names.secret_annotation, "projector.servicebinding.io/secret-abc-123");
        assert_eq!(names.mapping_annotation, "projector.servicebinding.io/mapping-abc-123");
        assert_eq!(
            names.type_field_path(),
            "metadata.annotations['projector.servicebinding.io/type-abc-123']"
        );
    }

    #[test]
    fn projector_field_paths() {
        let names = BindingNames::for_uid("u1");
        assert!(is_projector_field_path(&names.provider_field_path()));
        assert!(!is_projector_field_path("metadata.annotations['example.com/x']"));
        assert!(!is_projector_field_path("metadata.name"));
    }
}
