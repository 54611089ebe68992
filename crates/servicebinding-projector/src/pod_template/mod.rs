//! Structured view over a workload's embedded pod template
//!
//! A [`MetaPodTemplate`] is built from a workload and one mapping template.
//! It lifts the annotations, volumes and containers found at the mapped
//! locations into typed, editable collections. After mutation,
//! [`MetaPodTemplate::write_to_workload`] writes each collection back to the
//! exact location it was read from.
//!
//! A collection is only ever removed when this view emptied it: the field is
//! dropped, along with objects left empty by that, so projecting and then
//! unprojecting leaves an untouched workload equal to the original. Fields
//! that were absent or already empty when read are left exactly as found.

pub mod path;

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};
use kube::api::DynamicObject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use servicebinding_common::crd::ClusterWorkloadResourceMappingTemplate;
use servicebinding_common::kube_utils::object_display_name;
use servicebinding_common::{Error, Result};

use crate::context::RequestContext;
pub use path::{FieldPath, Location, Segment, Step};

/// One container found through the mapping
#[derive(Clone, Debug, PartialEq)]
pub struct MetaContainer {
    /// Container name, when the mapping names containers
    pub name: Option<String>,
    /// Environment variables, in document order
    pub env: Vec<EnvVar>,
    /// Volume mounts, in document order
    pub volume_mounts: Vec<VolumeMount>,
    env_location: Location,
    volume_mounts_location: Location,
    env_origin: Origin,
    volume_mounts_origin: Origin,
}

/// Editable view of a workload's pod template
#[derive(Clone, Debug, PartialEq)]
pub struct MetaPodTemplate {
    /// Annotations on the workload object itself
    pub workload_annotations: BTreeMap<String, String>,
    /// Annotations on the embedded pod template
    pub pod_template_annotations: BTreeMap<String, String>,
    /// Pod template volumes
    pub volumes: Vec<Volume>,
    /// Init containers and containers, in mapping order
    pub containers: Vec<MetaContainer>,
    annotations_location: Location,
    volumes_location: Location,
    workload_annotations_origin: Origin,
    annotations_origin: Origin,
    volumes_origin: Origin,
}

/// What a collection's location held when the view was read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    /// Missing or null
    Absent,
    /// Present with no entries
    Empty,
    /// Present with at least one entry
    Populated,
}

impl Origin {
    fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Origin::Absent,
            Some(Value::Array(items)) if items.is_empty() => Origin::Empty,
            Some(Value::Object(map)) if map.is_empty() => Origin::Empty,
            Some(_) => Origin::Populated,
        }
    }
}

impl MetaContainer {
    /// Where this container's env list lives in the workload
    pub fn env_location(&self) -> &Location {
        &self.env_location
    }

    /// Where this container's volume mounts live in the workload
    pub fn volume_mounts_location(&self) -> &Location {
        &self.volume_mounts_location
    }
}

impl MetaPodTemplate {
    /// Build the view of `workload` described by `template`.
    ///
    /// The template is used as given; callers select the version and apply
    /// defaults beforehand.
    pub fn new(
        workload: &DynamicObject,
        template: &ClusterWorkloadResourceMappingTemplate,
    ) -> Result<Self> {
        let doc = serde_json::to_value(workload)
            .map_err(|e| Error::view("$", format!("workload is not serializable: {}", e)))?;

        let annotations_location = FieldPath::parse(&template.annotations)?.to_location()?;
        let pod_template_annotations =
            read_or_default(&doc, &annotations_location, &template.annotations)?;

        let volumes_location = FieldPath::parse(&template.volumes)?.to_location()?;
        let volumes = read_or_default(&doc, &volumes_location, &template.volumes)?;

        let mut containers = Vec::new();
        for mapping in &template.containers {
            let path = FieldPath::parse(&mapping.path)?;
            let name_location = if mapping.name.is_empty() {
                None
            } else {
                Some(FieldPath::parse(&mapping.name)?.to_location()?)
            };
            let env_relative = FieldPath::parse(&mapping.env)?.to_location()?;
            let mounts_relative = FieldPath::parse(&mapping.volume_mounts)?.to_location()?;

            for location in path.expand(&doc)? {
                let Some(container) = location.get(&doc).filter(|v| !v.is_null()) else {
                    continue;
                };
                if !container.is_object() {
                    return Err(Error::view(
                        &mapping.path,
                        format!("expected a container object at {}", location),
                    ));
                }
                let name = name_location
                    .as_ref()
                    .and_then(|l| l.get(container))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let env_location = location.join(&env_relative);
                let volume_mounts_location = location.join(&mounts_relative);
                containers.push(MetaContainer {
                    name,
                    env_origin: Origin::of(env_location.get(&doc)),
                    volume_mounts_origin: Origin::of(volume_mounts_location.get(&doc)),
                    env: read_or_default(&doc, &env_location, &mapping.env)?,
                    volume_mounts: read_or_default(
                        &doc,
                        &volume_mounts_location,
                        &mapping.volume_mounts,
                    )?,
                    env_location,
                    volume_mounts_location,
                });
            }
        }

        let workload_annotations_origin = match &workload.metadata.annotations {
            None => Origin::Absent,
            Some(annotations) if annotations.is_empty() => Origin::Empty,
            Some(_) => Origin::Populated,
        };

        Ok(Self {
            workload_annotations_origin,
            annotations_origin: Origin::of(annotations_location.get(&doc)),
            volumes_origin: Origin::of(volumes_location.get(&doc)),
            workload_annotations: workload.metadata.annotations.clone().unwrap_or_default(),
            pod_template_annotations,
            volumes,
            containers,
            annotations_location,
            volumes_location,
        })
    }

    /// Write every collection back into `workload`.
    ///
    /// Refuses to run once the request context is cancelled or past its
    /// deadline. On failure the workload is left unmodified.
    pub fn write_to_workload(
        &self,
        ctx: &RequestContext,
        workload: &mut DynamicObject,
    ) -> Result<()> {
        ctx.check("write_to_workload")?;
        let name = object_display_name(workload);
        let fail = |e: Error| Error::write_back(&name, e.to_string());

        let mut doc = serde_json::to_value(&*workload)
            .map_err(|e| Error::write_back(&name, e.to_string()))?;

        write_collection(
            &mut doc,
            &self.annotations_location,
            &self.pod_template_annotations,
            self.pod_template_annotations.is_empty(),
            self.annotations_origin,
        )
        .map_err(fail)?;
        write_collection(
            &mut doc,
            &self.volumes_location,
            &self.volumes,
            self.volumes.is_empty(),
            self.volumes_origin,
        )
        .map_err(fail)?;
        for container in &self.containers {
            write_collection(
                &mut doc,
                &container.env_location,
                &container.env,
                container.env.is_empty(),
                container.env_origin,
            )
            .map_err(fail)?;
            write_collection(
                &mut doc,
                &container.volume_mounts_location,
                &container.volume_mounts,
                container.volume_mounts.is_empty(),
                container.volume_mounts_origin,
            )
            .map_err(fail)?;
        }

        let mut updated: DynamicObject =
            serde_json::from_value(doc).map_err(|e| Error::write_back(&name, e.to_string()))?;
        if !self.workload_annotations.is_empty() {
            updated.metadata.annotations = Some(self.workload_annotations.clone());
        } else if self.workload_annotations_origin == Origin::Populated {
            updated.metadata.annotations = None;
        }
        *workload = updated;
        Ok(())
    }
}

fn read_or_default<T>(doc: &Value, location: &Location, path: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match location.get(doc) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| Error::view(path, format!("at {}: {}", location, e))),
    }
}

fn write_collection<T: Serialize>(
    doc: &mut Value,
    location: &Location,
    value: &T,
    empty: bool,
    origin: Origin,
) -> Result<()> {
    if empty && (origin != Origin::Populated || location.remove(doc)) {
        return Ok(());
    }
    let value = serde_json::to_value(value)
        .map_err(|e| Error::view(location.to_string(), e.to_string()))?;
    location.set(doc, value)
}
