//! Service binding projection engine
//!
//! Projects the Secret bound to a `ServiceBinding` into any workload that
//! embeds a pod template: a projected volume, a read-only mount per selected
//! container, and the env vars the binding asks for. Unprojection reverses
//! exactly those artifacts.
//!
//! The workload's layout is described by a `ClusterWorkloadResourceMapping`
//! obtained from a [`MappingSource`]; the mapping used is stashed on the
//! workload so a later unprojection finds everything even if the mapping
//! changes in between.
//!
//! ```ignore
//! use std::sync::Arc;
//! use servicebinding_projector::{
//!     BindingProjector, RequestContext, ServiceBindingProjector, StaticMappingSource,
//! };
//!
//! let projector =
//!     ServiceBindingProjector::new(Arc::new(StaticMappingSource::with_builtin_workloads()));
//! projector
//!     .project(&RequestContext::new(), &binding, &mut workload)
//!     .await?;
//! ```

#![deny(missing_docs)]

pub mod context;
pub mod mapping;
pub mod names;
pub mod ordering;
pub mod pod_template;
pub mod projection;
pub mod projector;
pub mod selector;
pub mod stash;

pub use context::RequestContext;
pub use mapping::{
    resolve_mapping, ClusterMappingSource, MappingSource, ResolvedMapping, StaticMappingSource,
};
pub use pod_template::{MetaContainer, MetaPodTemplate};
pub use projector::{BindingProjector, ServiceBindingProjector};
