//! Project and unproject commands

use std::path::PathBuf;

use clap::Args;
use tracing::{info, warn};

use servicebinding_projector::{BindingProjector, ServiceBindingProjector};

use super::{load_binding, load_mappings, load_workload, write_output, SourceArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// ServiceBinding manifest
    #[arg(long)]
    pub binding: PathBuf,

    /// Workload manifest
    #[arg(long)]
    pub workload: PathBuf,

    /// ClusterWorkloadResourceMapping manifests (may hold several documents)
    #[arg(long = "mapping")]
    pub mappings: Vec<PathBuf>,

    /// Write the updated workload here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Which direction to run the projector in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Project,
    Unproject,
}

pub async fn run(args: ProjectArgs, operation: Operation) -> Result<()> {
    let binding = load_binding(&args.binding)?;
    let mut workload = load_workload(&args.workload)?;
    let mappings = load_mappings(&args.mappings)?;

    let source = args.source.mapping_source(&workload, mappings).await?;
    let projector = ServiceBindingProjector::new(source);
    let ctx = args.source.request_context();

    let cancel = ctx.cancellation_token().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let result = match operation {
        Operation::Project => projector.project(&ctx, &binding, &mut workload).await,
        Operation::Unproject => projector.unproject(&ctx, &binding, &mut workload).await,
    };
    interrupt.abort();
    result?;

    info!(
        operation = ?operation,
        projected = projector.is_projected(&binding, &workload),
        "done"
    );
    write_output(args.output.as_deref(), &serde_yaml::to_string(&workload)?)
}
