//! Status command

use std::path::PathBuf;

use clap::Args;

use servicebinding_common::crd::ServiceBinding;
use servicebinding_projector::names::BindingNames;

use super::{load_binding, load_workload};
use crate::Result;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// ServiceBinding manifest
    #[arg(long)]
    pub binding: PathBuf,

    /// Workload manifest
    #[arg(long)]
    pub workload: PathBuf,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let binding = load_binding(&args.binding)?;
    let workload = load_workload(&args.workload)?;
    let annotations = workload.metadata.annotations.unwrap_or_default();
    println!("{}", describe(&binding, &annotations));
    Ok(())
}

fn describe(
    binding: &ServiceBinding,
    annotations: &std::collections::BTreeMap<String, String>,
) -> String {
    let names = BindingNames::of(binding);
    let name = binding.metadata.name.as_deref().unwrap_or_default();
    if annotations.contains_key(&names.mapping_annotation) {
        format!("{}: projected (volume {})", name, names.volume)
    } else {
        format!("{}: not projected", name)
    }
}
