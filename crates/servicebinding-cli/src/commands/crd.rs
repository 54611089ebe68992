//! CRD command

use std::path::PathBuf;

use clap::Args;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

use servicebinding_common::crd::{ClusterWorkloadResourceMapping, ServiceBinding};

use super::write_output;
use crate::Result;

#[derive(Args, Debug)]
pub struct CrdArgs {
    /// Write the manifests here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

fn crds() -> Vec<CustomResourceDefinition> {
    vec![ServiceBinding::crd(), ClusterWorkloadResourceMapping::crd()]
}

/// Render every CRD as one multi-document YAML stream
pub fn render() -> Result<String> {
    let mut out = String::new();
    for crd in crds() {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&crd)?);
    }
    Ok(out)
}

pub fn run(args: CrdArgs) -> Result<()> {
    write_output(args.output.as_deref(), &render()?)
}
