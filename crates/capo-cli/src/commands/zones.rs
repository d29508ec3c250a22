//! Zones command

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use capo_common::api::FailureDomains;
use capo_services::compute::{failure_domains, AvailabilityZone};
use capo_services::{ComputeService, OpenStackHttpClient};

use super::{load_config, print_json};
use crate::Result;

#[derive(Args, Debug)]
pub struct ZonesArgs {
    /// Zone allowed to host control plane machines (repeatable; default: all)
    #[arg(long = "control-plane-zone")]
    pub control_plane_zones: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ZonesOutput<'a> {
    zones: &'a [AvailabilityZone],
    failure_domains: FailureDomains,
}

pub async fn run(args: ZonesArgs, config: Option<&Path>) -> Result<()> {
    let client = OpenStackHttpClient::new(&load_config(config)?)?;
    let service = ComputeService::new(Arc::new(client));

    let zones = service.get_availability_zones().await?;
    let output = ZonesOutput {
        failure_domains: failure_domains(&zones, &args.control_plane_zones),
        zones: &zones,
    };
    print_json(&output)
}
