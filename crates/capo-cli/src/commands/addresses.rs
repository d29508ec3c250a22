//! Addresses command

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use capo_services::compute::InstanceNetworkStatus;
use capo_services::{ComputeService, OpenStackHttpClient};

use super::{load_config, print_json};
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct AddressesArgs {
    /// Server ID
    #[arg(long)]
    pub server: String,

    /// Only print the fixed and floating IP of this network
    #[arg(long)]
    pub network: Option<String>,

    /// Print every reported address, including IPv6 and unknown types
    #[arg(long, conflicts_with = "network")]
    pub all: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct NetworkIps<'a> {
    network: &'a str,
    ip: Option<&'a str>,
    floating_ip: Option<&'a str>,
}

fn network_ips<'a>(status: &'a InstanceNetworkStatus, network: &'a str) -> NetworkIps<'a> {
    NetworkIps {
        network,
        ip: status.ip(network),
        floating_ip: status.floating_ip(network),
    }
}

pub async fn run(args: AddressesArgs, config: Option<&Path>) -> Result<()> {
    let client = OpenStackHttpClient::new(&load_config(config)?)?;
    let service = ComputeService::new(Arc::new(client));

    let instance = service
        .get_instance_status(&args.server)
        .await?
        .ok_or_else(|| Error::ServerNotFound {
            id: args.server.clone(),
        })?;
    let status = instance.network_status()?;

    match (&args.network, args.all) {
        (Some(network), _) => print_json(&network_ips(&status, network)),
        (None, true) => print_json(&status.all_addresses()),
        (None, false) => print_json(&status.addresses()),
    }
}
