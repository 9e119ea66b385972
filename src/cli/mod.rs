//! Command-line interface definitions for the `cirrus` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `cirrus` binary.
#[derive(Debug, Parser)]
#[command(
    name = "cirrus",
    about = "Provision and manage virtual machines on an Apache CloudStack cloud",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List zones.
    #[command(name = "zones", about = "List zones visible to the account")]
    Zones(ZonesCommand),
    /// List domain names.
    #[command(name = "domains", about = "List domain names")]
    Domains,
    /// List hypervisor names.
    #[command(name = "hypervisors", about = "List hypervisor types")]
    Hypervisors,
    /// List guest networks.
    #[command(name = "networks", about = "List guest networks")]
    Networks,
    /// List templates and ISOs.
    #[command(name = "images", about = "List templates and ISOs")]
    Images,
    /// List compute offerings.
    #[command(name = "flavors", about = "List compute offerings")]
    Flavors,
    /// List disk offerings.
    #[command(name = "disk-offerings", about = "List disk offerings")]
    DiskOfferings,
    /// Check the configured URL and credentials.
    #[command(name = "test-connection", about = "Check the configured URL and credentials")]
    TestConnection,
    /// Manage the SSH key pair bound to the connection.
    #[command(subcommand, name = "key-pair")]
    KeyPair(KeyPairCommand),
    /// Manage virtual machines.
    #[command(subcommand, name = "vm")]
    Vm(VmCommand),
}

/// Arguments for `cirrus zones`.
#[derive(Debug, Parser)]
pub(crate) struct ZonesCommand {
    /// Print only the id of the first zone.
    #[arg(long)]
    pub(crate) first: bool,
}

/// `cirrus key-pair` subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum KeyPairCommand {
    /// Create the key pair and store its private key locally.
    #[command(name = "setup")]
    Setup,
    /// Delete the key pair remotely and locally.
    #[command(name = "teardown")]
    Teardown,
}

/// `cirrus vm` subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum VmCommand {
    /// Create a server and wait for its network interface.
    #[command(name = "create")]
    Create(CreateCommand),
    /// Destroy a server. Succeeds when the server is already gone.
    #[command(name = "destroy")]
    Destroy(ServerCommand),
    /// Start (resume or unpause) a server.
    #[command(name = "start")]
    Start(ServerCommand),
    /// Stop (suspend) a server.
    #[command(name = "stop")]
    Stop(ServerCommand),
    /// Pause a server.
    #[command(name = "pause")]
    Pause(ServerCommand),
    /// Hard reboot a server.
    #[command(name = "reset")]
    Reset(ServerCommand),
    /// Open a console session.
    #[command(name = "console")]
    Console(ServerCommand),
    /// Show a server.
    #[command(name = "show")]
    Show(ServerCommand),
}

/// Arguments for `cirrus vm create`.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Display name. The host name is the part before the first dot.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
    /// Template or ISO id.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: String,
    /// Compute offering id.
    #[arg(long, value_name = "FLAVOR")]
    pub(crate) flavor: String,
    /// Network to attach.
    #[arg(long, value_name = "NETWORK")]
    pub(crate) network: Option<String>,
    /// Network used when `--network` is absent.
    #[arg(long, value_name = "SUBNET")]
    pub(crate) subnet: Option<String>,
    /// Key pair overriding the one bound to the connection.
    #[arg(long, value_name = "NAME")]
    pub(crate) key_pair: Option<String>,
    /// Extra deployVirtualMachine parameter; repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub(crate) params: Vec<String>,
}

/// Identifies one server.
#[derive(Debug, Parser)]
pub(crate) struct ServerCommand {
    /// Server id.
    #[arg(value_name = "ID")]
    pub(crate) id: String,
}
