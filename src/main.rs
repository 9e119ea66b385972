//! Binary entry point for the Cirrus CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use cirrus::model::DiskOffering;
use cirrus::{
    CirrusConfig, Cloudstack, CloudstackError, ConnectionLifecycle, CreateArgs, FileKeyPairStore,
    HttpClientFactory, KeyPairManager, MenuEntry, Server,
};

mod cli;

use cli::{Cli, CreateCommand, KeyPairCommand, VmCommand, ZonesCommand};

type Connector = Cloudstack<HttpClientFactory>;
type Hooks = ConnectionLifecycle<FileKeyPairStore>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{}", .0.message())]
    Cloud(#[from] CloudstackError),
    #[error("invalid --param '{0}': expected KEY=VALUE")]
    InvalidParam(String),
    #[error("connection test failed: {0}")]
    ConnectionTest(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
}

fn load() -> Result<(CirrusConfig, Connector), CliError> {
    let config =
        CirrusConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let connector = Cloudstack::new(config.to_record(), HttpClientFactory::new())
        .with_poll_interval(config.poll_interval())
        .with_wait_timeout(config.wait_timeout());
    Ok((config, connector))
}

fn hooks(config: &CirrusConfig) -> Hooks {
    ConnectionLifecycle::new(KeyPairManager::new(FileKeyPairStore::new(
        config.key_store.as_str(),
    )))
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let (config, cloud) = load()?;
    let mut out = io::stdout().lock();
    match cli {
        Cli::Zones(command) => zones(&cloud, &command, &mut out).await,
        Cli::Domains => print_lines(&mut out, cloud.domains().await?),
        Cli::Hypervisors => print_lines(&mut out, cloud.hypervisors().await?),
        Cli::Networks => {
            let networks = cloud.networks().await?;
            print_lines(
                &mut out,
                networks
                    .into_iter()
                    .map(|network| format!("{}\t{}", network.id, network.name)),
            )
        }
        Cli::Images => {
            let menu = cloud.templates_isos().await?;
            print_lines(&mut out, menu.iter().map(render_menu_entry))
        }
        Cli::Flavors => {
            let flavors = cloud.flavors().await?;
            print_lines(
                &mut out,
                flavors
                    .into_iter()
                    .map(|flavor| format!("{}\t{}", flavor.id, flavor.name)),
            )
        }
        Cli::DiskOfferings => {
            let offerings = cloud.disk_offerings().await?;
            print_lines(&mut out, offerings.iter().map(render_disk_offering))
        }
        Cli::TestConnection => test_connection(&cloud, &mut out).await,
        Cli::KeyPair(command) => key_pair(&hooks(&config), &cloud, &command, &mut out).await,
        Cli::Vm(command) => vm(&hooks(&config), &cloud, command, &mut out).await,
    }
}

async fn zones(
    cloud: &Connector,
    command: &ZonesCommand,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if command.first {
        if let Some(zone) = cloud.default_zone_id().await? {
            writeln!(out, "{zone}")?;
        }
        return Ok(());
    }
    let zones = cloud.zones().await?;
    print_lines(
        out,
        zones
            .into_iter()
            .map(|zone| format!("{}\t{}", zone.id, zone.name)),
    )
}

async fn test_connection(cloud: &Connector, out: &mut impl Write) -> Result<(), CliError> {
    let outcome = cloud.test_connection().await;
    if outcome.valid {
        writeln!(out, "connection ok")?;
        return Ok(());
    }
    Err(CliError::ConnectionTest(
        outcome.errors.full_messages().join("; "),
    ))
}

async fn key_pair(
    hooks: &Hooks,
    cloud: &Connector,
    command: &KeyPairCommand,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        KeyPairCommand::Setup => {
            let key_pair = hooks.after_create(cloud).await?;
            writeln!(out, "{}", key_pair.name)?;
        }
        KeyPairCommand::Teardown => {
            let outcome = hooks.after_destroy(cloud).await;
            if let Some(name) = outcome.key_pair {
                writeln!(out, "{name}")?;
            }
        }
    }
    Ok(())
}

async fn vm(
    hooks: &Hooks,
    cloud: &Connector,
    command: VmCommand,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        VmCommand::Create(args) => {
            let defaults = hooks.launch_defaults(cloud.record())?;
            let server = cloud.create(create_args(args)?, &defaults).await?;
            print_server(out, &server)
        }
        VmCommand::Destroy(target) => cloud.destroy(&target.id).await.map_err(CliError::from),
        VmCommand::Start(target) => cloud.start(&target.id).await.map_err(CliError::from),
        VmCommand::Stop(target) => cloud.stop(&target.id).await.map_err(CliError::from),
        VmCommand::Pause(target) => cloud.pause(&target.id).await.map_err(CliError::from),
        VmCommand::Reset(target) => cloud.reset(&target.id).await.map_err(CliError::from),
        VmCommand::Console(target) => {
            let session = cloud.console(&target.id).await?;
            let rendered = serde_json::to_string_pretty(&session)
                .map_err(|err| CliError::Output(io::Error::other(err)))?;
            writeln!(out, "{rendered}")?;
            Ok(())
        }
        VmCommand::Show(target) => {
            let server = cloud.server(&target.id).await?;
            print_server(out, &server)
        }
    }
}

fn create_args(command: CreateCommand) -> Result<CreateArgs, CliError> {
    let mut args = CreateArgs::new(command.name, command.image, command.flavor);
    args.network_id = command.network;
    args.subnet_id = command.subnet;
    args.key_pair = command.key_pair;
    for param in command.params {
        let (key, value) = param
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| CliError::InvalidParam(param.clone()))?;
        args.extra.insert(key.trim().to_owned(), value.to_owned());
    }
    Ok(args)
}

fn render_menu_entry(entry: &MenuEntry) -> String {
    format!("{}\t{}", entry.id(), entry.label())
}

fn render_disk_offering(offering: &DiskOffering) -> String {
    match offering.disk_size_gb {
        Some(size) if !offering.custom => format!("{}\t{}\t{size} GB", offering.id, offering.name),
        _ => format!("{}\t{}\tcustom", offering.id, offering.name),
    }
}

fn print_server(out: &mut impl Write, server: &Server) -> Result<(), CliError> {
    writeln!(out, "id\t{}", server.id)?;
    writeln!(out, "name\t{server}")?;
    writeln!(out, "state\t{}", server.state)?;
    writeln!(out, "ip\t{}", server.ip_address().unwrap_or("-"))?;
    writeln!(out, "mac\t{}", server.mac_address().unwrap_or("-"))?;
    if let Some(created) = server.created_at() {
        writeln!(out, "created\t{}", created.to_rfc3339())?;
    }
    Ok(())
}

fn print_lines(
    out: &mut impl Write,
    lines: impl IntoIterator<Item = String>,
) -> Result<(), CliError> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
