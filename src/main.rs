use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fabkit::{
    backup, init_logging, Config, DeploymentSystem, DeviceCommands, DeviceDescriptor,
    DeviceSession, Discovery, Provisioner, BUILD_DATE, VERSION,
};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Commissioning tool for Rorze components
#[derive(Parser, Debug)]
#[command(name = "fabkit")]
#[command(about = "Discover, inspect, back up and provision Rorze components")]
#[command(version)]
struct Args {
    /// Config file (.toml or .json); the platform config file otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep the network map and identify every reachable component
    Discover,

    /// Read the status line of one component
    Status {
        /// Component address
        ip: Ipv4Addr,
    },

    /// Back up the configuration of one component
    Backup {
        /// Component address
        ip: Ipv4Addr,

        /// Output directory, the configured one otherwise
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write host port, host IP and log host for the component's system
    Provision {
        /// Component address
        ip: Ipv4Addr,

        /// Deployment system, derived from the address otherwise
        #[arg(long)]
        system: Option<String>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => Config::default_path().context("locating config file")?,
    };
    let config = Config::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    info!("Using configuration from {}", path.display());
    Ok(config)
}

/// Identify a unit and open a session to it
fn open(config: &Config, ip: Ipv4Addr) -> Result<DeviceSession> {
    let host = config.network.lookup(ip);
    let descriptor = config
        .identity_probe()
        .identify(ip, host.system, &host.label);
    if !descriptor.is_identified() {
        warn!("{} did not identify itself; continuing with address only", ip);
    }

    let session = DeviceSession::new(descriptor, config.session_config());
    session.connect()?;
    Ok(session)
}

async fn discover(config: &Config) -> Result<()> {
    let discovery = Discovery::with_probe(
        &config.network,
        Arc::new(config.ping_probe()),
        config.discovery_config(),
    );
    let report = discovery.discover().await?;
    let descriptors: Vec<DeviceDescriptor> =
        config.identity_probe().identify_report(&report).await;

    for descriptor in &descriptors {
        info!("{}", descriptor);
    }
    let output = serde_json::json!({
        "system": report.system,
        "hosts": report.hosts,
        "devices": descriptors,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_blocking(config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Discover => bail!("discover runs on the async runtime"),
        Command::Status { ip } => {
            let session = open(config, ip)?;
            let status = session.get_status()?;
            println!("{}: {}", session.descriptor().display_name(), status);
            session.close();
        }
        Command::Backup { ip, output } => {
            let session = open(config, ip)?;
            let dir = output.unwrap_or_else(|| config.backup.output_directory.clone());
            let path = backup(&session, &dir)?;
            println!("{}", path.display());
            session.close();
        }
        Command::Provision { ip, system } => {
            let system = match system {
                Some(name) => DeploymentSystem::from_name(&name),
                None => config.network.system_of(ip),
            };
            if system == DeploymentSystem::Unknown {
                bail!("cannot tell which deployment system {} belongs to", ip);
            }
            let session = open(config, ip)?;
            Provisioner::new(&session)?.apply_basic_settings(system)?;
            println!("{}", session.status());
            session.close();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;
    info!("FabKit {} (built {})", VERSION, BUILD_DATE);

    let config = load_config(args.config)?;

    match args.command {
        Command::Discover => discover(&config).await,
        command => tokio::task::spawn_blocking(move || run_blocking(&config, command)).await?,
    }
}
