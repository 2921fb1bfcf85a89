//! Topodraw - Main entry point
//!
//! Command-line front end over a per-user topology session.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use topodraw_core::{DeviceId, DeviceKind, Position, Role, Session, User};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "topodraw")]
#[command(about = "Network topology editor for computers and switches")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "topodraw.toml")]
    config: PathBuf,

    /// Directory holding the per-user topology files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// User whose topology is edited
    #[arg(short, long)]
    user: Option<String>,

    /// Role of the user (admin, user)
    #[arg(short, long)]
    role: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all devices
    List {
        /// Print the topology as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one device
    Show { name: String },
    /// Add a computer, optionally linked to a device
    AddComputer {
        name: String,
        ip: String,
        #[arg(long)]
        link: Option<String>,
    },
    /// Add a switch, optionally linked to devices
    AddSwitch {
        name: String,
        ip: String,
        #[arg(long)]
        link: Vec<String>,
    },
    /// Rename a device
    Rename { name: String, new_name: String },
    /// Change a device's IP address
    SetIp { name: String, ip: String },
    /// Link a computer to a device, or unlink it when `--to` is omitted
    LinkComputer {
        name: String,
        #[arg(long)]
        to: Option<String>,
    },
    /// Replace the link set of a switch
    LinkSwitch { name: String, targets: Vec<String> },
    /// Devices that can be offered as link targets
    Candidates { name: Option<String> },
    /// Delete a device and all its links
    Delete { name: String },
    /// Move a device on the canvas
    Move { name: String, x: i32, y: i32 },
    /// List every link once
    Edges,
    /// List users with a stored topology (admin only)
    Users,
    /// Write a default configuration file
    InitConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Topodraw v{}", env!("CARGO_PKG_VERSION"));

    if matches!(args.command, Command::InitConfig) {
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;

    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(user) = args.user {
        config.session.user = user;
    }
    if let Some(role) = args.role {
        config.session.role = role.parse::<Role>()?;
    }

    info!(
        data_dir = %config.storage.data_dir.display(),
        user = %config.session.user,
        "Configuration loaded"
    );

    let user = User::new(&config.session.user, config.session.role)?;
    let mut session = Session::open(user, &config.storage.data_dir, config.canvas.to_canvas())?;
    if !session.warnings().is_empty() {
        info!(
            warnings = session.warnings().len(),
            path = %session.path().display(),
            "Topology loaded with repairs"
        );
    }

    run(&mut session, args.command)
}

fn run(session: &mut Session, command: Command) -> Result<()> {
    match command {
        Command::List { json } => {
            let topo = session.topology();
            if json {
                println!("{}", serde_json::to_string_pretty(&topo.snapshot())?);
            } else {
                println!("{} devices:", topo.len());
                for (_, device) in topo.devices() {
                    println!("  - {} [{}] at {}", device, device.kind(), device.position);
                }
            }
        }
        Command::Show { name } => {
            let topo = session.topology();
            let id = topo.resolve(&name)?;
            let device = topo.get(id).context("device vanished")?;
            println!("{}", device);
            println!("  Kind: {}", device.kind());
            println!("  Position: {}", device.position);
            match device.kind() {
                DeviceKind::Computer => {
                    println!("  Linked device: {}", topo.graph().linked_device_name(id)?);
                }
                DeviceKind::Switch => {
                    println!("  Linked devices: {}", topo.graph().linked_devices_names(id)?);
                }
            }
        }
        Command::AddComputer { name, ip, link } => {
            let links = resolve_all(session, link.iter())?;
            let id = session.add_device(DeviceKind::Computer, &name, &ip, &links)?;
            print_added(session, id);
        }
        Command::AddSwitch { name, ip, link } => {
            let links = resolve_all(session, link.iter())?;
            let id = session.add_device(DeviceKind::Switch, &name, &ip, &links)?;
            print_added(session, id);
        }
        Command::Rename { name, new_name } => {
            let id = session.topology().resolve(&name)?;
            session.rename_device(id, &new_name)?;
            println!("Renamed {} to {}", name, new_name.trim());
        }
        Command::SetIp { name, ip } => {
            let id = session.topology().resolve(&name)?;
            session.set_device_ip(id, &ip)?;
            if let Some(device) = session.topology().get(id) {
                println!("{}", device);
            }
        }
        Command::LinkComputer { name, to } => {
            let id = session.topology().resolve(&name)?;
            let target = to
                .as_deref()
                .map(|t| session.topology().resolve(t))
                .transpose()?;
            session.relink_computer(id, target)?;
            println!(
                "{} -> {}",
                name,
                session.topology().graph().linked_device_name(id)?
            );
        }
        Command::LinkSwitch { name, targets } => {
            let id = session.topology().resolve(&name)?;
            let targets = resolve_all(session, targets.iter())?;
            session.relink_switch(id, &targets)?;
            println!(
                "{} -> {}",
                name,
                session.topology().graph().linked_devices_names(id)?
            );
        }
        Command::Candidates { name } => {
            let topo = session.topology();
            let editing = name.as_deref().map(|n| topo.resolve(n)).transpose()?;
            for id in topo.link_candidates(editing) {
                if let Some(device) = topo.get(id) {
                    println!("{} [{}]", device.name, device.kind());
                }
            }
        }
        Command::Delete { name } => {
            let id = session.topology().resolve(&name)?;
            let removed = session.delete_device(id)?;
            println!("Deleted {}", removed.name);
        }
        Command::Move { name, x, y } => {
            let id = session.topology().resolve(&name)?;
            let placed = session.move_device(id, Position::new(x, y))?;
            println!("Moved {} to {}", name, placed);
        }
        Command::Edges => {
            for edge in session.topology().edges() {
                println!("{} -- {}", edge.from, edge.to);
            }
        }
        Command::Users => {
            for user in session.list_users()? {
                println!("{}", user);
            }
        }
        Command::InitConfig => unreachable!("handled before the session is opened"),
    }

    Ok(())
}

fn resolve_all<'a>(
    session: &Session,
    names: impl Iterator<Item = &'a String>,
) -> Result<Vec<DeviceId>> {
    let topo = session.topology();
    let ids = names
        .map(|n| topo.resolve(n))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn print_added(session: &Session, id: DeviceId) {
    if let Some(device) = session.topology().get(id) {
        println!("Added {} at {}", device, device.position);
    }
}
