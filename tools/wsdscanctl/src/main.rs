// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! WSD Scanner Control
//!
//! Command-line front end for the wsdscan library: discover devices, read
//! their metadata, run scans and host the event endpoint for walk-up
//! (device-initiated) scanning.
//!
//! # Usage
//!
//! ```bash
//! # Find devices on the local network
//! wsdscanctl discover
//!
//! # Watch Hello/Bye announcements
//! wsdscanctl listen
//!
//! # Show metadata of one device
//! wsdscanctl info --address http://10.0.0.9:3702/
//!
//! # Run a scan with the first profile in ./profiles
//! wsdscanctl scan --address http://10.0.0.9:3702/
//!
//! # Register profiles on the device panel and serve walk-up scans
//! wsdscanctl serve --address http://10.0.0.9:3702/ --bind 10.0.0.2
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use wsdscan::config::{load_profiles, ClientConfig, ScanProfile};
use wsdscan::discovery::{multicast, DeviceCache, DiscoveryEngine, TargetService};
use wsdscan::eventing::{EventingClient, Expiration, Subscription};
use wsdscan::events::{ContextRegistry, EventQueues, EventServer, ScanSlot};
use wsdscan::scan::ops::ScanClient;
use wsdscan::scan::orchestrator::{LogExport, ScanOrchestrator};
use wsdscan::soap;
use wsdscan::transfer::{HostedService, TransferResolver};
use wsdscan::transport::{HttpTransport, Transport};

/// WSD Scanner Control
#[derive(Parser, Debug)]
#[command(name = "wsdscanctl")]
#[command(about = "WSD scanner control CLI")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Per-exchange reply timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe the local network and list answering devices
    Discover {
        /// Reply collection window in seconds
        #[arg(short, long, default_value = "3")]
        window: u64,
    },

    /// Watch Hello/Bye announcements and track the device set
    Listen,

    /// Show the metadata of one device
    Info {
        /// Device transport address, e.g. http://10.0.0.9:3702/
        #[arg(short, long)]
        address: String,
    },

    /// Run one scan against a device
    Scan {
        /// Device transport address
        #[arg(short, long)]
        address: String,

        /// Directory holding YAML scan profiles
        #[arg(long, default_value = "profiles")]
        profiles: PathBuf,

        /// Profile id to use (first profile when omitted)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Register profiles on the device and serve device-initiated scans
    Serve {
        /// Device transport address
        #[arg(short, long)]
        address: String,

        /// Directory holding YAML scan profiles
        #[arg(long, default_value = "profiles")]
        profiles: PathBuf,

        /// Local address the device pushes notifications to
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,

        /// Notification listener port
        #[arg(short, long, default_value = "6666")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let timeout = Duration::from_secs(args.timeout);
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
    let client_urn = soap::gen_urn();

    match args.command {
        Commands::Discover { window } => {
            discover(transport, client_urn, Duration::from_secs(window)).await
        }
        Commands::Listen => listen(transport, client_urn, timeout).await,
        Commands::Info { address } => info_cmd(transport, client_urn, timeout, &address).await,
        Commands::Scan {
            address,
            profiles,
            profile,
        } => scan(transport, client_urn, timeout, &address, &profiles, profile).await,
        Commands::Serve {
            address,
            profiles,
            bind,
            port,
        } => serve(transport, client_urn, timeout, &address, &profiles, bind, port).await,
    }
}

async fn discover(
    transport: Arc<dyn Transport>,
    client_urn: String,
    window: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = DiscoveryEngine::new(transport, client_urn, window);
    let targets = engine.probe_multicast(window).await?;
    if targets.is_empty() {
        println!("no devices answered");
        return Ok(());
    }
    for target in targets {
        println!("{}", target.endpoint);
        println!("  xaddrs: {}", target.xaddrs.join(" "));
        println!("  types:  {}", target.types.join(" "));
    }
    Ok(())
}

async fn listen(
    transport: Arc<dyn Transport>,
    client_urn: String,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = DiscoveryEngine::new(transport, client_urn, timeout);
    let sockets = multicast::open_listeners()?;
    let mut cache = DeviceCache::new();
    println!("listening for announcements, ctrl-c to stop");
    loop {
        tokio::select! {
            announcement = engine.listen_announcements(&sockets) => {
                let announcement = announcement?;
                if announcement.is_hello {
                    let endpoint = announcement.target.endpoint.clone();
                    if cache.upsert(announcement.target) {
                        println!("+ {}", endpoint);
                    }
                } else {
                    let endpoint = announcement.target.endpoint.clone();
                    if cache.remove(&endpoint) {
                        println!("- {}", endpoint);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{} device(s) seen", cache.len());
                return Ok(());
            }
        }
    }
}

/// Probe + resolve + metadata Get against one address.
async fn locate(
    transport: &Arc<dyn Transport>,
    client_urn: &str,
    timeout: Duration,
    address: &str,
) -> Result<(TargetService, HostedService), Box<dyn std::error::Error>> {
    let engine = DiscoveryEngine::new(Arc::clone(transport), client_urn.to_string(), timeout);
    let target = engine
        .get_device(address)
        .await?
        .ok_or("no WSD device answered at that address")?;
    let resolver = TransferResolver::new(Arc::clone(transport), client_urn.to_string(), timeout);
    let (device_info, services) = resolver.get(&target).await?;
    info!(
        model = %device_info.model_name,
        name = %device_info.friendly_name,
        "device located"
    );
    let scanner = services
        .into_iter()
        .find(HostedService::is_scanner)
        .ok_or("device hosts no scanner service")?;
    Ok((target, scanner))
}

async fn info_cmd(
    transport: Arc<dyn Transport>,
    client_urn: String,
    timeout: Duration,
    address: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = DiscoveryEngine::new(Arc::clone(&transport), client_urn.clone(), timeout);
    let target = engine
        .get_device(address)
        .await?
        .ok_or("no WSD device answered at that address")?;
    let resolver = TransferResolver::new(Arc::clone(&transport), client_urn, timeout);
    let (device_info, services) = resolver.get(&target).await?;
    println!("endpoint:     {}", target.endpoint);
    println!("manufacturer: {}", device_info.manufacturer);
    println!("model:        {}", device_info.model_name);
    println!("friendly:     {}", device_info.friendly_name);
    println!("firmware:     {}", device_info.firmware_version);
    println!("serial:       {}", device_info.serial_number);
    for service in services {
        let role = if service.is_scanner() { "scanner" } else { "other" };
        println!("service [{}]: {}", role, service.endpoint);
    }
    Ok(())
}

fn pick_profile(
    dir: &std::path::Path,
    id: Option<String>,
) -> Result<ScanProfile, Box<dyn std::error::Error>> {
    let profiles = load_profiles(dir)?;
    match id {
        Some(id) => profiles
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| format!("no profile with id '{}'", id).into()),
        None => profiles
            .into_iter()
            .next()
            .ok_or_else(|| format!("no profiles in {}", dir.display()).into()),
    }
}

async fn scan(
    transport: Arc<dyn Transport>,
    client_urn: String,
    timeout: Duration,
    address: &str,
    profiles: &std::path::Path,
    profile_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = pick_profile(profiles, profile_id)?;
    let (_, scanner) = locate(&transport, &client_urn, timeout, address).await?;
    let orchestrator = ScanOrchestrator::new(
        ScanClient::new(transport, client_urn, timeout),
        Arc::new(LogExport),
    );
    let paths = orchestrator.scan_with_profile(&scanner, &profile).await?;
    if paths.is_empty() {
        println!("scan finished with no pages");
    }
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

async fn serve(
    transport: Arc<dyn Transport>,
    client_urn: String,
    timeout: Duration,
    address: &str,
    profiles_dir: &std::path::Path,
    bind: String,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let profiles = load_profiles(profiles_dir)?;
    if profiles.is_empty() {
        return Err(format!("no profiles in {}", profiles_dir.display()).into());
    }
    let config = ClientConfig {
        bind_address: bind.clone(),
        event_port: port,
        ..ClientConfig::default()
    };
    if bind == "0.0.0.0" {
        warn!("binding to 0.0.0.0; devices will be told to notify {} which is not routable", config.notify_address());
    }
    let notify_addr = config.notify_address();

    let (_, scanner) = locate(&transport, &client_urn, timeout, address).await?;
    let eventing = EventingClient::new(Arc::clone(&transport), client_urn.clone(), timeout);

    let mut registry = ContextRegistry::new();
    let mut subscriptions: Vec<Subscription> = Vec::new();
    for profile in &profiles {
        let (subscription, destination_token) = eventing
            .subscribe_scan_available(
                &scanner,
                &profile.name,
                &profile.id,
                &notify_addr,
                Expiration::None,
            )
            .await?;
        registry.register(
            &profile.id,
            ScanSlot {
                service: scanner.clone(),
                destination_token,
                profile: profile.clone(),
            },
        )?;
        info!(profile = %profile.id, "registered on device panel");
        subscriptions.push(subscription);
    }
    subscriptions.push(
        eventing
            .subscribe_all_scanner_events(&scanner, &notify_addr, Expiration::None)
            .await?,
    );

    let orchestrator = Arc::new(ScanOrchestrator::new(
        ScanClient::new(Arc::clone(&transport), client_urn, timeout),
        Arc::new(LogExport),
    ));
    let server = EventServer::new(
        Arc::new(EventQueues::new()),
        Arc::new(registry),
        orchestrator,
    );

    let listener = TcpListener::bind((bind.as_str(), port)).await?;
    let shutdown = Arc::new(Notify::new());
    let trigger = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.notify_one();
        }
    });
    println!("serving device-initiated scans on {}, ctrl-c to stop", notify_addr);
    server.serve(listener, shutdown).await?;

    for subscription in &subscriptions {
        if let Err(e) = eventing.unsubscribe(&scanner, &subscription.id).await {
            warn!(subscription = %subscription.id, error = %e, "unsubscribe failed");
        }
    }
    Ok(())
}
