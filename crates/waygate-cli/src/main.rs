//! `waygate` — fetch verified content from the permanent web through a
//! routed gateway.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use waygate_client::{FetchOptions, WaygateClient, WaygateConfig};
use waygate_core::ContentReference;
use waygate_registry::{Gateway, StaticRegistrySource};
use waygate_routing::RoutingStrategy;

#[derive(Debug, Parser)]
#[command(name = "waygate", version, about = "Verifying content router client")]
struct Cli {
    /// State directory for registry, performance and routing persistence.
    #[arg(long, env = "WAYGATE_STATE_DIR", global = true)]
    state_dir: Option<PathBuf>,
    /// Pin every request to this gateway URL, bypassing routing.
    #[arg(long, env = "WAYGATE_GATEWAY", global = true)]
    gateway: Option<String>,
    /// Routing strategy tag (random, stake-weighted-random, highest-stake,
    /// top-five-stake-random, weighted-onchain, optimal, static,
    /// fastest-ping).
    #[arg(long, env = "WAYGATE_STRATEGY", global = true)]
    strategy: Option<RoutingStrategy>,
    /// Skip verification; artifacts are delivered unverified.
    #[arg(long, global = true)]
    no_verify: bool,
    /// Fail the request when verification fails.
    #[arg(long, global = true)]
    strict: bool,
    /// Whole-artifact fetch budget in milliseconds.
    #[arg(long, env = "WAYGATE_TIMEOUT_MS", global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a reference (content id or name[/path]) and emit the bytes.
    Fetch(FetchArgs),
    /// Inspect and maintain the gateway registry.
    Gateways {
        #[command(subcommand)]
        command: GatewaysCommand,
    },
    /// Inspect or toggle blacklisted gateway addresses.
    Blacklist {
        #[command(subcommand)]
        command: BlacklistCommand,
    },
    /// Show or persist the routing strategy.
    Strategy {
        #[command(subcommand)]
        command: StrategyCommand,
    },
}

#[derive(Debug, Args)]
struct FetchArgs {
    /// A 43-character content id or a name, optionally followed by /path.
    reference: String,
    /// Write the artifact here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print the trust report as JSON to stderr.
    #[arg(long)]
    report: bool,
}

#[derive(Debug, Subcommand)]
enum GatewaysCommand {
    /// List the current snapshot with eligibility and latency.
    List,
    /// Replace the registry from a JSON snapshot file.
    Refresh {
        /// JSON array of gateway records.
        snapshot: PathBuf,
    },
    /// Probe the top-scored gateways and record latencies.
    Benchmark,
}

#[derive(Debug, Subcommand)]
enum BlacklistCommand {
    List,
    /// Add or remove one gateway address.
    Toggle { address: String },
}

#[derive(Debug, Subcommand)]
enum StrategyCommand {
    Get,
    Set { strategy: RoutingStrategy },
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn build_config(cli: &Cli) -> WaygateConfig {
    let mut config = WaygateConfig::default();
    if let Some(strategy) = cli.strategy {
        config.routing_strategy = strategy;
    }
    config.static_gateway = cli.gateway.clone();
    config.verification_enabled = !cli.no_verify;
    config.strict_mode = cli.strict;
    if let Some(timeout_ms) = cli.timeout_ms {
        config.fetch_timeout_ms = timeout_ms;
    }
    config.state_dir = cli.state_dir.clone();
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let client = WaygateClient::new(build_config(&cli)).context("failed to build client")?;

    let result = run(&cli, &client).await;
    client.shutdown();
    result
}

async fn run(cli: &Cli, client: &WaygateClient) -> Result<()> {
    match &cli.command {
        Command::Fetch(args) => fetch(client, args).await,
        Command::Gateways { command } => match command {
            GatewaysCommand::List => list_gateways(client),
            GatewaysCommand::Refresh { snapshot } => refresh_gateways(client, snapshot).await,
            GatewaysCommand::Benchmark => benchmark(client).await,
        },
        Command::Blacklist { command } => match command {
            BlacklistCommand::List => {
                for address in client.blacklist() {
                    println!("{address}");
                }
                Ok(())
            }
            BlacklistCommand::Toggle { address } => {
                let blacklisted = client.toggle_blacklist(address);
                println!(
                    "{address}: {}",
                    if blacklisted { "blacklisted" } else { "cleared" }
                );
                Ok(())
            }
        },
        Command::Strategy { command } => match command {
            StrategyCommand::Get => {
                println!("{}", client.strategy());
                Ok(())
            }
            StrategyCommand::Set { strategy } => {
                client.set_strategy(*strategy);
                println!("{strategy}");
                Ok(())
            }
        },
    }
}

async fn fetch(client: &WaygateClient, args: &FetchArgs) -> Result<()> {
    let reference: ContentReference = args
        .reference
        .parse()
        .with_context(|| format!("invalid reference '{}'", args.reference))?;

    let outcome = client
        .fetch(&reference, &FetchOptions::default())
        .await
        .with_context(|| format!("failed to fetch '{reference}'"))?;

    if args.report {
        eprintln!("{}", serde_json::to_string_pretty(&outcome.report)?);
    }
    if !outcome.artifact.verified {
        tracing::warn!(
            reason = outcome.artifact.failure_reason.as_deref().unwrap_or("unknown"),
            "artifact is NOT verified"
        );
    }

    match &args.output {
        Some(path) => {
            std::fs::write(path, &outcome.artifact.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(
                bytes = outcome.artifact.bytes.len(),
                path = %path.display(),
                verified = outcome.artifact.verified,
                "artifact written"
            );
        }
        None => {
            std::io::stdout()
                .write_all(&outcome.artifact.bytes)
                .context("failed to write artifact to stdout")?;
        }
    }
    Ok(())
}

fn list_gateways(client: &WaygateClient) -> Result<()> {
    let snapshot = client.registry_snapshot();
    if snapshot.is_empty() {
        bail!("registry is empty; run `waygate gateways refresh <snapshot.json>` first");
    }
    let blacklist = client.blacklist();
    for gateway in snapshot.gateways() {
        let latency = client
            .performance(&gateway.fqdn)
            .and_then(|record| record.avg_response_time_ms)
            .map(|avg| format!("{avg:.0} ms"))
            .unwrap_or_else(|| "-".to_string());
        let flag = if blacklist.contains(&gateway.address) {
            " [blacklisted]"
        } else {
            ""
        };
        println!(
            "{:<44} {:?}  stake={:<12} avg={latency}{flag}  {}",
            gateway.address,
            gateway.status,
            gateway.total_stake(),
            gateway.origin(),
        );
    }
    Ok(())
}

async fn refresh_gateways(client: &WaygateClient, snapshot: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(snapshot)
        .with_context(|| format!("failed to read {}", snapshot.display()))?;
    let gateways: Vec<Gateway> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a gateway snapshot", snapshot.display()))?;
    let count = client
        .refresh_registry(&StaticRegistrySource::new(gateways))
        .await?;
    println!("registry refreshed: {count} gateways");
    Ok(())
}

async fn benchmark(client: &WaygateClient) -> Result<()> {
    let outcomes = client.benchmark().await;
    if outcomes.is_empty() {
        println!("nothing probed (benchmark window still fresh or registry empty)");
        return Ok(());
    }
    for outcome in outcomes {
        match outcome.latency_ms {
            Some(latency_ms) => println!("{:<40} {latency_ms} ms", outcome.fqdn),
            None => println!("{:<40} failed", outcome.fqdn),
        }
    }
    Ok(())
}
