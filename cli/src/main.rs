//! rss-delegate - probe remote shuffle access and inspect propagated decisions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rss_delegation::conf::{keys, DelegationConfig};
use rss_delegation::coordinator::create_coordinator_clients;
use rss_delegation::delegation::{AccessNegotiator, NegotiationPolicy, NegotiationReport};
use rss_delegation::{AccessResult, BackendKind, CoordinatorClient, Decision, JobConf};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rss-delegate")]
#[command(about = "Probe remote shuffle service access and inspect propagated shuffle decisions")]
#[command(version)]
struct Cli {
    /// Job configuration file (TOML)
    #[arg(short, long, global = true)]
    conf: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the coordinator quorum whether this job may use the remote shuffle service
    Negotiate {
        /// Access id, overrides spark.rss.access.id
        #[arg(long, env = "RSS_ACCESS_ID")]
        access_id: Option<String>,

        /// Comma-separated coordinator endpoints, overrides spark.rss.coordinator.quorum
        #[arg(long, env = "RSS_COORDINATOR_QUORUM")]
        quorum: Option<String>,

        /// Per-coordinator timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the negotiation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the backend a worker would build from the configuration
    Decision,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rss_delegation=info,rss_delegate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut conf = match &cli.conf {
        Some(path) => JobConf::load(path)
            .with_context(|| format!("Failed to load job configuration {}", path.display()))?,
        None => JobConf::new(),
    };

    match cli.command {
        Commands::Negotiate {
            access_id,
            quorum,
            timeout_ms,
            json,
        } => {
            apply_overrides(&mut conf, access_id, quorum, timeout_ms);

            let report = negotiate(&conf).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            Ok(exit_code(&report))
        }
        Commands::Decision => {
            println!("{}", describe_decision(&conf)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Layer command line values over the loaded job configuration
fn apply_overrides(
    conf: &mut JobConf,
    access_id: Option<String>,
    quorum: Option<String>,
    timeout_ms: Option<u64>,
) {
    if let Some(access_id) = access_id {
        conf.set(keys::ACCESS_ID, access_id);
    }
    if let Some(quorum) = quorum {
        conf.set(keys::COORDINATOR_QUORUM, quorum);
    }
    if let Some(timeout_ms) = timeout_ms {
        conf.set(keys::ACCESS_TIMEOUT_MS, timeout_ms.to_string());
    }
}

async fn negotiate(conf: &JobConf) -> Result<NegotiationReport> {
    let config = DelegationConfig::from_conf(conf).context("Invalid access settings")?;
    if config.coordinators.is_empty() {
        anyhow::bail!("No coordinators configured, set {} or --quorum", keys::COORDINATOR_QUORUM);
    }

    let clients = create_coordinator_clients(&config.coordinators);
    let report = AccessNegotiator::new(NegotiationPolicy::from(&config))
        .negotiate_with_report(&config.access_id, &clients, &config.assignment_tags)
        .await;

    for client in &clients {
        if let Err(e) = client.close() {
            tracing::warn!("Fail to close {}: {}", client.describe(), e);
        }
    }

    Ok(report)
}

fn exit_code(report: &NegotiationReport) -> ExitCode {
    if report.granted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// The decision a worker would read, with the raw keys it came from
fn describe_decision(conf: &JobConf) -> Result<String> {
    let decision = Decision::read(conf)?;

    let mut line = format!(
        "{} ({} = {}, {} = {})",
        decision,
        keys::RSS_ENABLED,
        conf.get_or(keys::RSS_ENABLED, "<unset>"),
        keys::SHUFFLE_MANAGER,
        conf.get_or(keys::SHUFFLE_MANAGER, "<unset>")
    );

    // Workers only trust the enabled flag; point out a manager name that disagrees.
    if let Some(manager) = conf.get(keys::SHUFFLE_MANAGER) {
        match manager.parse::<BackendKind>() {
            Ok(kind) if kind == decision.backend_kind() => {}
            Ok(kind) => line.push_str(&format!(
                "\nwarning: {} names the {} backend but workers will build {}",
                keys::SHUFFLE_MANAGER,
                kind,
                decision.backend_kind()
            )),
            Err(e) => line.push_str(&format!("\nwarning: {}", e)),
        }
    }

    Ok(line)
}

fn print_report(report: &NegotiationReport) {
    println!("Access id: {}", display_or_empty(&report.access_id));
    println!(
        "Tags:      {}",
        report.tags.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    for attempt in &report.attempts {
        let detail = match &attempt.outcome {
            AccessResult::Success => String::new(),
            AccessResult::Denied(reason) | AccessResult::Unreachable(reason) => {
                format!(" ({})", reason)
            }
        };
        println!(
            "  [pass {}] {} -> {}{} in {}ms",
            attempt.pass,
            attempt.coordinator,
            attempt.outcome.as_str(),
            detail,
            attempt.elapsed_ms
        );
    }
    println!(
        "Result:    {}",
        if report.granted { "granted" } else { "not granted" }
    );
}

fn display_or_empty(value: &str) -> &str {
    if value.is_empty() {
        "<empty>"
    } else {
        value
    }
}
