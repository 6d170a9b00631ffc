//! nbsync: converge one NetBox record to a declared state.
//!
//! Reads the desired fields from `--data` or `--data-file`, reconciles them
//! against the NetBox API and prints the result as JSON on stdout. Logs go to
//! stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nbsync_core::{
    ClientConfig, EngineOptions, NetboxClient, Registry, StateReconciler, TargetState,
};
use serde_json::{Value, json};
use tabled::{Table, Tabled};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod input;

/// Declarative NetBox reconciliation
#[derive(Parser, Debug)]
#[command(name = "nbsync", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Converge one record to the requested state
    Apply(ApplyArgs),

    /// List the resource types that can be reconciled
    Resources,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Resource type (see `nbsync resources`)
    #[arg(long)]
    resource: String,

    /// present, absent or new
    #[arg(long, default_value = "present")]
    state: TargetState,

    /// Desired fields as a JSON object
    #[arg(long, conflicts_with = "data_file", required_unless_present = "data_file")]
    data: Option<String>,

    /// Desired fields from a JSON or YAML file
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Report what would change without changing anything
    #[arg(long)]
    check: bool,

    /// Create missing tags and groups referenced by name
    #[arg(long)]
    create_missing_references: bool,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// NetBox base URL (e.g., https://netbox.example.com)
    #[arg(long, env = "NETBOX_URL")]
    url: String,

    /// API token
    #[arg(long, env = "NETBOX_TOKEN", hide_env_values = true)]
    token: String,

    /// Verify the server's TLS certificate
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    validate_certs: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Retries for idempotent requests after a transient failure
    #[arg(long, default_value = "3")]
    max_retries: u32,
}

impl ConnectionArgs {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            validate_certs: self.validate_certs,
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.max_retries,
            ..ClientConfig::new(&self.url, &self.token)
        }
    }
}

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "RESOURCE")]
    name: &'static str,
    #[tabled(rename = "ENDPOINT")]
    endpoint: &'static str,
    #[tabled(rename = "STATES")]
    states: String,
    #[tabled(rename = "KEY")]
    key: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nbsync=info,nbsync_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resources => {
            print_resources(&Registry::builtin());
            ExitCode::SUCCESS
        }
        Commands::Apply(args) => match apply(&args).await {
            Ok(output) => {
                println!("{}", output);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{:#}", e);
                println!("{}", json!({"failed": true, "msg": format!("{:#}", e)}));
                ExitCode::FAILURE
            }
        },
    }
}

async fn apply(args: &ApplyArgs) -> Result<Value> {
    let spec = input::load(args.data.as_deref(), args.data_file.as_deref())?;
    let options = EngineOptions::default()
        .check_mode(args.check)
        .create_missing_references(args.create_missing_references);

    info!(url = %args.connection.url, "Using NetBox");
    let client = NetboxClient::new(args.connection.client_config())
        .context("failed to set up NetBox client")?;
    let engine = StateReconciler::new(client, Registry::builtin());

    let result = engine
        .reconcile(&args.resource, &spec, args.state, options)
        .await?;
    Ok(result.to_output(&args.resource))
}

fn print_resources(registry: &Registry) {
    let rows: Vec<ResourceRow> = registry
        .iter()
        .map(|schema| ResourceRow {
            name: schema.name,
            endpoint: schema.endpoint,
            states: schema
                .states
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            key: if schema.natural_key.is_empty() {
                "-".to_string()
            } else {
                schema.natural_key.join(" + ")
            },
        })
        .collect();
    println!("{}", Table::new(rows));
}
