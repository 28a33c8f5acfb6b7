//! PBAC command line
//!
//! Loads policies from a TOML file and answers access questions against an
//! Ethereum JSON-RPC node

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pbac::{Address, JsonRpcLedger, Pbac, PolicyFile};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8545";

#[derive(Parser, Debug)]
#[command(name = "pbac")]
#[command(about = "Policy-based access control over on-chain state")]
struct Args {
    /// Policy file (TOML)
    #[arg(short = 'p', long)]
    policies: PathBuf,

    /// JSON-RPC endpoint [default: the file's [rpc] endpoint, then http://127.0.0.1:8545]
    #[arg(long)]
    rpc_url: Option<String>,

    /// Oracle timeout in milliseconds (overrides the file)
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether an account may perform an action on a resource
    Check {
        #[arg(long)]
        account: String,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        action: String,
    },
    /// Evaluate one policy for an account, ignoring its activation state
    Policy {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        account: String,
    },
    /// Print every loaded policy with its conditions
    List,
}

fn parse_account(raw: &str) -> Result<Address> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid account address '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut file = PolicyFile::load(&args.policies)
        .with_context(|| format!("loading {}", args.policies.display()))?;
    if let Some(timeout_ms) = args.timeout_ms {
        file.engine.oracle_timeout_ms = timeout_ms;
    }

    let endpoint = args
        .rpc_url
        .clone()
        .or_else(|| file.rpc.as_ref().map(|rpc| rpc.endpoint.clone()))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    info!("Policy file: {:?}", args.policies);
    info!("JSON-RPC endpoint: {}", endpoint);

    let ledger = JsonRpcLedger::new(endpoint, file.engine.oracle_timeout())
        .context("creating JSON-RPC client")?;
    let pbac = Pbac::builder()
        .oracle(Arc::new(ledger))
        .config(file.engine.clone())
        .build()?;
    let loaded = pbac.load_policy_file(&file)?;
    info!("Loaded {} policies", loaded.len());

    match args.command {
        Command::Check {
            account,
            resource,
            action,
        } => {
            let account = parse_account(&account)?;
            let decision = pbac.decide(account, &resource, &action).await;
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(if decision.granted {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Policy { id, account } => {
            let account = parse_account(&account)?;
            let satisfied = pbac.check_policy_for_user(id, account).await?;
            let report = json!({
                "policy_id": id,
                "account": account,
                "satisfied": satisfied,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if satisfied {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::List => {
            let mut listing = Vec::new();
            for policy in pbac.all_policies() {
                let conditions = policy
                    .condition_ids
                    .iter()
                    .map(|id| pbac.condition(*id).map(|c| (*c).clone()))
                    .collect::<pbac::Result<Vec<_>>>()?;
                listing.push(json!({
                    "policy": policy,
                    "conditions": conditions,
                }));
            }
            println!("{}", serde_json::to_string_pretty(&listing)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
