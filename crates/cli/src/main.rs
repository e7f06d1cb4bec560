use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use azrm_core::error::tainted_state;
use azrm_core::Op;
use azrm_provider::{AzureProvider, ProviderConfig};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use serde_json::{json, Value as Json};
use tracing::{info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

mod manifest;
mod state;

use manifest::Manifest;
use state::StateFile;

#[derive(Parser, Debug)]
#[command(author, version, about = "azrm: drive Azure Resource Manager resources one at a time")]
struct Cli {
    /// Provider configuration (YAML); ARM_* variables override it
    #[arg(short, long, global = true, env = "AZRM_PROVIDER_CONFIG")]
    provider: Option<PathBuf>,

    /// Local state file
    #[arg(short, long, default_value = "azrm.state.json", global = true)]
    state: PathBuf,

    /// Bearer token for Resource Manager; the Azure CLI is used when unset
    #[arg(long, env = "ARM_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print resource and data source schemas as JSON
    Schema {
        #[arg(long = "type")]
        type_name: Option<String>,
    },
    /// Check a manifest against its schema without calling Azure
    Validate { file: PathBuf },
    /// Show what `apply` would do
    Plan { file: PathBuf },
    /// Create, update or replace the resource and record it in state
    Apply { file: PathBuf },
    /// Re-read a resource held in state
    Refresh { file: PathBuf },
    /// Adopt an existing Azure object into state
    Import {
        #[arg(long = "type")]
        type_name: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: String,
    },
    /// Delete the resource and drop it from state
    Destroy { file: PathBuf },
    /// Read a data source and print its attributes
    Data { file: PathBuf },
}

fn print_json(v: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

fn connect(cli: &Cli) -> Result<AzureProvider> {
    let config = match &cli.provider {
        Some(path) => ProviderConfig::load(path)?,
        None => ProviderConfig::default(),
    }
    .with_env()?;
    let token = cli.access_token.clone().filter(|t| !t.is_empty()).map(SecretString::new);
    let mut provider = AzureProvider::new();
    provider.configure(&config, token)?;
    Ok(provider)
}

fn schema(type_name: Option<&str>) -> Result<()> {
    let schema = AzureProvider::new().schema();
    let Some(t) = type_name else { return print_json(&schema) };
    match schema.resources.get(t).or_else(|| schema.data_sources.get(t)) {
        Some(s) => print_json(s),
        None => anyhow::bail!("unknown type '{t}'"),
    }
}

fn plan(provider: &AzureProvider, state: &StateFile, m: &Manifest) -> Result<Op> {
    let prior = state.get(&m.address()).map(|e| &e.state);
    provider.plan(&m.type_name, prior, &m.config)
}

async fn apply(provider: &AzureProvider, state_path: &Path, m: &Manifest) -> Result<()> {
    let mut state = StateFile::load(state_path)?;
    let address = m.address();
    let prior = state.get(&address).map(|e| e.state.clone());
    let applied = match provider.apply(&m.type_name, prior.as_ref(), &m.config).await {
        Ok(applied) => applied,
        Err(err) => {
            if let Some(partial) = tainted_state(&err) {
                warn!(%address, id = %partial.id, "saving tainted resource");
                state.put(address, &m.type_name, partial.clone());
                state.save(state_path)?;
            }
            return Err(err);
        }
    };
    match applied {
        Some(applied) => {
            info!(%address, id = %applied.id, "applied");
            print_json(&json!({ "address": address, "id": applied.id }))?;
            state.put(address, &m.type_name, applied);
        }
        None => {
            state.remove(&address);
        }
    }
    state.save(state_path)
}

async fn refresh(provider: &AzureProvider, state_path: &Path, m: &Manifest) -> Result<()> {
    let mut state = StateFile::load(state_path)?;
    let address = m.address();
    let entry = state.get(&address).with_context(|| format!("{address} is not in state"))?;
    match provider.read(&entry.type_name, &entry.state).await? {
        Some(current) => {
            print_json(&current)?;
            state.put(address, &m.type_name, current);
        }
        None => {
            println!("{address} no longer exists; removed from state");
            state.remove(&address);
        }
    }
    state.save(state_path)
}

async fn import(provider: &AzureProvider, state_path: &Path, type_name: &str, name: &str, id: &str) -> Result<()> {
    let mut state = StateFile::load(state_path)?;
    let address = manifest::address(type_name, name);
    if state.get(&address).is_some() {
        anyhow::bail!("{address} is already managed; remove it from state first");
    }
    let imported = provider.import(type_name, id).await?;
    print_json(&imported)?;
    state.put(address, type_name, imported);
    state.save(state_path)
}

async fn destroy(provider: &AzureProvider, state_path: &Path, m: &Manifest) -> Result<()> {
    let mut state = StateFile::load(state_path)?;
    let address = m.address();
    let Some(entry) = state.remove(&address) else {
        println!("{address} is not in state; nothing to destroy");
        return Ok(());
    };
    provider.delete(&entry.type_name, &entry.state).await?;
    info!(%address, id = %entry.state.id, "destroyed");
    state.save(state_path)
}

async fn data(provider: &AzureProvider, m: &Manifest) -> Result<()> {
    let read = provider.read_data_source(&m.type_name, &m.config).await?;
    let mut out = json!({ "id": read.id });
    for (k, v) in read.attributes {
        out[k] = v;
    }
    print_json(&out)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match &cli.cmd {
        Cmd::Schema { type_name } => schema(type_name.as_deref()),
        Cmd::Validate { file } => {
            let m = Manifest::load(file)?;
            AzureProvider::new().validate(&m.type_name, &m.config)?;
            println!("{} is valid", m.address());
            Ok(())
        }
        Cmd::Plan { file } => {
            let m = Manifest::load(file)?;
            let state = StateFile::load(&cli.state)?;
            let op = plan(&AzureProvider::new(), &state, &m)?;
            print_json(&json!({ "address": m.address(), "plan": op }))
        }
        Cmd::Apply { file } => apply(&connect(&cli)?, &cli.state, &Manifest::load(file)?).await,
        Cmd::Refresh { file } => refresh(&connect(&cli)?, &cli.state, &Manifest::load(file)?).await,
        Cmd::Import { type_name, name, id } => import(&connect(&cli)?, &cli.state, type_name, name, id).await,
        Cmd::Destroy { file } => destroy(&connect(&cli)?, &cli.state, &Manifest::load(file)?).await,
        Cmd::Data { file } => data(&connect(&cli)?, &Manifest::load(file)?).await,
    }
}
