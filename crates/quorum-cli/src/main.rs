//! Quorum CLI - run operation batches against a seeded in-memory store.
//!
//! # Settings
//!
//! `QUORUM_*` variables beat `-C <dir>/.quorum/config.toml`, which beats
//! the global file (`--config`, default `~/.quorum/config.toml`). See
//! `quorum_runtime::config` for the variable table. `--print-config` shows
//! the merged result.
//!
//! # Input
//!
//! A batch is read from `--file` (`-` for stdin), or built from a single
//! operation name and JSON arguments given on the command line:
//!
//! ```text
//! quorum --seed seed.json --token ana-token survey '{"id": "…"}'
//! quorum --seed seed.json --token ana-token --file batch.json
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use quorum_event::{MutationEvent, SubscriptionFilter};
use quorum_runtime::bus::{LocalBus, NotificationBus};
use quorum_runtime::config::{ConfigLoader, QuorumConfig};
use quorum_runtime::store::{InMemoryStore, Snapshot};
use quorum_runtime::{
    standard_registry, BatchResponse, ContextBuilder, OperationBatch, OperationCall, Orchestrator,
    RequestMeta, StaticVerifier,
};
use quorum_types::IdentityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Quorum CLI - survey data access from the command line
#[derive(Parser, Debug)]
#[command(name = "quorum")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding `.quorum/config.toml` (defaults to the working directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Global config file (defaults to ~/.quorum/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seed file: a store snapshot plus a token table
    #[arg(short, long, value_name = "PATH")]
    seed: Option<PathBuf>,

    /// Bearer token: a session token from the seed, or a `qk_` API key
    #[arg(short, long)]
    token: Option<String>,

    /// Batch file (`-` reads stdin)
    #[arg(short, long, value_name = "PATH", conflicts_with = "operation")]
    file: Option<PathBuf>,

    /// Print the mutation events the batch produced
    #[arg(long)]
    events: bool,

    /// Print the merged configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Operation name, followed by its JSON arguments
    operation: Option<String>,

    /// Operation arguments as JSON (defaults to `{}`)
    #[arg(requires = "operation")]
    arguments: Option<String>,
}

/// Where the settings come from for this invocation.
struct CliConfigResolver {
    project_root: PathBuf,
    global_config: Option<PathBuf>,
    skip_env: bool,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        let project_root = args.project.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "no working directory; reading config from '.'");
                PathBuf::from(".")
            })
        });
        Self {
            project_root,
            global_config: args.config.clone(),
            skip_env: false,
        }
    }

    fn resolve(&self) -> Result<QuorumConfig> {
        let mut loader = ConfigLoader::new().with_project_root(&self.project_root);
        if let Some(ref path) = self.global_config {
            loader = loader.with_global_config(path);
        }
        if self.skip_env {
            loader = loader.skip_env_vars();
        }
        loader.load().context("Config error")
    }
}

/// Seed file layout: every snapshot table plus `tokens`, mapping session
/// tokens to identity ids.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeedFile {
    #[serde(flatten)]
    snapshot: Snapshot,
    tokens: BTreeMap<String, IdentityId>,
}

impl SeedFile {
    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read seed file {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("invalid seed file {}", path.display()))
    }
}

/// Accepts `{"operations": [..]}`, a bare array of calls, or one call.
fn parse_batch(input: &str) -> Result<OperationBatch> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Input {
        Batch(OperationBatch),
        Calls(Vec<OperationCall>),
        Call(OperationCall),
    }

    let batch = match serde_json::from_str(input).context("batch is not valid JSON")? {
        Input::Batch(batch) => batch,
        Input::Calls(operations) => OperationBatch { operations },
        Input::Call(call) => OperationBatch::single(call),
    };
    if batch.operations.is_empty() {
        bail!("batch has no operations");
    }
    Ok(batch)
}

fn read_batch(args: &Args) -> Result<OperationBatch> {
    if let Some(ref path) = args.file {
        let input = if path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("cannot read stdin")?;
            buf
        } else {
            std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?
        };
        return parse_batch(&input);
    }

    let Some(ref name) = args.operation else {
        bail!("nothing to run: pass an operation name or --file");
    };
    let arguments: Value = match args.arguments.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("arguments are not valid JSON")?,
        None => Value::Object(serde_json::Map::new()),
    };
    Ok(OperationBatch::single(OperationCall::new(name.clone(), arguments)))
}

#[derive(Serialize)]
struct Output {
    #[serde(flatten)]
    response: BatchResponse,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<MutationEvent>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Filter: --debug > --verbose > RUST_LOG env > default "warn".
    // Logs go to stderr so stdout stays valid JSON.
    let filter = if args.debug {
        EnvFilter::new("debug,tokio=warn")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();

    let resolver = CliConfigResolver::from_args(&args);
    let config = resolver.resolve()?;
    info!(path = %resolver.project_root.display(), "Project root");

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let batch = read_batch(&args)?;

    let store = Arc::new(InMemoryStore::new());
    let mut verifier = StaticVerifier::new();
    if let Some(ref path) = args.seed {
        let seed = SeedFile::read(path)?;
        let loaded = seed
            .snapshot
            .load_into(store.as_ref())
            .await
            .context("seed violates a store constraint")?;
        for (token, identity) in seed.tokens {
            verifier.insert(token, identity);
        }
        info!(records = loaded, path = %path.display(), "Seed loaded");
    }

    let matrix = config.role_matrix()?;
    let bus = Arc::new(LocalBus::from_config(&config.bus));
    let contexts = ContextBuilder::new(store, Arc::new(matrix), Arc::new(verifier), Arc::new(config));
    let orchestrator = Orchestrator::new(standard_registry()?, contexts)
        .with_bus(Arc::clone(&bus) as Arc<dyn NotificationBus>);

    let meta = match args.token {
        Some(ref token) => RequestMeta::new().with_bearer(token.clone()),
        None => RequestMeta::new(),
    };

    let mut subscription = if args.events {
        match orchestrator.subscribe(meta.clone(), SubscriptionFilter::new()).await {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                tracing::warn!(code = %err.code, message = %err.message, "cannot subscribe to events");
                None
            }
        }
    } else {
        None
    };

    let response = orchestrator.execute(meta, batch).await;
    let failed = !response.is_ok();

    let mut events = Vec::new();
    if let Some(ref mut subscription) = subscription {
        while let Some(event) = subscription.try_recv() {
            events.push(event);
        }
    }

    println!("{}", serde_json::to_string_pretty(&Output { response, events })?);
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_in(dir: &Path) -> CliConfigResolver {
        CliConfigResolver {
            project_root: dir.to_path_buf(),
            global_config: Some(dir.join("missing-global.toml")),
            skip_env: true,
        }
    }

    #[test]
    fn resolve_defaults_without_files() {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        let config = resolver_in(tmp.path()).resolve().expect("resolve should succeed");
        assert_eq!(config, QuorumConfig::default());
    }

    #[test]
    fn resolve_reads_project_config() {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        let dir = tmp.path().join(".quorum");
        std::fs::create_dir_all(&dir).expect("should create config dir");
        std::fs::write(dir.join("config.toml"), "[pagination]\nmax_limit = 25\n")
            .expect("should write project config");

        let config = resolver_in(tmp.path()).resolve().expect("resolve should succeed");
        assert_eq!(config.pagination.max_limit, 25);
    }

    #[test]
    fn resolve_rejects_cross_tenant_below_system() {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        let dir = tmp.path().join(".quorum");
        std::fs::create_dir_all(&dir).expect("should create config dir");
        std::fs::write(dir.join("config.toml"), "[roles]\nANALYST = [\"tenant:cross\"]\n")
            .expect("should write project config");

        assert!(resolver_in(tmp.path()).resolve().is_err());
    }

    #[test]
    fn batch_shapes() {
        let full = parse_batch(r#"{"operations": [{"name": "me"}, {"name": "tenants", "alias": "t"}]}"#)
            .expect("full batch");
        assert_eq!(full.operations.len(), 2);
        assert_eq!(full.operations[1].key(), "t");

        let bare = parse_batch(r#"[{"name": "me"}]"#).expect("bare array");
        assert_eq!(bare.operations[0].name, "me");

        let one = parse_batch(r#"{"name": "survey", "args": {"id": "x"}}"#).expect("single call");
        assert_eq!(one.operations[0].args["id"], "x");

        assert!(parse_batch("[]").is_err());
        assert!(parse_batch("not json").is_err());
    }

    #[test]
    fn seed_file_with_tokens() {
        let tenant = quorum_types::Tenant::new("Acme");
        let identity =
            quorum_types::Identity::new("ana@acme.io", quorum_types::Role::Analyst, Some(tenant.id));
        let json = serde_json::json!({
            "tenants": [tenant],
            "identities": [identity],
            "tokens": { "ana-token": identity.id },
        });
        let seed: SeedFile = serde_json::from_value(json).expect("seed should parse");
        assert_eq!(seed.snapshot.tenants.len(), 1);
        assert_eq!(seed.tokens["ana-token"], identity.id);
    }
}
