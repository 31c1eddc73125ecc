//! riskgate - hybrid rule-based risk scoring.
//!
//! `riskgate serve` runs the HTTP endpoint; `riskgate score` scores one
//! payload from a file or stdin and prints the full assessment.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use riskgate_core::{RecordSchema, RuleSet};
use riskgate_runtime::{
    ApiCredential, LlamafileProvider, Oracle, RiskOrchestrator, RuntimeConfig, ORACLE_API_KEY_ENV,
};

mod error;
mod server;

#[derive(Parser)]
#[command(name = "riskgate", version, about = "Hybrid deterministic/oracle risk scoring")]
struct Cli {
    /// Runtime configuration file (YAML or JSON)
    #[arg(short, long, env = "RISKGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Rule store file or directory
    #[arg(long, env = "RISKGATE_RULES", default_value = "rules", global = true)]
    rules: PathBuf,

    /// Record schema (JSON Schema); defaults to the built-in transaction schema
    #[arg(long, env = "RISKGATE_SCHEMA", global = true)]
    schema: Option<PathBuf>,

    /// Completion endpoint, overriding the config file
    #[arg(long, env = "RISKGATE_ORACLE_URL", global = true)]
    oracle_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "RISKGATE_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP scoring endpoint
    Serve {
        #[arg(long, env = "RISKGATE_HOST", default_value = "127.0.0.1")]
        host: IpAddr,

        #[arg(short, long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Score one payload and print the assessment as JSON
    Score {
        /// Payload file; stdin when omitted or `-`
        input: Option<PathBuf>,

        /// Print only the verdict
        #[arg(long)]
        verdict_only: bool,

        /// Evaluate time-based rules as of this RFC 3339 instant
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let orchestrator = Arc::new(build_orchestrator(&cli)?);

    match cli.command {
        Commands::Serve { host, port } => {
            if !orchestrator.oracle().health_check().await {
                tracing::warn!("Oracle health check failed; prose rules will error until it is reachable");
            }
            server::serve(server::AppState { orchestrator }, SocketAddr::new(host, port)).await
        }
        Commands::Score {
            input,
            verdict_only,
            at,
        } => {
            let data = read_payload(input.as_deref())?;
            let now = at.unwrap_or_else(Utc::now);
            let assessment = orchestrator.score_at(data, now).await?;

            let output = if verdict_only {
                serde_json::to_string_pretty(&assessment.verdict)?
            } else {
                serde_json::to_string_pretty(&assessment)?
            };
            println!("{}", output);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "riskgate=info,tower_http=info".into());

    // Logs go to stderr so `score` output stays pipeable.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Load rules, schema and config; any failure here is fatal.
fn build_orchestrator(cli: &Cli) -> anyhow::Result<RiskOrchestrator> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(url) = &cli.oracle_url {
        config.oracle.endpoint = url.clone();
        config.validate()?;
    }

    let rules = RuleSet::from_path(&cli.rules)
        .with_context(|| format!("Failed to load rules from {}", cli.rules.display()))?;
    let schema = match &cli.schema {
        Some(path) => RecordSchema::from_file(path)
            .with_context(|| format!("Failed to load schema {}", path.display()))?,
        None => RecordSchema::transaction()?,
    };

    let credential = ApiCredential::resolve(config.oracle.api_key.as_ref(), ORACLE_API_KEY_ENV);
    if let Some(credential) = &credential {
        tracing::info!(source = %credential.source(), "Oracle API key loaded");
    }
    let provider = LlamafileProvider::new(config.oracle.endpoint.clone(), config.oracle.timeout)?
        .with_credential(credential);
    let oracle = Oracle::new(Arc::new(provider), &config.oracle);
    let strategy = config.evaluation.strategy;

    let orchestrator = RiskOrchestrator::builder()
        .rules(Arc::new(rules))
        .schema(Arc::new(schema))
        .oracle(Arc::new(oracle))
        .config(config.evaluation)
        .build()?;

    tracing::info!(
        rules = orchestrator.rules().len(),
        provider = orchestrator.oracle().provider_name(),
        endpoint = %config.oracle.endpoint,
        %strategy,
        "Configuration loaded"
    );
    Ok(orchestrator)
}

fn read_payload(input: Option<&Path>) -> anyhow::Result<serde_json::Value> {
    let text = match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("Payload is not valid JSON")
}
