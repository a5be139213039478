//! faceid daemon: serves the identity API, runs a dev ledger node, and offers
//! one-shot identity commands against a local data directory.

mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use faceid_engine::{EngineConfig, IdentityResolutionEngine};
use faceid_ledger::{DevLedger, DevLedgerConfig};
use faceid_rpc::ledger_node::serve_ledger;
use faceid_rpc::ApiServer;
use faceid_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment, Migrator};
use faceid_types::{AccountKey, BiometricDescriptor};
use faceid_utils::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "faceid", about = "Biometric identity resolution daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "FACEID_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory holding the LMDB identity store.
    #[arg(long, env = "FACEID_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Number of elements in every descriptor.
    #[arg(long, env = "FACEID_DESCRIPTOR_LEN", global = true)]
    descriptor_len: Option<usize>,

    /// HTTP API port.
    #[arg(long, env = "FACEID_RPC_PORT", global = true)]
    rpc_port: Option<u16>,

    /// Base URL of the ledger node.
    #[arg(long, env = "FACEID_LEDGER_ENDPOINT", global = true)]
    ledger_endpoint: Option<String>,

    /// Run without a ledger; every registration is stored local_only.
    #[arg(long, env = "FACEID_NO_LEDGER", global = true)]
    no_ledger: bool,

    /// Serve Prometheus metrics at /metrics.
    #[arg(long, env = "FACEID_ENABLE_METRICS", global = true)]
    metrics: bool,

    /// Log output: "human" or "json".
    #[arg(long, env = "FACEID_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "FACEID_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the identity HTTP API.
    Serve,
    /// Run an in-memory dev ledger node.
    LedgerNode(LedgerNodeArgs),
    /// Register an account key with a face descriptor.
    Register {
        #[arg(long)]
        account_key: String,
        #[command(flatten)]
        descriptor: DescriptorArgs,
    },
    /// Check a face descriptor against an account key.
    Verify {
        #[arg(long)]
        account_key: String,
        #[command(flatten)]
        descriptor: DescriptorArgs,
    },
    /// Report whether an account key is registered.
    Exists {
        #[arg(long)]
        account_key: String,
    },
    /// Replay local_only registrations to the ledger.
    Sync,
    /// Ledger reachability and local record counts.
    Status,
    /// Check the data directory, schema version and store integrity.
    Check,
    /// Print the effective configuration as TOML.
    ShowConfig,
}

#[derive(Args)]
struct LedgerNodeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8545", env = "FACEID_LEDGER_LISTEN")]
    listen: String,

    /// Cost charged per registration.
    #[arg(long, env = "FACEID_LEDGER_COST")]
    registration_cost: Option<u64>,

    /// Total funds available for registrations.
    #[arg(long, env = "FACEID_LEDGER_BUDGET")]
    budget: Option<u64>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DescriptorArgs {
    /// JSON file holding the descriptor as an array of numbers.
    #[arg(long)]
    descriptor_file: Option<PathBuf>,

    /// Comma-separated descriptor values.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    descriptor: Option<Vec<f32>>,
}

impl DescriptorArgs {
    fn load(&self) -> anyhow::Result<BiometricDescriptor> {
        let values: Vec<f32> = match (&self.descriptor_file, &self.descriptor) {
            (Some(path), _) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| {
                    format!("{} is not a JSON array of numbers", path.display())
                })?
            }
            (None, Some(values)) => values.clone(),
            (None, None) => bail!("either --descriptor or --descriptor-file is required"),
        };
        Ok(BiometricDescriptor::new(values)?)
    }
}

impl Cli {
    /// File config (or defaults), then flag and env overrides.
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_toml_file(&path.to_string_lossy())
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(len) = self.descriptor_len {
            config.descriptor_len = len;
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(endpoint) = &self.ledger_endpoint {
            config.ledger.endpoint = endpoint.clone();
        }
        if self.no_ledger {
            config.ledger.enabled = false;
        }
        if self.metrics {
            config.enable_metrics = true;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.engine_config()?;

    init_logging(config.log_format, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::LedgerNode(args) => ledger_node(args).await,
        Command::Register {
            account_key,
            descriptor,
        } => register(&config, account_key, &descriptor).await,
        Command::Verify {
            account_key,
            descriptor,
        } => verify(&config, account_key, &descriptor).await,
        Command::Exists { account_key } => {
            let engine = open_engine(&config)?;
            let exists = engine.account_exists(&AccountKey::new(account_key.clone())).await?;
            print_json(&json!({ "account_key": account_key, "exists": exists }))
        }
        Command::Sync => {
            let engine = open_engine(&config)?;
            print_json(&engine.sync_pending().await?)
        }
        Command::Status => {
            let engine = open_engine(&config)?;
            print_json(&engine.status().await?)
        }
        Command::Check => check(&config),
        Command::ShowConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn open_engine(config: &EngineConfig) -> anyhow::Result<IdentityResolutionEngine> {
    IdentityResolutionEngine::open(config)
        .with_context(|| format!("failed to open identity store at {}", config.data_dir.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(config: &EngineConfig) -> anyhow::Result<()> {
    let engine = Arc::new(open_engine(config)?);
    let status = engine.status().await?;
    tracing::info!(
        rpc_port = config.rpc_port,
        ledger = if config.ledger.enabled {
            config.ledger.endpoint.as_str()
        } else {
            "off"
        },
        local_records = status.local_records,
        pending_ledger = status.pending_ledger,
        "starting faceid"
    );

    let server = ApiServer::new(config.rpc_port, engine, config.enable_metrics);
    server.start(shutdown::wait_for_signal()).await?;
    tracing::info!("faceid stopped");
    Ok(())
}

async fn ledger_node(args: LedgerNodeArgs) -> anyhow::Result<()> {
    let defaults = DevLedgerConfig::default();
    let ledger_config = DevLedgerConfig {
        registration_cost: args.registration_cost.unwrap_or(defaults.registration_cost),
        budget: args.budget.unwrap_or(defaults.budget),
    };
    tracing::info!(
        registration_cost = ledger_config.registration_cost,
        budget = ledger_config.budget,
        "starting dev ledger node"
    );

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    let ledger = Arc::new(DevLedger::new(ledger_config));
    serve_ledger(listener, ledger, shutdown::wait_for_signal()).await?;
    tracing::info!("dev ledger node stopped");
    Ok(())
}

async fn register(
    config: &EngineConfig,
    account_key: String,
    descriptor: &DescriptorArgs,
) -> anyhow::Result<()> {
    let descriptor = descriptor.load()?;
    let engine = open_engine(config)?;
    let outcome = engine.register(AccountKey::new(account_key), &descriptor).await?;
    let record = &outcome.record;
    print_json(&json!({
        "account_key": record.account_key,
        "account_id": record.account_id,
        "digest": record.digest,
        "registered_on": record.registered_on,
        "registered_at": record.registered_at,
        "confirmed_by": outcome.confirmed_by,
        "ledger_token": record.ledger_token,
    }))
}

async fn verify(
    config: &EngineConfig,
    account_key: String,
    descriptor: &DescriptorArgs,
) -> anyhow::Result<()> {
    let descriptor = descriptor.load()?;
    let engine = open_engine(config)?;
    let outcome = engine.verify(AccountKey::new(account_key), &descriptor).await?;
    print_json(&outcome)
}

fn check(config: &EngineConfig) -> anyhow::Result<()> {
    check_data_dir(&config.data_dir).map_err(anyhow::Error::msg)?;
    let environment = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())?;
    let schema_version = Migrator::schema_version(&environment)?;
    let report = check_integrity(&environment)?;

    print_json(&json!({
        "data_dir": config.data_dir,
        "schema_version": schema_version,
        "databases_checked": report.databases_checked,
        "total_entries": report.total_entries,
        "identities": report.identities,
        "errors": report.errors,
    }))?;

    if !report.is_healthy() {
        bail!("integrity check found {} problem(s)", report.errors.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faceid.toml");
        std::fs::write(
            &path,
            "rpc_port = 9000\ndescriptor_len = 4\n\n[ledger]\nendpoint = \"http://ledger:1\"\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "faceid",
            "--config",
            path.to_str().unwrap(),
            "--rpc-port",
            "9100",
            "status",
        ])
        .unwrap();
        let config = cli.engine_config().unwrap();
        assert_eq!(config.rpc_port, 9100);
        assert_eq!(config.descriptor_len, 4);
        assert_eq!(config.ledger.endpoint, "http://ledger:1");
        assert!(config.ledger.enabled);
    }

    #[test]
    fn no_ledger_flag_disables_ledger() {
        let cli = Cli::try_parse_from(["faceid", "--no-ledger", "status"]).unwrap();
        assert!(!cli.engine_config().unwrap().ledger.enabled);
    }

    #[test]
    fn zero_descriptor_len_is_rejected() {
        let cli = Cli::try_parse_from(["faceid", "--descriptor-len", "0", "status"]).unwrap();
        assert!(cli.engine_config().is_err());
    }

    #[test]
    fn inline_descriptor_parses() {
        let cli = Cli::try_parse_from([
            "faceid",
            "verify",
            "--account-key",
            "a@x.com",
            "--descriptor",
            "-0.5,0.25,1",
        ])
        .unwrap();
        let Command::Verify { descriptor, .. } = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(descriptor.load().unwrap().as_slice(), &[-0.5, 0.25, 1.0]);
    }

    #[test]
    fn descriptor_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.json");
        std::fs::write(&path, "[0.1, 0.2, 0.3]").unwrap();

        let cli = Cli::try_parse_from([
            "faceid",
            "register",
            "--account-key",
            "a@x.com",
            "--descriptor-file",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let Command::Register { descriptor, .. } = cli.command else {
            panic!("expected register");
        };
        assert_eq!(descriptor.load().unwrap().len(), 3);
    }

    #[test]
    fn descriptor_source_is_required() {
        assert!(Cli::try_parse_from(["faceid", "register", "--account-key", "a@x.com"]).is_err());
    }

    #[test]
    fn descriptor_sources_are_exclusive() {
        assert!(Cli::try_parse_from([
            "faceid",
            "register",
            "--account-key",
            "a@x.com",
            "--descriptor",
            "0.1",
            "--descriptor-file",
            "face.json",
        ])
        .is_err());
    }

    #[test]
    fn check_reports_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().join("data"),
            ..EngineConfig::default()
        };
        check(&config).unwrap();
        assert!(config.data_dir.join("data.mdb").exists());
    }
}
