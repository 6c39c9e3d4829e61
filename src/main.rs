//! revit-mcp-bridge: MCP server that relays tool calls to a running Revit
//! session.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use revit_mcp_bridge::config::{self, Config, TransportMode};
use revit_mcp_bridge::export::ExportCapabilities;
use revit_mcp_bridge::host::memory::{DocumentSnapshot, MemoryDocument, StaticSession};
use revit_mcp_bridge::mcp::{self, Lifecycle, McpServer};
use revit_mcp_bridge::relay::RelayClient;
use revit_mcp_bridge::routes::{self, Dispatcher};

/// MCP server that relays tool calls to a running Revit session.
///
/// Each tool call becomes one HTTP call against the route listener inside
/// Revit. With --serve-snapshot, this process hosts those routes itself for
/// a document snapshot instead.
#[derive(Parser, Debug)]
#[command(name = "revit-mcp-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// MCP transport
    #[arg(long, value_enum, env = "MCP_TRANSPORT")]
    transport: Option<TransportMode>,

    /// Bind address for the HTTP transport
    #[arg(long, env = "MCP_HOST")]
    host: Option<String>,

    /// Bind port for the HTTP transport
    #[arg(long, env = "MCP_PORT")]
    port: Option<u16>,

    /// Base URL of the Revit route listener, e.g. http://localhost:48884/revit_mcp
    #[arg(long, env = "REVIT_MCP_URL")]
    revit_url: Option<String>,

    /// Serve the Revit routes for a JSON document snapshot instead of running
    /// the MCP server
    #[arg(long, value_name = "SNAPSHOT_FILE")]
    serve_snapshot: Option<PathBuf>,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Applies CLI overrides on top of the file configuration.
fn apply_overrides(cfg: &mut Config, args: &Args) {
    if let Some(mode) = args.transport {
        cfg.transport.mode = mode;
    }
    if let Some(ref host) = args.host {
        cfg.transport.host.clone_from(host);
    }
    if let Some(port) = args.port {
        cfg.transport.port = port;
    }
}

fn build_relay(cfg: &Config, url_override: Option<&str>) -> Result<RelayClient, String> {
    let relay = match url_override {
        Some(url) => RelayClient::new(url).map(|client| {
            client.with_timeouts(
                Duration::from_secs(cfg.revit.timeout_secs),
                Duration::from_secs(cfg.revit.export_timeout_secs),
                Duration::from_secs(cfg.revit.status_timeout_secs),
            )
        }),
        None => RelayClient::from_config(&cfg.revit),
    };
    relay.map_err(|e| e.to_string())
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, String> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| format!("Cannot resolve {host}:{port}: {e}"))?
        .next()
        .ok_or_else(|| format!("No address for {host}:{port}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Shutdown requested");
}

async fn run_mcp(cfg: Config, relay: RelayClient) -> Result<(), String> {
    info!(revit = %relay.base_url(), mode = ?cfg.transport.mode, "Starting MCP server");

    match cfg.transport.mode {
        TransportMode::Stdio => {
            let server = McpServer::new(relay, Lifecycle::Strict);
            info!("MCP server ready, waiting for client connection...");
            server.run_stdio().await.map_err(|e| e.to_string())
        }
        TransportMode::Http => {
            let server = Arc::new(McpServer::new(relay, Lifecycle::Stateless));
            let addr = resolve(&cfg.transport.host, cfg.transport.port).await?;
            mcp::http::serve(server, addr, shutdown_signal())
                .await
                .map_err(|e| e.to_string())
        }
    }
}

async fn run_snapshot_host(cfg: Config, snapshot: &Path) -> Result<(), String> {
    let snapshot = DocumentSnapshot::load(snapshot).map_err(|e| e.to_string())?;
    info!(title = %snapshot.title, sheets = snapshot.sheets.len(), "Loaded document snapshot");

    let session = StaticSession::with_document(
        Arc::new(MemoryDocument::from_snapshot(snapshot)),
        ExportCapabilities::full(),
    );
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(session),
        &cfg.export.selector_settings(),
    ));

    let addr = resolve(&cfg.revit.host, cfg.revit.port).await?;
    routes::http::serve(dispatcher, &cfg.revit.base_path, addr, shutdown_signal())
        .await
        .map_err(|e| e.to_string())
}

/// Entry point for the revit-mcp-bridge server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            eprintln!("See config/example-config.json for the expected format");
            return ExitCode::FAILURE;
        }
    };
    apply_overrides(&mut cfg, &args);
    if let Err(e) = cfg.validate() {
        eprintln!("Configuration error: {e}");
        return ExitCode::FAILURE;
    }

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting revit-mcp-bridge");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    let result = match args.serve_snapshot {
        Some(ref snapshot) => runtime.block_on(run_snapshot_host(cfg, snapshot)),
        None => match build_relay(&cfg, args.revit_url.as_deref()) {
            Ok(relay) => runtime.block_on(run_mcp(cfg, relay)),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(0, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(2, false, "warn"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "INFO"), Level::INFO);
        assert_eq!(get_log_level(0, false, "loud"), Level::WARN);
    }

    #[test]
    fn cli_overrides_config() {
        let args = Args::parse_from([
            "revit-mcp-bridge",
            "--transport",
            "http",
            "--host",
            "127.0.0.1",
            "--port",
            "9100",
        ]);
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, &args);
        assert_eq!(cfg.transport.mode, TransportMode::Http);
        assert_eq!(cfg.transport.host, "127.0.0.1");
        assert_eq!(cfg.transport.port, 9100);
    }

    #[test]
    fn relay_url_override() {
        let cfg = Config::default();
        let relay = build_relay(&cfg, Some("http://10.1.1.1:48884/revit_mcp")).unwrap();
        assert_eq!(relay.base_url().host_str(), Some("10.1.1.1"));
        assert!(build_relay(&cfg, Some("nope")).is_err());
    }
}
