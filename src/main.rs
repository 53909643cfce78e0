//! # DuckDB Loader (`duckdb-loader`)
//!
//! Starts the local web UI.
//!
//! ## Usage
//!
//! ```bash
//! duckdb-loader                          # 127.0.0.1:5000, in-memory database
//! duckdb-loader --port 8080 --debug
//! duckdb-loader --config ./config/loader.toml
//! ```
//!
//! `--host` and `--port` override `[server].bind` from the config file. The
//! host must be a loopback address.

use clap::Parser;
use duckdb_loader::{config, server};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// DuckDB Loader: browse local files, load CSV/Parquet into DuckDB, and
/// query them from the browser.
#[derive(Parser)]
#[command(name = "duckdb-loader", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, default_value = "./config/loader.toml")]
    config: PathBuf,

    /// Loopback address to bind (overrides `[server].bind`).
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind (overrides `[server].bind`).
    #[arg(long)]
    port: Option<u16>,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.debug);

    let mut cfg = config::load_config(&cli.config)?;

    if cli.host.is_some() || cli.port.is_some() {
        let current = cfg.bind_addr()?;
        let addr = SocketAddr::new(
            cli.host.unwrap_or(current.ip()),
            cli.port.unwrap_or(current.port()),
        );
        cfg.server.bind = addr.to_string();
        config::validate(&cfg)?;
    }

    server::run_server(&cfg).await
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "duckdb_loader=debug,tower_http=debug"
    } else {
        "duckdb_loader=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
