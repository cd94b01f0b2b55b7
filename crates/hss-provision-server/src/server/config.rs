use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use core::time::Duration;
use hss_provision::MAX_PAGE_SIZE;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Subscriber store backing the service.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local maps. Everything is lost on exit.
    Memory,
    /// A SQLite database file.
    Sqlite,
}

/// Runtime configuration for the `hss-provision-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hss-provision-server",
    version,
    about = "An HTTP service for bulk IMSI/MSISDN subscriber provisioning"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Example: "0.0.0.0:8080"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Subscriber store backend.
    ///
    /// Environment variable: `STORE_BACKEND`
    #[arg(long, env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::Sqlite)]
    pub store: StoreBackend,

    /// Path of the SQLite database. Ignored by the memory backend. Use
    /// `:memory:` for a throwaway database.
    ///
    /// Environment variable: `SQLITE_PATH`
    #[arg(long, env = "SQLITE_PATH", default_value = "subscribers.db")]
    pub sqlite_path: PathBuf,

    /// Deadline for each store round-trip, in milliseconds. A batch whose
    /// existence check or bulk insert exceeds it fails with 504.
    ///
    /// Environment variable: `STORE_TIMEOUT_MS`
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 10_000)]
    pub store_timeout_ms: u64,

    /// Page size used by the list endpoint when the caller gives no `limit`.
    ///
    /// Environment variable: `DEFAULT_PAGE_SIZE`
    #[arg(long, env = "DEFAULT_PAGE_SIZE", default_value_t = 100)]
    pub default_page_size: usize,

    /// Allow cross-origin requests from any origin.
    ///
    /// Environment variable: `ENABLE_CORS`
    #[arg(long, env = "ENABLE_CORS", default_value_t = false)]
    pub cors: bool,

    /// Emit logs as JSON lines instead of human-readable output.
    ///
    /// Environment variable: `LOG_JSON`
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    /// Seconds to wait for in-flight requests after a shutdown signal.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub store: StoreBackend,
    pub sqlite_path: PathBuf,
    pub store_timeout: Duration,
    pub default_page_size: usize,
    pub cors: bool,
    pub log_json: bool,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let server_addr = args
            .server_addr
            .parse()
            .with_context(|| format!("SERVER_ADDR ({}) is not a socket address", args.server_addr))?;

        if args.store_timeout_ms == 0 {
            bail!("STORE_TIMEOUT_MS must be greater than 0");
        }

        if args.default_page_size == 0 || args.default_page_size > MAX_PAGE_SIZE {
            bail!(
                "DEFAULT_PAGE_SIZE ({}) must be between 1 and {}",
                args.default_page_size,
                MAX_PAGE_SIZE
            );
        }

        if args.store == StoreBackend::Sqlite && args.sqlite_path.as_os_str().is_empty() {
            bail!("SQLITE_PATH must not be empty when STORE_BACKEND is sqlite");
        }

        Ok(Self {
            server_addr,
            store: args.store,
            sqlite_path: args.sqlite_path,
            store_timeout: Duration::from_millis(args.store_timeout_ms),
            default_page_size: args.default_page_size,
            cors: args.cors,
            log_json: args.log_json,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}
