mod handlers;
mod server;

use clap::{Args, Parser, Subcommand};
use redlock_core::acquisition::FanOut;
use redlock_core::config::LockConfig;
use redlock_core::types::{Lease, ServerDescriptor};
use redlock_core::{LockError, LockManager};

use crate::handlers::LeaseResponse;

#[derive(Parser)]
#[command(
    name = "redlock",
    about = "redlock: quorum lock over independent key-value stores",
    version
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Store node: "host:port[:timeout_ms[:db]]", "sqlite:<path>" or "memory".
    /// Repeat once per node.
    #[arg(short, long = "server", env = "REDLOCK_SERVERS", value_delimiter = ',', global = true)]
    servers: Vec<ServerDescriptor>,

    /// JSON config file; --server replaces its server list
    #[arg(long, env = "REDLOCK_CONFIG", global = true)]
    config: Option<String>,

    /// Upper bound of the jittered pause between attempts, in milliseconds
    #[arg(long, global = true)]
    retry_delay: Option<u64>,

    /// Number of acquisition attempts
    #[arg(long, global = true)]
    retry_count: Option<u32>,

    /// Contact all nodes concurrently instead of one after the other
    #[arg(long, global = true)]
    parallel: bool,
}

impl StoreArgs {
    fn into_config(self) -> Result<LockConfig, LockError> {
        let mut config = match &self.config {
            Some(path) => LockConfig::from_json_file(path)?,
            None => LockConfig::new(Vec::new()),
        };
        if !self.servers.is_empty() {
            config.servers = self.servers;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay_ms = delay;
        }
        if let Some(count) = self.retry_count {
            config.retry_count = count;
        }
        if self.parallel {
            config.fan_out = FanOut::Parallel;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a lock and print the lease as JSON
    Lock {
        resource: String,

        /// Time-to-live in milliseconds
        #[arg(long, default_value = "10000")]
        ttl: u64,
    },

    /// Release a lock held under the given token
    Unlock { resource: String, token: String },

    /// Start the HTTP lock service
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3200")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Maximum number of requests handled at once
        #[arg(long, default_value = "64")]
        max_in_flight: usize,
    },

    /// Print version information
    Version,
}

fn build_manager(store: StoreArgs) -> Result<LockManager, LockError> {
    let config = store.into_config()?;
    for server in &config.servers {
        tracing::debug!(server = %server, "Configured store node");
    }
    LockManager::from_config(config)
}

#[tokio::main]
async fn main() {
    // stdout carries command output only
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("redlock {}", env!("CARGO_PKG_VERSION"));
        println!("Quorum lock over independent key-value stores");
        return;
    }

    let mut manager = match build_manager(cli.store) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    match cli.command {
        Commands::Lock { resource, ttl } => {
            let result = tokio::task::spawn_blocking(move || manager.lock(&resource, ttl)).await;
            match result {
                Ok(Ok(lease)) => match serde_json::to_string_pretty(&LeaseResponse::from(&lease)) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Failed to encode lease: {}", e);
                        std::process::exit(1);
                    }
                },
                Ok(Err(e)) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Lock task failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Unlock { resource, token } => {
            let lease = Lease::from_parts(resource, token);
            let result = tokio::task::spawn_blocking(move || manager.unlock(&lease)).await;
            if let Err(e) = result {
                eprintln!("Unlock task failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Serve {
            port,
            host,
            max_in_flight,
        } => {
            server::run(&host, port, max_in_flight, manager).await;
        }
        Commands::Version => {}
    }
}
