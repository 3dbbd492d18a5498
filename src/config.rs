use std::net::SocketAddr;

use clap::Args;

use crate::application::ServiceConfig;

/// Settings shared by every command, read from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Database file path
    #[arg(long, env = "MINIBANK_DATABASE", default_value = "minibank.db", global = true)]
    pub database: String,

    /// How many times a transaction is recomputed after a concurrent balance change
    #[arg(long, env = "MINIBANK_MAX_RETRIES", default_value_t = 3, global = true)]
    pub max_retries: u32,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "MINIBANK_LOG_JSON", global = true)]
    pub log_json: bool,
}

impl Config {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_retries: self.max_retries,
        }
    }
}

/// Address the HTTP server listens on when none is given.
pub fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
