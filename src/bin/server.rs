use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};

use grass::config::Config;
use grass::server;

/// Command-line arguments for the GRASS server.
#[derive(Parser, Debug)]
#[command(name = "server", about = "GRASS file server.")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "grass.conf")]
    config: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();

    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let config = Config::parse_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration file: {}", args.config))?;

    server::run(config).await
}
