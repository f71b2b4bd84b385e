use std::io::Write;

use anyhow::{bail, Result};
use clap::Parser;
use env_logger::{Builder, Env};

use grass::client;

/// Command-line arguments for the GRASS client.
#[derive(Parser, Debug)]
#[command(
    name = "client",
    about = "GRASS client.",
    after_help = "With <input-file> and <output-file> the client runs in batch mode."
)]
struct Cli {
    /// Server IP address
    server_ip: String,

    /// Server port
    server_port: u16,

    /// Batch-mode command file
    input_file: Option<String>,

    /// Batch-mode reply file
    output_file: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();

    Builder::from_env(Env::default().default_filter_or("warn"))
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

    match (&args.input_file, &args.output_file) {
        (Some(input), Some(output)) => {
            client::run_batch(&args.server_ip, args.server_port, input, output).await
        }
        (None, None) => client::run_interactive(&args.server_ip, args.server_port).await,
        _ => bail!("Batch mode requires both <input-file> and <output-file>"),
    }
}
