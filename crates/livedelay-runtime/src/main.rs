//! livedelay: withhold live feed items for a chosen window, then reveal them.
//!
//! `run` hosts the delay driver and control socket; the other subcommands
//! are thin JSON-RPC clients.

use clap::Parser;

mod cli;
mod client;
mod config;
mod daemon;
mod driver;
mod feed;
mod preference;
mod scheduler;
mod server;
mod sink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Run(opts) => {
            let filter = std::env::var("LIVEDELAY_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            // stdout carries presentation events
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .with_writer(std::io::stderr)
                .init();

            let config = config::RuntimeConfig::load(args.config.as_deref())?
                .with_socket_path(args.socket_path)
                .with_capacity(opts.capacity);
            tracing::info!("livedelay starting (capacity {})", config.capacity);
            daemon::run_daemon(opts, config).await?;
        }
        cli::Command::Status => {
            let socket_path = socket_path(args.socket_path, args.config.as_deref())?;
            client::cmd_status(&socket_path).await?;
        }
        cli::Command::SetDelay { delay_ms } => {
            let socket_path = socket_path(args.socket_path, args.config.as_deref())?;
            client::cmd_set_delay(&socket_path, delay_ms).await?;
        }
        cli::Command::Start { delay } => {
            let socket_path = socket_path(args.socket_path, args.config.as_deref())?;
            client::cmd_start(&socket_path, delay).await?;
        }
        cli::Command::Stop => {
            let socket_path = socket_path(args.socket_path, args.config.as_deref())?;
            client::cmd_stop(&socket_path).await?;
        }
        cli::Command::Choices => client::cmd_choices(),
    }

    Ok(())
}

fn socket_path(
    flag: Option<String>,
    config_path: Option<&std::path::Path>,
) -> anyhow::Result<String> {
    if let Some(path) = flag {
        return Ok(path);
    }
    Ok(config::RuntimeConfig::load(config_path)?.socket_path)
}
