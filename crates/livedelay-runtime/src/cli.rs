//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "livedelay", about = "Delay a live feed by a chosen window")]
pub struct Cli {
    /// UDS socket path (default: /tmp/livedelay-$USER/livedelay.sock)
    #[arg(long, short = 's', global = true, env = "LIVEDELAY_SOCKET")]
    pub socket_path: Option<String>,

    /// TOML config file (default: $XDG_CONFIG_HOME/livedelay/config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon: read the feed, withhold items, serve the control socket
    Run(RunOpts),
    /// Show delay status
    Status,
    /// Change the delay for items arriving from now on
    SetDelay {
        /// One of the offered delays, in milliseconds
        delay_ms: u64,
    },
    /// Start withholding items
    Start {
        /// Initial delay in milliseconds (default: stored preference)
        #[arg(long)]
        delay: Option<u64>,
    },
    /// Reveal everything pending and stop withholding
    Stop,
    /// List the offered delays
    Choices,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Feed of newline-delimited JSON items; `-` or omitted reads stdin
    #[arg(long)]
    pub feed: Option<PathBuf>,

    /// Initial delay in milliseconds (default: stored preference)
    #[arg(long)]
    pub delay: Option<u64>,

    /// Maximum number of withheld items
    #[arg(long)]
    pub capacity: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_options() {
        let cli = Cli::try_parse_from([
            "livedelay",
            "run",
            "--feed",
            "posts.jsonl",
            "--delay",
            "30000",
            "--capacity",
            "50",
        ])
        .unwrap();
        let Command::Run(opts) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(opts.feed, Some(PathBuf::from("posts.jsonl")));
        assert_eq!(opts.delay, Some(30_000));
        assert_eq!(opts.capacity, Some(50));
    }

    #[test]
    fn global_socket_after_subcommand() {
        let cli = Cli::try_parse_from(["livedelay", "set-delay", "15000", "-s", "/tmp/x.sock"])
            .unwrap();
        assert_eq!(cli.socket_path.as_deref(), Some("/tmp/x.sock"));
        assert!(matches!(cli.command, Command::SetDelay { delay_ms: 15_000 }));
    }

    #[test]
    fn set_delay_requires_value() {
        assert!(Cli::try_parse_from(["livedelay", "set-delay"]).is_err());
    }
}
