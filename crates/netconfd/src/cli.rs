//! Clap derive structures for the `netconfd` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// netconfd -- NETCONF server for RESTCONF-backed devices
#[derive(Debug, Parser)]
#[command(
    name = "netconfd",
    version,
    about = "Serve NETCONF in front of a device configuration datastore",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file
    #[arg(long, short = 'c', env = "NETCONFD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Listen for NETCONF sessions on plain TCP (testing only)
    ///
    /// Peers are not authenticated: every connection runs as `session.user`.
    /// Production deployments run `netconfd stdio` as an sshd subsystem.
    Serve(ServeArgs),

    /// Run one session over stdin/stdout (sshd subsystem mode)
    Stdio(StdioArgs),

    /// Inspect the effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen port (overrides `listen.port`)
    #[arg(long)]
    pub port: Option<u16>,

    /// Allow listening on a non-loopback address
    #[arg(long)]
    pub allow_remote: bool,
}

#[derive(Debug, Args)]
pub struct StdioArgs {
    /// Authenticated user, as reported by the SSH server
    #[arg(long, env = "USER")]
    pub user: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets redacted
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
