mod cli;
mod error;
mod serve;

use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use netconfd_config::load_config;

use crate::cli::{Cli, Command, ConfigCommand};
use crate::error::CliError;
use crate::serve::Services;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _guard = init_tracing(cli.global.verbose, cli.global.log_file.as_deref());

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs never go to stdout: in stdio mode it carries the protocol.
fn init_tracing(verbosity: u8, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file = log_file.and_then(|path| {
        let name = path.file_name()?;
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        Some(tracing_appender::rolling::never(dir, name))
    });

    match file {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.global.config.as_deref())?;

    match cli.command {
        Command::Config(ConfigCommand::Show) => {
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "netconfd", &mut std::io::stdout());
            Ok(())
        }

        Command::Serve(args) => {
            let mut config = config;
            if let Some(port) = args.port {
                config.listen.port = port;
            }
            serve::check_bind(&config, args.allow_remote)?;
            let services = Services::build(&config).await?;
            serve::serve_tcp(&config, &services).await
        }

        Command::Stdio(args) => {
            let user = args.user.unwrap_or_else(|| config.session.user.clone());
            let services = Services::build(&config).await?;
            serve::serve_stdio(&services, user).await
        }
    }
}
