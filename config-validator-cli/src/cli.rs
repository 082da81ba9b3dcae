use std::io::{self, Read, Write};
use std::net::IpAddr;

use clap::{ArgAction, Parser, ValueEnum};
use config_validator::{ValidationOutcome, output};
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT, ServerConfig};

/// Exit code when the input could not be validated at all.
pub const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "config-validator")]
#[command(about = "Validate Ignition configs, cloud-configs and scripts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Validate a config read from stdin instead of starting the server
    #[arg(long)]
    pub parse_stdin: bool,

    /// How `--parse-stdin` reports its result
    #[arg(long, value_enum, default_value_t = OutputFormat::Log)]
    pub format: OutputFormat,

    /// Verbosity level (-v for request logs, -vv for request and response bodies)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Largest accepted request body, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Log lines on stderr
    Log,
    /// Findings and a summary on stdout
    Human,
    /// The full outcome as JSON on stdout
    Json,
}

impl Cli {
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            address: self.address,
            port: self.port,
            max_body_bytes: self.max_body_bytes,
            verbose: self.verbose,
            ..ServerConfig::default()
        }
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 | 1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
    if let Err(err) = installed {
        tracing::debug!("Keeping the existing tracing subscriber: {err}");
    }
}

/// Run the command line: validate stdin or serve HTTP. Returns the process
/// exit code.
///
/// # Errors
///
/// Returns an error if the server cannot start or stops with a failure.
pub async fn run(cli: &Cli) -> anyhow::Result<u8> {
    init_tracing(cli.verbose);

    if cli.parse_stdin {
        let code = check_input(io::stdin().lock(), cli.format, &mut io::stdout().lock());
        return Ok(code);
    }

    crate::server::serve(cli.server_config()).await?;
    Ok(0)
}

/// Validate everything `reader` yields and report it in `format`.
///
/// Returns `0` for a config with no findings, `1` when findings were reported
/// and [`EXIT_FATAL`] when validation itself failed.
#[must_use]
pub fn check_input<R: Read>(reader: R, format: OutputFormat, out: &mut dyn Write) -> u8 {
    let outcome = match config_validator::validate_reader(reader) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!("Fatal error parsing: {err}");
            return EXIT_FATAL;
        }
    };

    if let Err(err) = report(&outcome, format, out) {
        tracing::error!("Failed to write report: {err:#}");
        return EXIT_FATAL;
    }
    outcome.exit_code()
}

fn report(
    outcome: &ValidationOutcome,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Log => {
            if outcome.is_valid() {
                tracing::info!("Config file looks good");
            }
            for entry in outcome.report.entries() {
                tracing::error!(
                    "Failed to validate config: {}",
                    entry.format_human_readable()
                );
            }
            Ok(())
        }
        OutputFormat::Human => output::write_human(outcome, out),
        OutputFormat::Json => output::write_json(outcome, out),
    }
}
