use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{ArgAction, Parser, Subcommand};
use kauma::config::Config;
use kauma::padding_oracle::Server;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "kauma", about = "Batch JSON-driven cryptanalysis core")]
struct Cli {
    /// Increase log verbosity; repeat for more (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a job file of test cases and print the reply stream to stdout.
    Run {
        /// Path to the job file, or "-" to read from stdin.
        job_file: String,
        /// Per-request timeout for `padding_oracle` actions talking to a
        /// remote oracle (spec §5's 10s default, overridable here).
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,
    },
    /// Serve the CBC padding-oracle test server that `padding_oracle`
    /// actions attack (spec C8).
    Serve {
        /// Address to listen on, e.g. "127.0.0.1:4433".
        addr: String,
        /// Base64-encoded 16-byte AES key.
        #[arg(long)]
        key: String,
        /// Base64-encoded candidate secret, repeatable. At least one required.
        #[arg(long = "secret", required = true)]
        secrets: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// `-v`/`--verbose` raises the log level past whatever `RUST_LOG` sets;
/// with neither given, `env_logger`'s own default (warn) applies.
fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { job_file, timeout_ms } => run_job_file(&job_file, timeout_ms),
        Command::Serve { addr, key, secrets } => serve(&addr, &key, &secrets),
    }
}

fn run_job_file(path: &str, timeout_ms: Option<u64>) -> Result<()> {
    let input = if path == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading job file from stdin")?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading job file {path}"))?
    };
    let config = Config {
        oracle_timeout: timeout_ms.map(Duration::from_millis).unwrap_or(Config::default().oracle_timeout),
    };
    let responses = kauma::job::run_job(&input, &config)?;
    let stream = kauma::job::render_reply_stream(&responses)?;
    print!("{stream}");
    Ok(())
}

fn serve(addr: &str, key: &str, secrets: &[String]) -> Result<()> {
    let key: [u8; 16] = STANDARD
        .decode(key)
        .context("decoding --key")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("--key must decode to exactly 16 bytes"))?;
    let secrets = secrets
        .iter()
        .map(|s| STANDARD.decode(s).context("decoding --secret"))
        .collect::<Result<Vec<_>>>()?;

    let server = Server::new(key, secrets)?;
    server.serve(addr)?;
    Ok(())
}
