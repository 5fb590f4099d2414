//! remotefs-proxy - Entry Point
//!
//! Serves single read and write requests against FTP, FTPS and SFTP stores
//! from the command line.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use tokio::io::AsyncWriteExt;

use remotefs_proxy::config::GatewayConfig;
use remotefs_proxy::connection::{BasicCredentials, RequestContext};
use remotefs_proxy::error::{GatewayError, error_to_http_status, handle_error};
use remotefs_proxy::gateway::{Envelope, Gateway, GetOutcome, GetRequest, PutRequest};
use remotefs_proxy::utils::logging::init_logging;

/// Unified access to FTP, FTPS and SFTP stores
#[derive(Parser, Debug)]
#[command(name = "remotefs-proxy")]
#[command(about = "Read and write files on FTP, FTPS and SFTP servers")]
struct Args {
    /// Username, overriding the configured one
    #[arg(long, global = true, requires = "password")]
    user: Option<String>,

    /// Password, overriding the configured one
    #[arg(long, global = true, requires = "user")]
    password: Option<String>,

    /// Request parameter as NAME=VALUE, e.g. an endpoint url
    #[arg(long = "query", global = true, value_parser = parse_query)]
    query: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory recursively or download a file
    Get {
        path: String,

        /// Rename the file here after reading it
        #[arg(long)]
        move_to: Option<String>,

        #[arg(long)]
        ignore_move_to_errors: bool,

        /// Print an empty listing for missing paths
        #[arg(long = "ignore-404-errors")]
        ignore_404_errors: bool,

        /// Write a downloaded file here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download a file from the endpoint named by a variable
    Fetch {
        variable: String,

        #[arg(long)]
        fpath: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a file
    Put {
        path: String,

        #[arg(long)]
        mimetype: String,

        #[arg(short, long)]
        input: PathBuf,
    },
}

fn parse_query(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {}", value))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match GatewayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.loglevel);
    info!(
        "Running on {}://{}@{} with loglevel={}",
        config.protocol.as_deref().unwrap_or("-"),
        config.username.as_deref().unwrap_or("-"),
        config.hostname.as_deref().unwrap_or("-"),
        config.loglevel
    );

    let mut context = RequestContext::default();
    if let (Some(user), Some(password)) = (args.user, args.password) {
        context = context.with_credentials(BasicCredentials::new(user, password));
    }
    for (name, value) in args.query {
        context = context.with_query(name, value);
    }

    let gateway = Gateway::from_config(&config);
    match run(&gateway, args.command, &context).await {
        Ok(code) => code,
        Err(e) => {
            handle_error(&e);
            println!("{}", Envelope::from(&e).to_json());
            ExitCode::from(exit_status(error_to_http_status(&e)))
        }
    }
}

async fn run(
    gateway: &Gateway,
    command: Command,
    context: &RequestContext,
) -> Result<ExitCode, GatewayError> {
    match command {
        Command::Get {
            path,
            move_to,
            ignore_move_to_errors,
            ignore_404_errors,
            output,
        } => {
            let request = GetRequest {
                path,
                move_to,
                ignore_move_to_errors,
                ignore_404_errors,
            };
            let outcome = gateway.get(&request, context).await?;
            emit(outcome, output).await
        }
        Command::Fetch {
            variable,
            fpath,
            output,
        } => {
            let outcome = gateway.fetch_file(&variable, &fpath, context).await?;
            emit(outcome, output).await
        }
        Command::Put {
            path,
            mimetype,
            input,
        } => {
            let body = tokio::fs::read(&input).await.map_err(|e| {
                GatewayError::BadRequest(format!("cannot read {}: {}", input.display(), e))
            })?;
            let envelope = gateway
                .put(&PutRequest { path, mimetype, body }, context)
                .await?;
            println!("{}", envelope.to_json());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn emit(outcome: GetOutcome, output: Option<PathBuf>) -> Result<ExitCode, GatewayError> {
    let status = outcome.status();
    match outcome {
        GetOutcome::Listing(entries) => {
            let json = serde_json::to_string(&entries)
                .map_err(|e| GatewayError::BadRequest(e.to_string()))?;
            println!("{}", json);
        }
        GetOutcome::Empty => println!("[]"),
        GetOutcome::NotFound => println!("{}", Envelope::not_found().to_json()),
        GetOutcome::Attachment { filename, content } => {
            let written = match &output {
                Some(path) => tokio::fs::write(path, &content).await,
                None => {
                    let mut stdout = tokio::io::stdout();
                    match stdout.write_all(&content).await {
                        Ok(()) => stdout.flush().await,
                        Err(e) => Err(e),
                    }
                }
            };
            if let Err(e) = written {
                error!("Writing {} failed: {}", filename, e);
                return Ok(ExitCode::FAILURE);
            }
            info!("Served {} ({} bytes)", filename, content.len());
        }
    }
    Ok(ExitCode::from(exit_status(status)))
}

/// Process exit code for an HTTP-style status
fn exit_status(status: u16) -> u8 {
    match status {
        200..=299 => 0,
        400..=499 => 2,
        _ => 1,
    }
}
