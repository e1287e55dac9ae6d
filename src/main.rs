//! CLI entry point: sends one request to the Mundipagg API and prints the
//! response envelope as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use mundipagg::{ApiRequest, AuthMode, Configuration, Dispatcher, Envelope, HttpMethod};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::Path;
use std::process::ExitCode;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "mundipagg")]
#[command(about = "Send a request to the Mundipagg API", long_about = None)]
struct Cli {
    /// JSON configuration file (defaults to MUNDIPAGG_* environment variables)
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    #[arg(value_name = "METHOD")]
    method: HttpMethod,

    /// Endpoint path relative to the API URL, e.g. /customers
    #[arg(value_name = "ENDPOINT")]
    endpoint: String,

    /// JSON request body
    #[arg(short, long)]
    body: Option<String>,

    /// Query parameter, repeatable
    #[arg(short, long = "query", value_name = "KEY=VALUE", value_parser = parse_pair)]
    query: Vec<(String, String)>,

    /// Extra request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE", value_parser = parse_pair)]
    header: Vec<(String, String)>,

    /// Credential to authenticate with: sk, amk or token
    #[arg(short, long, default_value = "sk")]
    auth: AuthMode,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw}"))
}

/// Colored stderr output plus a JSON rolling log file.
fn init_logging() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/mundipagg.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("mundipagg.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    file_guard
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let _file_guard = init_logging();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Configuration::load(path)?,
        None => Configuration::from_env()?,
    };
    info!(api_url = %config.api_url, timeout = ?config.timeout, "Configuration loaded");

    let dispatcher = Dispatcher::new(config)?;

    let mut request = ApiRequest::new(cli.method, cli.endpoint)
        .query_map(cli.query)
        .headers(cli.header)
        .auth(cli.auth);
    if let Some(body) = &cli.body {
        let body: Value = serde_json::from_str(body).context("--body is not valid JSON")?;
        request = request.json(&body);
    }

    let envelope: Envelope<Value> = dispatcher.send(request);
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    Ok(if envelope.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
