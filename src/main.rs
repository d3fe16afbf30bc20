//! `exchange`: run one HTTP exchange and print its event sequence.
//!
//! # Output
//! ```text
//! stderr: one line per event (upload progress, response head)
//! stdout: the response body
//! ```
//! With `--json`, event lines are JSON objects instead of text.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use futures_util::StreamExt;
use http::{HeaderName, HeaderValue, Method, Request};
use serde_json::json;

use exchange_pipeline::config::{load_config, PipelineConfig};
use exchange_pipeline::observability::logging::init_logging;
use exchange_pipeline::transport::RuntimePool;
use exchange_pipeline::{Client, ExchangeError, ExchangeEvent, ResponseHead};

#[derive(Parser)]
#[command(name = "exchange")]
#[command(about = "Run one HTTP exchange and print its event sequence", long_about = None)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request body.
    #[arg(short, long)]
    data: Option<String>,

    /// Extra request header, `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Print events as JSON lines.
    #[arg(long)]
    json: bool,

    /// Absolute `http://` URL.
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    init_logging(&config.observability);

    tracing::debug!(
        request_timeout_secs = config.transport.request_timeout_secs,
        worker_threads = config.runtime.worker_threads,
        "Configuration loaded"
    );

    let request = build_request(&cli)?;
    let pool = Arc::new(RuntimePool::new(config.runtime.clone()));
    let client = Client::with_hyper(&config, pool.clone());

    let result = run(&client, request, &config, cli.json).await;
    pool.shutdown();
    result
}

fn build_request(cli: &Cli) -> Result<Request<Bytes>, Box<dyn std::error::Error>> {
    let method = Method::from_bytes(cli.method.to_uppercase().as_bytes())?;
    let mut builder = Request::builder().method(method).uri(cli.url.as_str());
    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("invalid header '{}', expected 'Name: value'", header))?;
        builder = builder.header(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    let body = cli.data.clone().map(Bytes::from).unwrap_or_default();
    Ok(builder.body(body)?)
}

async fn run(
    client: &Client,
    request: Request<Bytes>,
    config: &PipelineConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = client.execute(request);
    let mut downloaded = false;

    while let Some(event) = events.next().await {
        match event? {
            ExchangeEvent::Upload(byte_count) => {
                if json {
                    eprintln!("{}", json!({ "event": "upload", "bytes": byte_count }));
                } else {
                    eprintln!("> sent {} bytes", byte_count);
                }
            }
            ExchangeEvent::Download { head, body } => {
                downloaded = true;
                print_head(&head, json);
                let bytes = body.collect_limited(config.body.max_collect_bytes).await?;
                if json {
                    eprintln!("{}", json!({ "event": "body", "bytes": bytes.len() }));
                }
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
        }
    }

    if !downloaded {
        return Err(ExchangeError::NoResponse.into());
    }
    Ok(())
}

fn print_head(head: &ResponseHead, json: bool) {
    let (major, minor) = head.version_numbers();
    if json {
        let headers: serde_json::Map<String, serde_json::Value> = head
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.to_string(), serde_json::Value::String(value))
            })
            .collect();
        eprintln!(
            "{}",
            json!({
                "event": "head",
                "status": head.status().as_u16(),
                "reason": head.reason(),
                "version": format!("{}.{}", major, minor),
                "keep_alive": head.keep_alive(),
                "headers": headers,
            })
        );
    } else {
        eprintln!("< HTTP/{}.{} {} {}", major, minor, head.status().as_u16(), head.reason());
        for (name, value) in head.headers() {
            eprintln!("< {}: {}", name, String::from_utf8_lossy(value.as_bytes()));
        }
    }
}
