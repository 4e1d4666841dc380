//! courier: send HTTP requests through connection actors.
//!
//! ```text
//! courier [--config FILE] [--watch] request GET http://host/path -H name:value -d body
//! courier [--config FILE] pool http://host:port --count 100 --concurrency 16 --path /a
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::Semaphore;

use courier::config::loader::load_config;
use courier::config::watcher::ConfigWatcher;
use courier::config::{defaults, ClientConfig, RequestDefaults};
use courier::observability::{logging, metrics};
use courier::pool::{HealthSnapshot, PoolStatus};
use courier::{Client, ConnectionPool, Method, Request, Shutdown};

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "HTTP requests over one-shot or pooled connection actors", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reload request defaults when the config file changes.
    #[arg(long, global = true)]
    watch: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request on a dedicated connection
    Request {
        method: Method,
        url: String,

        /// Header as `name:value`; repeatable
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Request body
        #[arg(short = 'd', long = "data", default_value = "")]
        body: String,

        /// Reply timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a batch of GETs through a connection pool
    Pool {
        /// Pool target, e.g. http://127.0.0.1:8080
        url: String,

        #[arg(long)]
        capacity: Option<usize>,

        /// Number of requests to send
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Requests in flight at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Paths to cycle through; repeatable
        #[arg(long = "path", default_value = "/")]
        paths: Vec<String>,

        /// Reply timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected name:value, got '{}'", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[derive(Serialize)]
struct PoolSummary {
    target: String,
    requests: usize,
    outcomes: BTreeMap<&'static str, usize>,
    status_codes: BTreeMap<u16, usize>,
    status: PoolStatus,
    health: HealthSnapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(
        timeout_ms = config.request.timeout_ms,
        grace_ms = config.request.grace_ms,
        "Configuration loaded"
    );
    defaults::install(RequestDefaults::from(&config.request));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Keep the watcher alive for the whole run.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(async move {
                while let Some(updated) = updates.recv().await {
                    tracing::info!(
                        timeout_ms = updated.request.timeout_ms,
                        "Request defaults reloaded"
                    );
                }
            });
            Some(handle)
        }
        (None, true) => {
            tracing::warn!("--watch needs --config, ignoring");
            None
        }
        _ => None,
    };

    match cli.command {
        Commands::Request {
            method,
            url,
            headers,
            body,
            timeout,
        } => {
            let mut request = Request::new(method, url).headers(headers).body(body);
            if let Some(ms) = timeout {
                request = request.timeout_ms(ms);
            }
            let response = Client::new().request(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Pool {
            url,
            capacity,
            count,
            concurrency,
            paths,
            timeout,
        } => {
            let mut pool_config = config.pool.clone();
            pool_config.target_url = url;
            if let Some(capacity) = capacity {
                pool_config.capacity = capacity;
            }
            let warm_up = pool_config.warm_up;

            let pool = ConnectionPool::new(pool_config)?;
            let shutdown = Shutdown::new();
            shutdown.track(pool.spawn_monitor(shutdown.subscribe()));
            if warm_up {
                pool.warm_up().await;
            }

            let summary = run_batch(&pool, count, concurrency, &paths, timeout).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            shutdown.complete(Duration::from_secs(1)).await;
            pool.close().await;
        }
    }

    Ok(())
}

async fn run_batch(
    pool: &ConnectionPool,
    count: usize,
    concurrency: usize,
    paths: &[String],
    timeout: Option<u64>,
) -> Result<PoolSummary, Box<dyn std::error::Error>> {
    let base = pool.target().clone();
    let gate = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(count);

    for i in 0..count {
        let path = &paths[i % paths.len()];
        let url = base.join(path)?;
        let mut request = Request::get(url.as_str());
        if let Some(ms) = timeout {
            request = request.timeout_ms(ms);
        }

        let permit = Arc::clone(&gate).acquire_owned().await?;
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let outcome = pool.request(request).await;
            drop(permit);
            outcome
        }));
    }

    let mut outcomes = BTreeMap::new();
    let mut status_codes = BTreeMap::new();
    for task in tasks {
        match task.await? {
            Ok(response) => {
                *outcomes.entry("ok").or_insert(0) += 1;
                *status_codes.entry(response.status_code).or_insert(0) += 1;
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Pooled request failed");
                *outcomes.entry(e.kind()).or_insert(0) += 1;
            }
        }
    }

    Ok(PoolSummary {
        target: base.to_string(),
        requests: count,
        outcomes,
        status_codes,
        status: pool.status(),
        health: pool.health(),
    })
}
