use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use herald_core::{PublisherClient, Settings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Publish a JSON payload to one or more broker topics.
#[derive(Debug, Parser)]
#[command(name = "herald", version)]
struct Args {
    /// Broker base address.
    #[arg(long, env = "HERALD_BROKER_URL")]
    broker_url: String,

    /// Access token sent in the `token` header.
    #[arg(long, env = "HERALD_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, env = "HERALD_WORKERS", default_value_t = herald_core::domain::DEFAULT_WORKER_COUNT)]
    workers: usize,

    /// Topic to publish to; repeat for fan-out.
    #[arg(long = "topic", required = true)]
    topics: Vec<String>,

    /// JSON object payload.
    #[arg(long, default_value = "{}")]
    payload: String,

    /// Queue the payload this many times.
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    /// Send once, synchronously, and print the broker's answer.
    #[arg(long)]
    force: bool,

    /// Seconds to wait for the workers on shutdown.
    #[arg(long, default_value_t = 30)]
    shutdown_timeout: u64,

    /// Skip TLS certificate verification.
    #[arg(long)]
    insecure: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "herald failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let payload: serde_json::Value = serde_json::from_str(&args.payload)?;

    let mut settings = Settings::new(args.broker_url, args.token);
    settings.worker_count = args.workers;
    settings.shutdown_timeout = Some(Duration::from_secs(args.shutdown_timeout));
    settings.verify_tls = !args.insecure;

    let client = PublisherClient::new(settings)?;
    let topics: Vec<&str> = args.topics.iter().map(String::as_str).collect();

    if args.force {
        let result = client.publish_force(payload, None, &topics).await;
        client.close().await?;

        let response = result?;
        println!("status: {}", response.status);
        println!("body: {}", response.body);
        return Ok(if response.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    for _ in 0..args.repeat {
        let id = client.publish(payload.clone(), None, &topics).await?;
        info!(message_id = %id, "queued");
    }
    client.close().await?;

    let counts = client.counts();
    println!(
        "delivered: {} rejected: {} faulted: {}",
        counts.delivered, counts.rejected, counts.faulted
    );
    Ok(if counts.rejected + counts.faulted == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
