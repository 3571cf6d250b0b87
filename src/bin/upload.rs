use clap::Parser;
use dotenvy::dotenv;
use rust_upload_backend::client::{FilePayload, UploadClient, UploadEvent, UploadResult};
use rust_upload_backend::config::RetryConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload files with retry and backoff", long_about = None)]
struct Args {
    /// Base URL of the upload endpoint
    #[arg(short, long, env = "UPLOAD_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Retries per file after the first attempt
    #[arg(short = 'r', long, env = "MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Delay before the first retry, in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS")]
    base_delay_ms: Option<u64>,

    /// Backoff cap, in milliseconds
    #[arg(long, env = "RETRY_MAX_DELAY_MS")]
    max_delay_ms: Option<u64>,

    /// Per-attempt timeout, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Files to upload, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl Args {
    fn retry_config(&self) -> RetryConfig {
        let mut config = RetryConfig::from_env();
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.base_delay_ms {
            config.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.max_delay_ms {
            config.max_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(v);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload=info,rust_upload_backend=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let client = UploadClient::http(&args.server, args.retry_config());
    info!(
        "📤 Uploading {} file(s) to {} (max retries {})",
        args.files.len(),
        args.server,
        client.config().max_retries
    );

    let mut failed = 0usize;
    for path in &args.files {
        let file = match FilePayload::from_path(path).await {
            Ok(file) => file,
            Err(e) => {
                error!("❌ {}: {:#}", path.display(), e);
                failed += 1;
                continue;
            }
        };
        let name = file.name.clone();

        let mut task = client.spawn(file);
        let cancel = task.cancellation_token();
        let mut interrupted = false;

        loop {
            tokio::select! {
                event = task.events.recv() => match event {
                    Some(UploadEvent::Retry { retry, delay, error }) => {
                        warn!("🔁 {}: retry {} in {:?} ({})", name, retry, delay, error);
                    }
                    Some(UploadEvent::Progress { percent: 100, .. }) => {
                        info!("✅ {}: 100%", name);
                    }
                    Some(_) => {}
                    None => break,
                },
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    warn!("⌨️  Ctrl+C received, cancelling {}", name);
                    cancel.cancel();
                    interrupted = true;
                }
            }
        }

        let outcome = task.join().await;
        let summary = UploadResult::from(&outcome);
        println!("{}: {}", name, serde_json::to_string(&summary)?);

        match outcome {
            Ok(receipt) if receipt.duplicate => {
                info!("♻️  {} already stored as {}", name, receipt.file_id)
            }
            Ok(receipt) => info!(
                "📦 {} stored as {} after {} attempt(s)",
                name, receipt.file_id, receipt.attempts
            ),
            Err(_) => failed += 1,
        }

        if interrupted {
            break;
        }
    }

    if failed > 0 {
        error!("{} upload(s) failed", failed);
        std::process::exit(1);
    }
    Ok(())
}
