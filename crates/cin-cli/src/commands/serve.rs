//! Serve command - run the HTTP extraction service.

use std::time::Duration;

use clap::Args;
use tokio::net::TcpListener;

use super::load_config;
use super::process::EngineArg;
use crate::server::{self, AppState};
use crate::service::ExtractionService;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Listen address (overrides server.bind)
    #[arg(short, long)]
    bind: Option<String>,

    /// Per-request time limit in seconds, 0 for none (overrides server.timeout_secs)
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum upload size in bytes (overrides server.max_upload_bytes)
    #[arg(long)]
    max_upload_bytes: Option<usize>,

    /// OCR engine (overrides ocr.engine)
    #[arg(short, long, value_enum)]
    engine: Option<EngineArg>,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(timeout) = args.timeout {
        config.server.timeout_secs = timeout;
    }
    if let Some(max) = args.max_upload_bytes {
        config.server.max_upload_bytes = max;
    }
    if let Some(engine) = args.engine {
        config.ocr.engine = engine.into();
    }

    let service = ExtractionService::from_config(&config)?;
    let timeout = (config.server.timeout_secs > 0).then(|| Duration::from_secs(config.server.timeout_secs));
    let app = server::router(AppState::new(service, timeout), config.server.max_upload_bytes);

    let listener = TcpListener::bind(&config.server.bind).await?;
    server::serve(listener, app).await
}
