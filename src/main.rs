//! chatgate: entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at configured level
//!   4. Build LLM provider and gateway
//!   5. Start comms channels
//!   6. Wait for Ctrl-C or all channels exiting

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use chatgate::error::AppError;
use chatgate::gateway::Gateway;
use chatgate::llm::providers;
use chatgate::subsystems::comms;
use chatgate::{config, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level, false, config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        log_level = %config.log_level,
        llm = %config.llm.provider,
        "config loaded"
    );

    let provider = providers::build(&config.llm, config.llm_api_key.clone())
        .map_err(|e| AppError::Provider(e.to_string()))?;
    info!(provider = provider.name(), "llm provider ready");

    let gateway = Arc::new(Gateway::build(&config, provider));

    let shutdown = CancellationToken::new();
    let handle = comms::start(&config, gateway, shutdown.clone());

    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            ctrl_c_token.cancel();
        }
    });

    let result = handle.join().await;
    shutdown.cancel();
    info!("chatgate stopped");
    result
}
