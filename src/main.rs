use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use simplify_relay::{Config, GeminiBrain, Relay, face};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("simplify_relay=info".parse()?),
        )
        .init();

    let config = Config::parse();

    let brain = GeminiBrain::new(
        config.gemini_api_key.clone(),
        config.gemini_base_url.clone(),
        config.request_timeout(),
    )?;
    if !brain.has_api_key() {
        warn!("GEMINI_API_KEY is not set; every request will fail until it is");
    }
    info!(model = %config.model, timeout_secs = config.request_timeout_secs, "model provider ready");

    let relay = Relay::new(Arc::new(brain), config.model.clone());
    face::serve(relay, config.addr()).await
}
