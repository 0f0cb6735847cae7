//! ITWS radar bridge.
//!
//! Reads ITWS precipitation products from a Redis stream, keeps the last few
//! frames and posts them as one JSON document to the ingestion API.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use itws_bridge::pipeline::PipelineSettings;
use itws_bridge::{metrics, Bridge, BridgeConfig};
use itws_parser::decode_frame;
use radar_output::{encode_history, OutputShape, ReliableForwarder};
use storage::{HistoryCache, RedisStreamSource};
use wx_common::now_epoch_ms;

#[derive(Parser, Debug)]
#[command(name = "itws-bridge")]
#[command(about = "Forward ITWS radar products to the weather ingestion API")]
struct Args {
    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Decode a local XML file, print the encoded document and exit
    #[arg(long)]
    decode_file: Option<String>,

    /// Output shape (expanded or compact), overrides OUTPUT_SHAPE
    #[arg(long)]
    shape: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = BridgeConfig::from_env()?;
    if let Some(shape) = &args.shape {
        config.output_shape = shape.parse::<OutputShape>()?;
    }

    if let Some(path) = &args.decode_file {
        return decode_file(&config, Path::new(path));
    }

    info!("Starting ITWS bridge");

    if let Some(addr) = config.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        metrics::describe();
        info!(addr = %addr, "Prometheus metrics exporter listening");
    }

    let stream = config.require_stream()?.to_string();
    let mut source = RedisStreamSource::connect(
        &config.redis_url,
        &stream,
        &config.consumer_group,
        &config.consumer_name,
    )
    .await
    .context("Failed to connect to Redis")?;

    info!(
        stream = %stream,
        group = %config.consumer_group,
        consumer = %source.consumer(),
        post_url = %config.forwarder.url,
        shape = %config.output_shape,
        "Connected"
    );

    let forwarder = ReliableForwarder::new(config.forwarder.clone())?;
    let mut bridge = Bridge::new(PipelineSettings::from(&config), forwarder);

    tokio::select! {
        _ = bridge.run(&mut source) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
    }

    Ok(())
}

/// Decode one XML file and print the document that would be posted.
fn decode_file(config: &BridgeConfig, path: &Path) -> Result<()> {
    info!(file = %path.display(), shape = %config.output_shape, "Decoding local file");

    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let frame = decode_frame(&data, now_epoch_ms(), &config.decoder_config())?
        .with_context(|| format!("No usable grid in {}", path.display()))?;

    info!(
        rows = frame.geometry.rows,
        cols = frame.geometry.cols,
        dims_source = frame.dims_source.as_str(),
        max_level = frame.stats.max_level,
        non_zero_cells = frame.stats.non_zero_cells,
        "Decoded frame"
    );

    let mut history = HistoryCache::new(1, config.output_shape.history_order());
    history.push(frame);
    let document = encode_history(&history.snapshot(), config.output_shape, now_epoch_ms())?;

    println!("{}", String::from_utf8_lossy(&document));
    Ok(())
}
