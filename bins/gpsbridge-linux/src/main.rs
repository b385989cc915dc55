use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gpsbridge_core::BridgeConfig;
use gpsbridge_providers::{configure_pins, open_serial, GgaParser};
use gpsbridge_server::{
    load_tls_acceptor, run_ingest, shared_store, BridgeServer, BroadcastHub, ServerConfig,
    TelemetryUploader,
};

/// Serial GPS to WebSocket and telemetry bridge.
#[derive(Parser, Debug)]
#[command(name = "gpsbridge", version, about)]
struct Opts {
    /// JSON configuration file. Defaults apply when omitted.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Serial device, overrides the configuration.
    #[arg(short = 'p', long)]
    serial_port: Option<String>,

    /// Serial baud rate, overrides the configuration.
    #[arg(short = 'b', long)]
    baud_rate: Option<u32>,

    /// Listen address, overrides the configuration.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Serve plain HTTP/WS even if a certificate is configured.
    #[arg(long)]
    no_tls: bool,

    /// Do not run the pin multiplexing commands.
    #[arg(long)]
    skip_pins: bool,

    /// Telemetry write API key, overrides the configuration.
    #[arg(long, env = "GPSBRIDGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl Opts {
    fn load_config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => BridgeConfig::default(),
        };

        if let Some(port) = &self.serial_port {
            config.serial.port = port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if let Some(bind) = self.bind {
            config.server.bind_addr = bind;
        }
        if self.no_tls {
            config.server.tls = None;
        }
        if let Some(key) = &self.api_key {
            config.telemetry.api_key = Some(key.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,gpsbridge_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let opts = Opts::parse();
    let config = opts.load_config()?;

    tracing::info!("GPS bridge starting...");

    if opts.skip_pins {
        tracing::info!("Skipping pin configuration");
    } else {
        configure_pins(&config.pin_program, &config.pins)
            .await
            .context("configuring UART pins")?;
    }

    let store = shared_store();
    let hub = Arc::new(BroadcastHub::new(store.clone()));

    let mut server = BridgeServer::new(ServerConfig::from(&config.server), hub.clone());
    if let Some(tls) = &config.server.tls {
        let acceptor = load_tls_acceptor(tls).context("loading TLS certificate")?;
        server = server.with_tls(acceptor);
    } else {
        tracing::warn!("TLS disabled, serving plain HTTP/WS");
    }

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("Server error: {}", e);
        }
    });

    match (&config.telemetry.api_key, config.telemetry.enabled) {
        (Some(key), true) => {
            let uploader = TelemetryUploader::new(&config.telemetry, key.as_str(), store.clone())
                .context("building telemetry client")?;
            tokio::spawn(uploader.run());
        }
        (None, true) => {
            tracing::warn!("No telemetry API key (set GPSBRIDGE_API_KEY), uploads disabled");
        }
        (_, false) => tracing::info!("Telemetry disabled"),
    }

    let serial = open_serial(&config.serial)?;
    tracing::info!(
        "Reading {} sentences from {} at {} baud",
        config.serial.gga_tag,
        config.serial.port,
        config.serial.baud_rate
    );

    let parser = GgaParser::new(config.serial.gga_tag.as_str());
    let ingest_hub = hub.clone();
    let ingest_handle = tokio::spawn(async move {
        run_ingest(BufReader::new(serial), &parser, &ingest_hub).await
    });

    tracing::info!("GPS bridge ready!");

    // Serial failures end the process; a supervisor is expected to restart it.
    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
        _ = server_handle => Err(anyhow::anyhow!("server stopped")),
        ingest = ingest_handle => {
            match ingest? {
                Ok(stats) => {
                    tracing::warn!(
                        "Serial source closed after {} lines ({} fixes, {} rejected)",
                        stats.lines, stats.fixes, stats.rejected
                    );
                    Err(anyhow::anyhow!("serial source closed"))
                }
                Err(e) => Err(anyhow::Error::new(e).context("reading serial port")),
            }
        }
    };

    tracing::info!("Shutdown complete");
    result
}
