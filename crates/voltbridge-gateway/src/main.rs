//! VoltBridge gateway binary
//!
//! Bridges the sensor's serial link to stdin/stdout JSON lines so any broker
//! client can sit in front of it:
//!
//! - stdin: one property-set request per line
//! - stdout: telemetry posts and set replies, one JSON object per line
//!
//! Usage: `voltbridge-gateway <port> [baud]`

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use voltbridge_core::bridge::{build_bridge, BridgeConfig};
use voltbridge_core::protocol::{serial, DEFAULT_BAUD_RATE};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let port_name = match args.next() {
        Some(name) => name,
        None => {
            let ports = serial::list_ports();
            if ports.is_empty() {
                bail!("usage: voltbridge-gateway <port> [baud] (no serial ports found)");
            }
            bail!(
                "usage: voltbridge-gateway <port> [baud]; available ports: {}",
                ports.join(", ")
            );
        }
    };
    let baud_rate = match args.next() {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("invalid baud rate '{}'", raw))?,
        None => DEFAULT_BAUD_RATE,
    };

    let config = BridgeConfig {
        port_name: port_name.clone(),
        baud_rate,
        ..BridgeConfig::default()
    };

    let stream = serial::open_port(&config.port_name, config.baud_rate)
        .with_context(|| format!("failed to open {}", config.port_name))?;
    info!(port = %config.port_name, baud = config.baud_rate, "serial link open");

    let (outbound_tx, mut outbound_rx) = mpsc::channel(64);
    let (rx_loop, dispatcher) = build_bridge(&config, stream, outbound_tx);

    // Control task: one JSON request per stdin line.
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Err(e) = dispatcher.handle_request(line.as_bytes()).await {
                        error!(error = %e, "control request failed");
                    }
                }
                Ok(None) => {
                    info!("stdin closed, control task exiting");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "stdin read error");
                    return;
                }
            }
        }
    });

    // Publisher task: outbound messages to stdout, one per line.
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{}", line),
                Err(e) => error!(error = %e, "failed to serialize outbound message"),
            }
        }
    });

    rx_loop.run().await?;
    Ok(())
}
