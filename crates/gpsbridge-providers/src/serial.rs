//! Serial GPS receiver.

use std::time::Duration;

use gpsbridge_core::config::SerialSettings;
use thiserror::Error;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

/// Errors raised while opening the receiver.
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },
}

/// Open the receiver as an async byte stream (8N1, no flow control).
///
/// Must be called from within a tokio runtime.
pub fn open_serial(settings: &SerialSettings) -> Result<SerialStream, SerialError> {
    info!(
        "Opening serial port {} at {} baud",
        settings.port, settings.baud_rate
    );

    let stream = tokio_serial::new(settings.port.as_str(), settings.baud_rate)
        .timeout(Duration::from_millis(1000))
        .open_native_async()
        .map_err(|source| SerialError::Open {
            port: settings.port.clone(),
            source,
        })?;

    info!("Serial port {} open", settings.port);
    Ok(stream)
}
