//! Header pin muxing.
//!
//! On the BeagleBone the UART pins must be switched to `uart` mode with
//! `config-pin` before the serial device delivers data. Every assignment is
//! attempted and logged; the first failure is returned so startup can abort.

use gpsbridge_core::config::PinAssignment;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

/// Errors raised while configuring pins.
#[derive(Debug, Error)]
pub enum PinError {
    #[error("Failed to run {program} for pin {pin}: {source}")]
    Spawn {
        program: String,
        pin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to configure pin {pin} as {mode}: {stderr}")]
    Failed {
        pin: String,
        mode: String,
        stderr: String,
    },
}

/// Run `<program> <pin> <mode>` for every assignment.
pub async fn configure_pins(program: &str, pins: &[PinAssignment]) -> Result<(), PinError> {
    let mut first_error = None;

    for assignment in pins {
        match configure_pin(program, assignment).await {
            Ok(()) => info!("Pin {} configured as {}", assignment.pin, assignment.mode),
            Err(e) => {
                error!("{}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn configure_pin(program: &str, assignment: &PinAssignment) -> Result<(), PinError> {
    let output = Command::new(program)
        .arg(&assignment.pin)
        .arg(&assignment.mode)
        .output()
        .await
        .map_err(|source| PinError::Spawn {
            program: program.to_string(),
            pin: assignment.pin.clone(),
            source,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(PinError::Failed {
            pin: assignment.pin.clone(),
            mode: assignment.mode.clone(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
