//! Periodic telemetry upload.
//!
//! Every cycle the current location is sent to a ThingSpeak-style update
//! endpoint as `?api_key=..&field1=<lat>&field2=<lon>`. The endpoint answers
//! with the new entry id, or `0` when it refuses the update. Failures are
//! logged and dropped; the next cycle simply tries again with whatever
//! location is current then.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use gpsbridge_core::config::TelemetrySettings;
use gpsbridge_core::{Location, LocationStore};

use crate::hub::SharedStore;

/// Errors from a single upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The request never got a response.
    #[error("Telemetry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered but did not accept the update.
    #[error("Telemetry endpoint rejected update (HTTP {status}): {body:?}")]
    Rejected { status: u16, body: String },
}

/// Outcome of a cycle that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No location known yet.
    Skipped,
    /// The endpoint stored the update.
    Accepted { entry_id: String },
}

/// Uploads the current location on a fixed schedule.
#[derive(Clone)]
pub struct TelemetryUploader {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    interval: Duration,
    store: SharedStore,
}

impl TelemetryUploader {
    /// Build an uploader for `settings`, reading locations from `store`.
    pub fn new(
        settings: &TelemetrySettings,
        api_key: impl Into<String>,
        store: SharedStore,
    ) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: api_key.into(),
            interval: Duration::from_secs(settings.interval_secs.max(1)),
            store,
        })
    }

    /// Run one cycle against the current store contents.
    pub async fn upload_once(&self) -> Result<UploadOutcome, UploadError> {
        let current = self.store.read().await.get();
        match current {
            Some(location) => {
                let entry_id = self.upload(location).await?;
                Ok(UploadOutcome::Accepted { entry_id })
            }
            None => Ok(UploadOutcome::Skipped),
        }
    }

    /// Send one location. Returns the entry id reported by the endpoint.
    pub async fn upload(&self, location: Location) -> Result<String, UploadError> {
        let latitude = location.latitude.to_string();
        let longitude = location.longitude.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("field1", latitude.as_str()),
                ("field2", longitude.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let body = body.trim();

        if status == StatusCode::OK && body != "0" {
            Ok(body.to_string())
        } else {
            Err(UploadError::Rejected {
                status: status.as_u16(),
                body: body.to_string(),
            })
        }
    }

    /// Run forever. The first upload happens one interval after start.
    ///
    /// Each cycle is spawned as its own task, so a slow endpoint does not
    /// delay the schedule.
    pub async fn run(self) {
        info!(
            "Telemetry uploader started, every {}s to {}",
            self.interval.as_secs(),
            self.endpoint
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let uploader = self.clone();
            tokio::spawn(async move {
                let _ = uploader.run_cycle().await;
            });
        }
    }

    async fn run_cycle(&self) -> Result<UploadOutcome, UploadError> {
        let result = self.upload_once().await;
        match &result {
            Ok(UploadOutcome::Skipped) => debug!("No location yet, telemetry cycle skipped"),
            Ok(UploadOutcome::Accepted { entry_id }) => {
                info!("Telemetry uploaded, entry id {}", entry_id)
            }
            Err(e) => error!("{}", e),
        }
        result
    }
}
