use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use common::PlateCandidate;
use reqwest::{header::ACCEPT, Client};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use telemetry::metrics::SCANNER_HUB_REQUESTS;

use crate::mjpeg;
use crate::sensors::{self, LAST_PLATE_SENSOR, PLATE_DETECTED_EVENT, TARGET_SENSOR};

pub const DEFAULT_BASE_URL: &str = "http://supervisor/core/api";

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(15);
const STREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(25);
const STREAM_FRAME_TIMEOUT: Duration = Duration::from_secs(20);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Low-level operations against the automation hub
#[async_trait]
pub trait HubApi: Send + Sync {
    /// Encoded still image (usually JPEG) from a camera entity
    async fn camera_snapshot(&self, entity_id: &str) -> Result<Vec<u8>>;

    /// Create or replace an entity's state and attributes
    async fn update_sensor(&self, entity_id: &str, state: &str, attributes: Value) -> Result<()>;

    async fn fire_event(&self, event_type: &str, data: Value) -> Result<()>;

    /// Put both sensors into a known state at startup
    async fn init_sensors(&self) -> Result<()> {
        self.update_sensor(LAST_PLATE_SENSOR, "unknown", sensors::last_plate_initial())
            .await?;
        self.update_sensor(TARGET_SENSOR, "off", sensors::target_off_attributes())
            .await
    }

    /// Publish a plate read: last-plate sensor, target sensor when it is a
    /// target, and the detection event
    async fn report_plate(&self, candidate: &PlateCandidate, is_target: bool) -> Result<()> {
        let last_seen = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        self.update_sensor(
            LAST_PLATE_SENSOR,
            &candidate.plate,
            sensors::last_plate_attributes(candidate, is_target, &last_seen),
        )
        .await?;

        if is_target {
            self.update_sensor(
                TARGET_SENSOR,
                "on",
                sensors::target_on_attributes(&candidate.plate),
            )
            .await?;
        }

        self.fire_event(
            PLATE_DETECTED_EVENT,
            sensors::plate_event(candidate, is_target),
        )
        .await
    }

    /// Turn the target sensor back off
    async fn clear_target(&self) -> Result<()> {
        self.update_sensor(TARGET_SENSOR, "off", sensors::target_off_attributes())
            .await
    }
}

/// HTTP client for the hub REST API
#[derive(Clone)]
pub struct HubClient {
    base_url: String,
    token: String,
    client: Client,
}

#[derive(Serialize)]
struct StateUpdate<'a> {
    state: &'a str,
    attributes: Value,
}

impl HubClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    /// Build from `SUPERVISOR_TOKEN` (required) and `HUB_API_URL` (optional)
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("SUPERVISOR_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .context("SUPERVISOR_TOKEN not set; the hub API is unreachable without it")?;
        let base_url =
            std::env::var("HUB_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(base_url, token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// First frame of the camera's MJPEG stream, for stream-only cameras
    async fn snapshot_from_stream(&self, entity_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(&format!("/camera_proxy_stream/{}", entity_id)))
            .bearer_auth(&self.token)
            .header(ACCEPT, "multipart/x-mixed-replace, */*")
            .timeout(STREAM_REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        mjpeg::read_first_frame(response, STREAM_FRAME_TIMEOUT).await
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        path: &str,
        body: &T,
    ) -> Result<()> {
        let result = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        record(operation, result.is_ok());
        result?;
        Ok(())
    }
}

fn record(operation: &str, ok: bool) {
    let status = if ok { "success" } else { "error" };
    SCANNER_HUB_REQUESTS
        .with_label_values(&[operation, status])
        .inc();
}

#[async_trait]
impl HubApi for HubClient {
    async fn camera_snapshot(&self, entity_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(&format!("/camera_proxy/{}", entity_id)))
            .bearer_auth(&self.token)
            .header(ACCEPT, "image/jpeg, image/*, */*")
            .timeout(SNAPSHOT_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("failed to request snapshot from {}", entity_id));

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                record("snapshot", false);
                return Err(e);
            }
        };

        let status = response.status();
        if status.is_server_error() {
            tracing::debug!(
                camera = %entity_id,
                status = status.as_u16(),
                "Still image failed, trying stream"
            );

            match self.snapshot_from_stream(entity_id).await {
                Ok(jpeg) => {
                    record("snapshot_stream", true);
                    return Ok(jpeg);
                }
                Err(e) => {
                    record("snapshot_stream", false);
                    tracing::debug!(camera = %entity_id, error = %e, "Stream snapshot failed");
                }
            }

            record("snapshot", false);
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(500).collect();
            bail!(
                "snapshot {} failed ({}). Server response: {}",
                entity_id,
                status,
                body
            );
        }

        if !status.is_success() {
            record("snapshot", false);
            bail!("failed to get snapshot from {}: HTTP {}", entity_id, status);
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read snapshot body from {}", entity_id))?;
        record("snapshot", true);
        Ok(bytes.to_vec())
    }

    async fn update_sensor(&self, entity_id: &str, state: &str, attributes: Value) -> Result<()> {
        let body = StateUpdate { state, attributes };
        self.post_json("update_sensor", &format!("/states/{}", entity_id), &body)
            .await
            .with_context(|| format!("failed to update {}", entity_id))?;

        tracing::debug!(entity = %entity_id, state, "Updated sensor");
        Ok(())
    }

    async fn fire_event(&self, event_type: &str, data: Value) -> Result<()> {
        self.post_json("fire_event", &format!("/events/{}", event_type), &data)
            .await
            .with_context(|| format!("failed to fire event {}", event_type))?;

        tracing::debug!(event = %event_type, "Fired event");
        Ok(())
    }
}
