//! HTTP client for the inference service.

use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use vigil_models::Frame;

use crate::error::{MlError, MlResult};
use crate::types::{
    AnomalyResponse, ClassifyResponse, HealthResponse, PoseTracker, TrackObservation,
    TrackResponse, WindowRequest, WindowScorer,
};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// Whether the service runs a reconstruction-error model
    pub anomaly_enabled: bool,
    /// JPEG quality for uploaded frames
    pub jpeg_quality: u8,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
            anomaly_enabled: false,
            jpeg_quality: 85,
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(
                std::env::var("ML_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.timeout.as_secs()),
            ),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            anomaly_enabled: std::env::var("ML_ANOMALY_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.anomaly_enabled),
            jpeg_quality: std::env::var("ML_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jpeg_quality),
        }
    }
}

/// Client for the inference service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    async fn post_window(&self, endpoint: &str, window: &[Vec<f32>]) -> MlResult<Response> {
        let url = format!("{}/{}", self.config.base_url, endpoint);
        let body = WindowRequest { window };
        self.with_retry(|| async {
            let response = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(MlError::Network)?;
            check_status(response).await
        })
        .await
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn check_status(response: Response) -> MlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
        Err(MlError::ServiceUnavailable(format!("{}: {}", status, body)))
    } else {
        Err(MlError::RequestFailed(format!(
            "ML service returned {}: {}",
            status, body
        )))
    }
}

/// Encode a BGR24 frame as JPEG.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> MlResult<Vec<u8>> {
    if !frame.is_complete() {
        return Err(MlError::Encode(format!(
            "frame has {} bytes, expected {}",
            frame.data.len(),
            Frame::byte_len(frame.width, frame.height)
        )));
    }

    let mut rgb = frame.data.clone();
    for px in rgb.chunks_exact_mut(3) {
        px.swap(0, 2);
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&rgb, frame.width, frame.height, ColorType::Rgb8)
        .map_err(|e| MlError::Encode(e.to_string()))?;
    Ok(out)
}

#[async_trait]
impl PoseTracker for MlClient {
    async fn track(&self, camera_id: &str, frame: &Frame) -> MlResult<Vec<TrackObservation>> {
        let url = format!("{}/track", self.config.base_url);
        let jpeg = encode_jpeg(frame, self.config.jpeg_quality)?;

        let response = self
            .with_retry(|| async {
                let part = Part::bytes(jpeg.clone())
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")
                    .map_err(MlError::Network)?;
                let form = Form::new()
                    .text("camera_id", camera_id.to_string())
                    .part("frame", part);
                let response = self
                    .http
                    .post(&url)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(MlError::Network)?;
                check_status(response).await
            })
            .await?;

        let parsed: TrackResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(e.to_string()))?;
        debug!(camera_id, tracks = parsed.tracks.len(), "Tracked frame");
        Ok(parsed.tracks)
    }
}

#[async_trait]
impl WindowScorer for MlClient {
    async fn classify(&self, window: &[Vec<f32>]) -> MlResult<f64> {
        let response = self.post_window("classify", window).await?;
        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(e.to_string()))?;
        if !parsed.probability.is_finite() {
            return Err(MlError::InvalidResponse("non-finite probability".to_string()));
        }
        Ok(parsed.probability.clamp(0.0, 1.0))
    }

    async fn reconstruction_error(&self, window: &[Vec<f32>]) -> MlResult<Option<f64>> {
        if !self.config.anomaly_enabled {
            return Ok(None);
        }
        let response = self.post_window("anomaly", window).await?;
        let parsed: AnomalyResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(e.to_string()))?;
        Ok(Some(parsed.reconstruction_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, anomaly_enabled: bool) -> MlClient {
        MlClient::new(MlClientConfig {
            base_url: server.uri(),
            anomaly_enabled,
            max_retries: 0,
            ..Default::default()
        })
        .unwrap()
    }

    fn window() -> Vec<Vec<f32>> {
        vec![vec![0.1; 34]; 24]
    }

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert!(!config.anomaly_enabled);
    }

    #[test]
    fn test_encode_jpeg_rejects_short_frame() {
        let frame = Frame::new(vec![0; 10], 4, 4, Utc::now());
        assert!(matches!(encode_jpeg(&frame, 80), Err(MlError::Encode(_))));
    }

    #[test]
    fn test_encode_jpeg() {
        let frame = Frame::new(vec![128; Frame::byte_len(8, 8)], 8, 8, Utc::now());
        let jpeg = encode_jpeg(&frame, 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_classify() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "probability": 0.82 })))
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        let prob = client.classify(&window()).await.unwrap();
        assert!((prob - 0.82).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_anomaly_disabled_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/anomaly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reconstruction_error": 1.0 })))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        assert_eq!(client.reconstruction_error(&window()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_anomaly_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/anomaly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reconstruction_error": 0.37 })))
            .mount(&server)
            .await;

        let client = client_for(&server, true);
        assert_eq!(client.reconstruction_error(&window()).await.unwrap(), Some(0.37));
    }

    #[tokio::test]
    async fn test_track_parses_optional_features() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/track"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tracks": [
                    { "track_id": 1, "features": [0.5, 0.25] },
                    { "track_id": 2 }
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        let frame = Frame::new(vec![0; Frame::byte_len(4, 4)], 4, 4, Utc::now());
        let tracks = client.track("cam-1", &frame).await.unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0], TrackObservation::new(1, Some(vec![0.5, 0.25])));
        assert_eq!(tracks[1].features, None);
    }

    #[tokio::test]
    async fn test_service_unavailable_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server, false);
        let err = client.classify(&window()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&server)
            .await;

        let healthy = tokio_test::assert_ok!(client_for(&server, false).health_check().await);
        assert!(healthy);
    }
}
