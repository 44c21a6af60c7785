//! Face recognition service client
//!
//! Submits a classroom video reference to the external recognition service
//! and returns per-student presence decisions. Failures are classified so the
//! orchestrator can record a readable reason on the failed session. Nothing
//! here retries: every error is terminal for the session that caused it.

use async_trait::async_trait;
use rollcall_common::config::RecognitionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const PROCESS_VIDEO_PATH: &str = "/api/process-video";
const HEALTH_PATH: &str = "/health";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("rollcall-svc/", env!("CARGO_PKG_VERSION"));

/// Classified recognition failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecognitionError {
    /// Connection refused or otherwise unreachable
    #[error("Face recognition service is not available: {0}")]
    Unavailable(String),

    /// Upstream answered with a 5xx status
    #[error("Face recognition service encountered an error (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    /// Call exceeded the configured timeout
    #[error("Face recognition service timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream refused the request (non-5xx, non-2xx status)
    #[error("Face recognition service rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Response could not be decoded or reported failure
    #[error("Face recognition service returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Video submitted for one session
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionRequest {
    #[serde(rename = "video_url")]
    pub video_ref: String,
    pub session_id: Uuid,
    pub class_id: Uuid,
}

/// Presence decision for one student
#[derive(Debug, Clone, PartialEq)]
pub struct StudentOutcome {
    pub student_id: Uuid,
    pub present: bool,
    /// Clamped into [0, 1]
    pub confidence: Option<f64>,
    pub face_detected: bool,
}

/// Recognition output; not guaranteed to cover the whole roster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionResult {
    pub outcomes: Vec<StudentOutcome>,
}

/// Recognition backend health as seen from this service
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecognitionHealth {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Recognition backend seam used by the session orchestrator
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Submit a video and wait for per-student outcomes
    async fn submit(&self, request: &RecognitionRequest) -> Result<RecognitionResult, RecognitionError>;

    /// Probe backend health; never fails
    async fn health_check(&self) -> RecognitionHealth {
        RecognitionHealth {
            healthy: true,
            detail: None,
        }
    }
}

// Wire format of POST /api/process-video
#[derive(Debug, Deserialize)]
struct ProcessVideoResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Vec<WireOutcome>,
    #[serde(default)]
    recognized_students: Vec<WireRecognizedStudent>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WireOutcome {
    student_id: String,
    present: bool,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    face_detected: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WireRecognizedStudent {
    student_id: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    detections: Vec<serde_json::Value>,
}

impl ProcessVideoResponse {
    fn into_result(self) -> Result<RecognitionResult, RecognitionError> {
        if !self.success {
            return Err(RecognitionError::InvalidResponse(format!(
                "service reported failure: {}",
                self.message.unwrap_or_else(|| "no message".to_string())
            )));
        }

        let explicit = self.results.into_iter().map(|r| {
            let face_detected = r.face_detected.unwrap_or(r.present);
            (r.student_id, r.present, r.confidence, face_detected)
        });
        let recognized = self
            .recognized_students
            .into_iter()
            .map(|s| (s.student_id, true, s.confidence, !s.detections.is_empty()));

        let mut outcomes = Vec::new();
        for (raw_id, present, confidence, face_detected) in explicit.chain(recognized) {
            match Uuid::parse_str(raw_id.trim()) {
                Ok(student_id) => outcomes.push(StudentOutcome {
                    student_id,
                    present,
                    confidence: confidence
                        .filter(|c| c.is_finite())
                        .map(|c| c.clamp(0.0, 1.0)),
                    face_detected,
                }),
                Err(_) => {
                    tracing::warn!(student_id = %raw_id, "Skipping recognition entry with malformed student id");
                }
            }
        }

        Ok(RecognitionResult { outcomes })
    }
}

/// HTTP client for the recognition service
pub struct RecognitionClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RecognitionClient {
    pub fn new(config: &RecognitionConfig) -> rollcall_common::Result<Self> {
        let timeout = config.timeout();
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                rollcall_common::Error::Config(format!("Failed to build recognition client: {}", e))
            })?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn with_api_key(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }

    fn classify_transport_error(&self, error: reqwest::Error) -> RecognitionError {
        if error.is_timeout() {
            RecognitionError::Timeout(self.timeout)
        } else if error.is_decode() {
            RecognitionError::InvalidResponse(error.to_string())
        } else {
            // Connection refused, DNS failure, reset mid-request
            RecognitionError::Unavailable(error.to_string())
        }
    }
}

#[async_trait]
impl Recognizer for RecognitionClient {
    async fn submit(&self, request: &RecognitionRequest) -> Result<RecognitionResult, RecognitionError> {
        let url = format!("{}{}", self.base_url, PROCESS_VIDEO_PATH);

        tracing::info!(
            session_id = %request.session_id,
            class_id = %request.class_id,
            "Calling face recognition service"
        );

        let response = self
            .with_api_key(self.http_client.post(&url).json(request))
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();

        if status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(
                session_id = %request.session_id,
                status = status.as_u16(),
                "Face recognition service error"
            );
            return Err(RecognitionError::ServiceError {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: ProcessVideoResponse = response
            .json()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let result = body.into_result()?;

        tracing::info!(
            session_id = %request.session_id,
            outcomes = result.outcomes.len(),
            "Face recognition completed"
        );

        Ok(result)
    }

    async fn health_check(&self) -> RecognitionHealth {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);

        match self
            .with_api_key(self.http_client.get(&url).timeout(HEALTH_TIMEOUT))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => RecognitionHealth {
                healthy: true,
                detail: None,
            },
            Ok(response) => RecognitionHealth {
                healthy: false,
                detail: Some(format!("HTTP {}", response.status().as_u16())),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Face recognition health check failed");
                RecognitionHealth {
                    healthy: false,
                    detail: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_base_url() {
        let config = RecognitionConfig {
            url: "http://faces:8002/".to_string(),
            api_key: Some("  ".to_string()),
            timeout_ms: 1500,
        };
        let client = RecognitionClient::new(&config).unwrap();

        assert_eq!(client.base_url, "http://faces:8002");
        assert!(client.api_key.is_none());
        assert_eq!(client.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_request_serializes_video_url() {
        let request = RecognitionRequest {
            video_ref: "s3://bucket/video.mp4".to_string(),
            session_id: Uuid::nil(),
            class_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["video_url"], "s3://bucket/video.mp4");
        assert!(json.get("video_ref").is_none());
    }

    #[test]
    fn test_explicit_results_are_parsed_and_clamped() {
        let id = Uuid::new_v4();
        let body: ProcessVideoResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "results": [
                { "student_id": id.to_string(), "present": true, "confidence": 1.7, "face_detected": true },
                { "student_id": "not-a-uuid", "present": true, "confidence": 0.9 }
            ]
        }))
        .unwrap();

        let result = body.into_result().unwrap();
        assert_eq!(
            result.outcomes,
            vec![StudentOutcome {
                student_id: id,
                present: true,
                confidence: Some(1.0),
                face_detected: true,
            }]
        );
    }

    #[test]
    fn test_recognized_students_shape_maps_to_present() {
        let seen = Uuid::new_v4();
        let undetected = Uuid::new_v4();
        let body: ProcessVideoResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "recognized_students": [
                { "student_id": seen.to_string(), "student_name": "Asha", "confidence": 0.82,
                  "detections": [{ "bbox": [0, 0, 10, 10], "confidence": 0.9, "frame_number": 3, "timestamp": 0.1 }] },
                { "student_id": undetected.to_string(), "student_name": "Ravi", "confidence": 0.55, "detections": [] }
            ]
        }))
        .unwrap();

        let result = body.into_result().unwrap();
        assert_eq!(result.outcomes.len(), 2);
        assert!(result.outcomes.iter().all(|o| o.present));
        assert!(result.outcomes[0].face_detected);
        assert!(!result.outcomes[1].face_detected);
    }

    #[test]
    fn test_reported_failure_is_invalid_response() {
        let body: ProcessVideoResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "message": "video could not be decoded"
        }))
        .unwrap();

        let err = body.into_result().unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidResponse(ref m) if m.contains("could not be decoded")));
    }

    #[test]
    fn test_error_messages_are_readable() {
        let err = RecognitionError::ServiceError {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Face recognition service encountered an error (HTTP 503): overloaded"
        );
        assert_eq!(
            RecognitionError::Timeout(Duration::from_secs(30)).to_string(),
            "Face recognition service timed out after 30s"
        );
    }
}
