//! [`VisionClient`] – remote object-localisation and label-detection client.
//!
//! Talks to an `images:annotate` endpoint (Google Cloud Vision wire format).
//! One POST carries the base64-encoded frame and asks for both
//! `OBJECT_LOCALIZATION` and `LABEL_DETECTION` results.  The API key is sent
//! as the `key` query parameter.
//!
//! The client never retries: a single failed attempt is reported to the
//! caller as a [`PerceptionError`].
//!
//! # Example
//!
//! ```rust,no_run
//! use pathsense_perception::vision_client::{VisionClient, DEFAULT_VISION_ENDPOINT};
//!
//! let client = VisionClient::new(DEFAULT_VISION_ENDPOINT, "my-api-key");
//!
//! // Requires network access and a valid key – skipped in unit tests.
//! // let raw = client.annotate(&jpeg_bytes, 10).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use pathsense_types::PerceptionError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public Google Cloud Vision annotate endpoint.
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Hard limit on one outbound detection call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// Raw detections
// ─────────────────────────────────────────────────────────────────────────────

/// A normalised bounding-polygon vertex.  Coordinates lie in `[0, 1]`
/// relative to frame width and height; the service omits zero-valued or
/// unknown coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct NormalizedVertex {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// One entity reported by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub name: String,
    pub score: f64,
    pub vertices: Vec<NormalizedVertex>,
}

/// The parts of one annotate response that classification needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAnnotations {
    /// Localised objects, in service order.
    pub objects: Vec<RawDetection>,
    /// Scene label descriptions, in service order.
    pub labels: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend seam
// ─────────────────────────────────────────────────────────────────────────────

/// Anything that can turn a validated frame into raw detections.
///
/// [`VisionClient`] is the production implementation.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    /// Request up to `max_results` objects and labels for `image`.
    async fn annotate(
        &self,
        image: &[u8],
        max_results: u32,
    ) -> Result<RawAnnotations, PerceptionError>;

    /// Whether a credential has been supplied.
    fn is_configured(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: ImageContent<'a>,
    features: [Feature; 2],
}

#[derive(Serialize)]
struct ImageContent<'a> {
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    max_results: u32,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    localized_object_annotations: Vec<ObjectAnnotation>,
    #[serde(default)]
    label_annotations: Vec<LabelAnnotation>,
    error: Option<ServiceStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectAnnotation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    bounding_poly: BoundingPoly,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BoundingPoly {
    #[serde(default)]
    normalized_vertices: Vec<NormalizedVertex>,
}

#[derive(Deserialize)]
struct LabelAnnotation {
    description: String,
}

#[derive(Deserialize)]
struct ServiceStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

fn build_request(encoded: &str, max_results: u32) -> AnnotateRequest<'_> {
    AnnotateRequest {
        requests: [ImageRequest {
            image: ImageContent { content: encoded },
            features: [
                Feature {
                    kind: "OBJECT_LOCALIZATION",
                    max_results,
                },
                Feature {
                    kind: "LABEL_DETECTION",
                    max_results,
                },
            ],
        }],
    }
}

/// Parse an annotate response body into [`RawAnnotations`].
fn parse_response(body: &str) -> Result<RawAnnotations, PerceptionError> {
    let parsed: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| PerceptionError::MalformedResponse(e.to_string()))?;

    let first = parsed
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| PerceptionError::MalformedResponse("empty responses array".into()))?;

    if let Some(status) = first.error {
        return Err(PerceptionError::TransportFailure(format!(
            "service error {}: {}",
            status.code, status.message
        )));
    }

    Ok(RawAnnotations {
        objects: first
            .localized_object_annotations
            .into_iter()
            .map(|o| RawDetection {
                name: o.name,
                score: o.score,
                vertices: o.bounding_poly.normalized_vertices,
            })
            .collect(),
        labels: first
            .label_annotations
            .into_iter()
            .map(|l| l.description)
            .collect(),
    })
}

/// Map a reqwest failure onto the perception taxonomy.  The URL is stripped
/// because it carries the API key.
fn transport_error(e: reqwest::Error) -> PerceptionError {
    if e.is_timeout() {
        PerceptionError::Timeout
    } else {
        PerceptionError::TransportFailure(e.without_url().to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// VisionClient
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for the annotate endpoint.
///
/// Construct once and share; the inner connection pool is reused across
/// frames.
pub struct VisionClient {
    endpoint: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl VisionClient {
    /// Create a client for `endpoint` authenticating with `api_key`, using
    /// the default [`REQUEST_TIMEOUT`].
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: REQUEST_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionClient")
            .field("endpoint", &self.endpoint)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl DetectionBackend for VisionClient {
    /// # Errors
    ///
    /// Returns [`PerceptionError::Timeout`] when no response arrives within
    /// the timeout, [`PerceptionError::TransportFailure`] for network errors,
    /// non-success HTTP statuses, and service-reported errors, and
    /// [`PerceptionError::MalformedResponse`] when the body lacks the
    /// expected fields.
    async fn annotate(
        &self,
        image: &[u8],
        max_results: u32,
    ) -> Result<RawAnnotations, PerceptionError> {
        let encoded = STANDARD.encode(image);
        let body = build_request(&encoded, max_results);

        debug!(endpoint = %self.endpoint, max_results, "sending annotate request");
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?;

        let text = response.text().await.map_err(transport_error)?;
        parse_response(&text)
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const PERSON_RESPONSE: &str = r#"{
        "responses": [{
            "localizedObjectAnnotations": [
                {"name": "Person", "score": 0.91,
                 "boundingPoly": {"normalizedVertices": [{"x": 0.4, "y": 0.3}, {"x": 0.6, "y": 0.8}]}},
                {"name": "Car", "score": 0.7}
            ],
            "labelAnnotations": [{"description": "Hallway"}, {"description": "Floor"}]
        }]
    }"#;

    #[test]
    fn request_body_asks_for_objects_and_labels() {
        let body = serde_json::to_value(build_request("aGVsbG8=", 7)).unwrap();
        let expected = serde_json::json!({
            "requests": [{
                "image": {"content": "aGVsbG8="},
                "features": [
                    {"type": "OBJECT_LOCALIZATION", "maxResults": 7},
                    {"type": "LABEL_DETECTION", "maxResults": 7}
                ]
            }]
        });
        assert_eq!(body, expected);
    }

    #[test]
    fn parses_objects_and_labels() {
        let raw = parse_response(PERSON_RESPONSE).unwrap();
        assert_eq!(raw.objects.len(), 2);
        assert_eq!(raw.objects[0].name, "Person");
        assert!((raw.objects[0].score - 0.91).abs() < 1e-6);
        assert_eq!(raw.objects[0].vertices.len(), 2);
        assert_eq!(raw.objects[0].vertices[1].y, Some(0.8));
        assert!(raw.objects[1].vertices.is_empty());
        assert_eq!(raw.labels, vec!["Hallway".to_string(), "Floor".to_string()]);
    }

    #[test]
    fn missing_coordinates_stay_absent() {
        let raw = parse_response(
            r#"{"responses":[{"localizedObjectAnnotations":[
                {"name":"Tree","score":0.8,"boundingPoly":{"normalizedVertices":[{"y":0.9},{}]}}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(
            raw.objects[0].vertices,
            vec![
                NormalizedVertex { x: None, y: Some(0.9) },
                NormalizedVertex { x: None, y: None },
            ]
        );
    }

    #[test]
    fn scores_and_coordinates_keep_double_precision() {
        use crate::classifier::classify;
        use pathsense_types::Position;

        let raw = parse_response(
            r#"{"responses":[{"localizedObjectAnnotations":[
                {"name":"Person","score":0.49999999,"boundingPoly":{"normalizedVertices":[{"x":0.5,"y":0.9}]}},
                {"name":"Dog","score":0.8,"boundingPoly":{"normalizedVertices":[{"x":0.3299999999,"y":0.9}]}}
            ]}]}"#,
        )
        .unwrap();
        assert!(raw.objects[0].score < 0.5);

        let obstacles = classify(&raw);
        assert_eq!(obstacles.len(), 1);
        assert_eq!(obstacles[0].position(), Position::Left);
        assert_eq!(obstacles[0].confidence(), 0.8);
    }

    #[test]
    fn empty_image_response_has_no_detections() {
        let raw = parse_response(r#"{"responses":[{}]}"#).unwrap();
        assert_eq!(raw, RawAnnotations::default());
    }

    #[test]
    fn missing_responses_array_is_malformed() {
        let err = parse_response(r#"{"unexpected": true}"#).unwrap_err();
        assert!(matches!(err, PerceptionError::MalformedResponse(_)));
    }

    #[test]
    fn empty_responses_array_is_malformed() {
        let err = parse_response(r#"{"responses": []}"#).unwrap_err();
        assert_eq!(
            err,
            PerceptionError::MalformedResponse("empty responses array".into())
        );
    }

    #[test]
    fn label_without_description_is_malformed() {
        let err = parse_response(r#"{"responses":[{"labelAnnotations":[{"score":0.9}]}]}"#)
            .unwrap_err();
        assert!(matches!(err, PerceptionError::MalformedResponse(_)));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = parse_response("<html>gateway</html>").unwrap_err();
        assert!(matches!(err, PerceptionError::MalformedResponse(_)));
    }

    #[test]
    fn service_error_is_transport_failure() {
        let err = parse_response(
            r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PerceptionError::TransportFailure("service error 3: Bad image data.".into())
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = VisionClient::new(DEFAULT_VISION_ENDPOINT, "super-secret-key");
        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("<redacted>"));
        assert!(client.is_configured());
        assert!(!VisionClient::new(DEFAULT_VISION_ENDPOINT, "").is_configured());
    }

    #[tokio::test]
    async fn annotate_posts_frame_with_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/images:annotate")
            .match_query(mockito::Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Regex(
                r#""content":"AQID""#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PERSON_RESPONSE)
            .create_async()
            .await;

        let client = VisionClient::new(format!("{}/v1/images:annotate", server.url()), "test-key");
        let raw = client.annotate(&[1, 2, 3], 10).await.unwrap();

        mock.assert_async().await;
        assert_eq!(raw.objects[0].name, "Person");
        assert_eq!(raw.labels.len(), 2);
    }

    #[tokio::test]
    async fn http_error_status_is_transport_failure_without_key() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/images:annotate")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"API key not valid"}}"#)
            .create_async()
            .await;

        let client =
            VisionClient::new(format!("{}/v1/images:annotate", server.url()), "leaky-key");
        let err = client.annotate(&[1, 2, 3], 10).await.unwrap_err();

        assert!(matches!(err, PerceptionError::TransportFailure(_)));
        assert!(!err.to_string().contains("leaky-key"));
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/images:annotate")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"nothing": "here"}"#)
            .create_async()
            .await;

        let client = VisionClient::new(format!("{}/v1/images:annotate", server.url()), "k");
        let err = client.annotate(&[1, 2, 3], 10).await.unwrap_err();
        assert!(matches!(err, PerceptionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = VisionClient::new(format!("http://{addr}/v1/images:annotate"), "k")
            .with_timeout(Duration::from_millis(200));
        let err = client.annotate(&[1, 2, 3], 10).await.unwrap_err();
        assert_eq!(err, PerceptionError::Timeout);
    }

    #[tokio::test]
    async fn closed_port_is_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = VisionClient::new(format!("http://{addr}/v1/images:annotate"), "k");
        let err = client.annotate(&[1, 2, 3], 10).await.unwrap_err();
        assert!(matches!(err, PerceptionError::TransportFailure(_)));
    }
}
