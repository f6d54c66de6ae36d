//! Remote scan client
//!
//! The remote-fetch step starts a request and then only asks whether it has
//! settled. [`HttpScanClient`] runs the POST on its own tokio task so frame
//! rendering never waits on the network.
//!
//! The client only bounds connection setup. Once connected, a scan runs until
//! the server answers; the interpreter's optional scan timeout is the one
//! place that gives up on a slow reply.

use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::BackendError;

/// Body of a scan request
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// What to scan
    pub target: String,
    /// Classification label
    pub classification: String,
    /// Requested timestamp (RFC 3339)
    pub timestamp: String,
    /// Source dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
}

/// Metadata returned with a scan image
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanMetadata {
    /// Human readable capture date
    pub date_created: String,
    /// Capture year
    pub year: Option<i32>,
    /// Classification label
    pub classification: String,
    /// Source dimension
    pub dimension: String,
    /// Originating archive
    pub source: String,
    /// Signature code
    pub hex_code: String,
}

/// Successful scan payload
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Base64 image data
    pub image: String,
    /// Image MIME type
    pub mime_type: String,
    /// Descriptive metadata
    #[serde(default)]
    pub metadata: ScanMetadata,
}

impl ScanResult {
    /// Inline image marker understood by surfaces
    #[must_use]
    pub fn image_marker(&self) -> String {
        format!("[IMAGE:data:{};base64,{}]", self.mime_type, self.image)
    }
}

/// An outstanding scan
pub trait PendingScan: Send {
    /// The outcome once settled; `None` while still running
    ///
    /// Returns `Some` at most once.
    fn poll_settled(&mut self) -> Option<Result<ScanResult, BackendError>>;
}

/// Starts scans
pub trait ScanClient: Send + Sync {
    /// Begin a scan without waiting for it
    fn start(&self, request: ScanRequest) -> Box<dyn PendingScan>;
}

/// Limit on establishing the connection to the scan endpoint
pub const SCAN_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Scan client posting JSON to an HTTP endpoint
#[derive(Clone, Debug)]
pub struct HttpScanClient {
    endpoint: Option<String>,
    http_client: reqwest::Client,
}

impl HttpScanClient {
    /// Client for `endpoint`; `None` makes every scan fail as unconfigured
    pub fn new(endpoint: Option<String>) -> Self {
        Self::with_connect_timeout(endpoint, SCAN_CONNECT_TIMEOUT)
    }

    /// Client whose connection attempts give up after `connect_timeout`
    pub fn with_connect_timeout(endpoint: Option<String>, connect_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            endpoint,
            http_client,
        }
    }

    async fn fetch(
        http_client: reqwest::Client,
        endpoint: String,
        request: ScanRequest,
    ) -> Result<ScanResult, BackendError> {
        let response = http_client.post(&endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let result: ScanResult = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        if result.image.is_empty() {
            return Err(BackendError::Malformed("empty image".to_string()));
        }
        Ok(result)
    }
}

impl ScanClient for HttpScanClient {
    fn start(&self, request: ScanRequest) -> Box<dyn PendingScan> {
        let Some(endpoint) = self.endpoint.clone() else {
            return Box::new(Settled(Some(Err(BackendError::NotConfigured(
                "scan endpoint",
            )))));
        };
        let handle = tokio::spawn(Self::fetch(self.http_client.clone(), endpoint, request));
        Box::new(SpawnedScan {
            handle: Some(handle),
        })
    }
}

/// Scan that settled immediately
struct Settled(Option<Result<ScanResult, BackendError>>);

impl PendingScan for Settled {
    fn poll_settled(&mut self) -> Option<Result<ScanResult, BackendError>> {
        self.0.take()
    }
}

/// Scan running on a tokio task
struct SpawnedScan {
    handle: Option<JoinHandle<Result<ScanResult, BackendError>>>,
}

impl PendingScan for SpawnedScan {
    fn poll_settled(&mut self) -> Option<Result<ScanResult, BackendError>> {
        let handle = self.handle.as_mut()?;
        let joined = handle.now_or_never()?;
        self.handle = None;
        Some(joined.unwrap_or_else(|e| Err(BackendError::Request(e.to_string()))))
    }
}

impl Drop for SpawnedScan {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_parses_camel_case() {
        let result: ScanResult = serde_json::from_str(
            r#"{"image":"AAAA","mimeType":"image/png","metadata":{"dateCreated":"1999-01-01","year":1999,"hexCode":"0x16"}}"#,
        )
        .unwrap();
        assert_eq!(result.metadata.year, Some(1999));
        assert_eq!(result.metadata.hex_code, "0x16");
        assert_eq!(result.image_marker(), "[IMAGE:data:image/png;base64,AAAA]");
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = ScanRequest {
            target: "sector 7".to_string(),
            classification: "CLASSIFIED".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            dimension: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["target"], "sector 7");
        assert!(json.get("dimension").is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_client_settles_with_error() {
        let client = HttpScanClient::new(None);
        let mut pending = client.start(ScanRequest {
            target: "x".to_string(),
            classification: "CLASSIFIED".to_string(),
            timestamp: String::new(),
            dimension: None,
        });
        assert!(matches!(
            pending.poll_settled(),
            Some(Err(BackendError::NotConfigured(_)))
        ));
        assert!(pending.poll_settled().is_none());
    }

    #[tokio::test]
    async fn test_slow_server_is_not_cut_off() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/scan", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = HttpScanClient::with_connect_timeout(Some(url), Duration::from_millis(100));
        let mut pending = client.start(ScanRequest {
            target: "vault".to_string(),
            classification: "CLASSIFIED".to_string(),
            timestamp: String::new(),
            dimension: None,
        });

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(pending.poll_settled().is_none());
        server.abort();
    }
}
