use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::time::Duration;

use crate::error::CaptureError;

/// The remote device's own view of whether it is ready to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Stopped,
    Started,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Stopped => f.write_str("STOPPED"),
            DeviceState::Started => f.write_str("STARTED"),
        }
    }
}

/// Operations the capture session needs from the remote camera.
///
/// Every call is a live round trip; implementations must not cache state.
#[async_trait]
pub trait RemoteDevice: Send {
    async fn get_armed_state(&mut self) -> Result<DeviceState, CaptureError>;

    async fn set_armed_state(&mut self, target: DeviceState) -> Result<(), CaptureError>;

    /// Returns `Ok(None)` when the device answered but had no image to give.
    async fn capture_color_image(&mut self) -> Result<Option<Vec<u8>>, CaptureError>;
}

/// Parses the `/state/started` body, tolerating trailing whitespace only.
pub fn parse_armed_state(body: &[u8]) -> Result<DeviceState, CaptureError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| CaptureError::Transport("armed state body is not UTF-8".to_string()))?;

    match text.trim_end() {
        "true" => Ok(DeviceState::Started),
        "false" => Ok(DeviceState::Stopped),
        other => Err(CaptureError::Transport(format!(
            "unexpected armed state body: {:?}",
            other
        ))),
    }
}

/// HTTP client for the capture device API on `host:port`.
pub struct HttpDeviceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceClient {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, CaptureError> {
        Self::with_base_url(&format!("http://{}:{}", host, port), timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaptureError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, CaptureError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        debug!("GET {} -> {}", url, response.status());
        Ok(response)
    }
}

#[async_trait]
impl RemoteDevice for HttpDeviceClient {
    async fn get_armed_state(&mut self) -> Result<DeviceState, CaptureError> {
        let response = self.get("/state/started").await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::Transport(format!(
                "state query failed with status {}",
                status
            )));
        }

        let body = response.bytes().await?;
        parse_armed_state(&body)
    }

    async fn set_armed_state(&mut self, target: DeviceState) -> Result<(), CaptureError> {
        let path = match target {
            DeviceState::Started => "/state/start",
            DeviceState::Stopped => "/state/stop",
        };

        let response = self.get(path).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::Transport(format!(
                "setting state {} failed with status {}",
                target, status
            )));
        }
        Ok(())
    }

    async fn capture_color_image(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        let response = self.get("/color/image").await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("Image request answered with status {}", status);
            return Ok(None);
        }

        let body = response.bytes().await?;
        Ok(Some(body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> HttpDeviceClient {
        HttpDeviceClient::with_base_url(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_armed_state() {
        assert_eq!(parse_armed_state(b"true\n").unwrap(), DeviceState::Started);
        assert_eq!(parse_armed_state(b"false\n").unwrap(), DeviceState::Stopped);
        assert_eq!(parse_armed_state(b"true").unwrap(), DeviceState::Started);
        assert_eq!(parse_armed_state(b"false \r\n").unwrap(), DeviceState::Stopped);
    }

    #[test]
    fn test_parse_armed_state_is_exact() {
        assert!(parse_armed_state(b"True\n").is_err());
        assert!(parse_armed_state(b" true\n").is_err());
        assert!(parse_armed_state(b"1\n").is_err());
        assert!(parse_armed_state(b"").is_err());
    }

    #[test]
    fn test_base_url_from_host_and_port() {
        let client = HttpDeviceClient::new("127.0.0.1", 5016, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5016");
    }

    #[tokio::test]
    async fn get_armed_state_started() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/state/started")
            .with_status(200)
            .with_body("true\n")
            .create_async()
            .await;

        let mut client = client_for(&server);
        assert_eq!(client.get_armed_state().await.unwrap(), DeviceState::Started);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_armed_state_non_success_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/state/started")
            .with_status(500)
            .create_async()
            .await;

        let mut client = client_for(&server);
        let err = client.get_armed_state().await.unwrap_err();
        assert!(matches!(err, CaptureError::Transport(_)));
    }

    #[tokio::test]
    async fn set_armed_state_hits_matching_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let start = server
            .mock("GET", "/state/start")
            .with_status(200)
            .create_async()
            .await;
        let stop = server
            .mock("GET", "/state/stop")
            .with_status(200)
            .create_async()
            .await;

        let mut client = client_for(&server);
        client.set_armed_state(DeviceState::Started).await.unwrap();
        client.set_armed_state(DeviceState::Stopped).await.unwrap();
        start.assert_async().await;
        stop.assert_async().await;
    }

    #[tokio::test]
    async fn set_armed_state_failure_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/state/start")
            .with_status(503)
            .create_async()
            .await;

        let mut client = client_for(&server);
        let result = client.set_armed_state(DeviceState::Started).await;
        assert!(matches!(result, Err(CaptureError::Transport(_))));
    }

    #[tokio::test]
    async fn capture_returns_body_bytes() {
        let mut server = mockito::Server::new_async().await;
        let payload = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4, 0xFF, 0xD9];
        let _mock = server
            .mock("GET", "/color/image")
            .with_status(200)
            .with_body(payload.clone())
            .create_async()
            .await;

        let mut client = client_for(&server);
        let image = client.capture_color_image().await.unwrap();
        assert_eq!(image, Some(payload));
    }

    #[tokio::test]
    async fn capture_non_success_is_no_image() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/color/image")
            .with_status(404)
            .create_async()
            .await;

        let mut client = client_for(&server);
        assert_eq!(client.capture_color_image().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreachable_device_is_transport_error() {
        // Nothing listens on the discard port of localhost in the test environment.
        let mut client =
            HttpDeviceClient::with_base_url("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = client.capture_color_image().await;
        assert!(matches!(result, Err(CaptureError::Transport(_))));
    }
}
