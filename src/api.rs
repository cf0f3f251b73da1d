//! REST client for the tracking backend
use reqwest::Client;
use tracing::info;

use crate::{config::ServerConfig, errors::FleetTrackerError, models::Vehicle};

/// Fetches the device listing used to seed the registry
#[derive(Debug, Clone)]
pub struct DeviceApi {
    client: Client,
    devices_url: String,
    token: String,
}

impl DeviceApi {
    pub fn new(server: &ServerConfig) -> Result<Self, FleetTrackerError> {
        let client = Client::builder()
            .user_agent(concat!("fleet-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            devices_url: server.devices_url(),
            token: server.token.clone(),
        })
    }

    /// `GET /api/devices` with the static bearer credential
    pub async fn fetch_devices(&self) -> Result<Vec<Vehicle>, FleetTrackerError> {
        info!("Fetching devices from {}", self.devices_url);
        let response = self
            .client
            .get(&self.devices_url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FleetTrackerError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.devices_url.clone(),
            });
        }

        let devices: Vec<Vehicle> = response.json().await?;
        info!("Fetched {} devices", devices.len());
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, DeviceStatus};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (host, handle)
    }

    fn server(host: String) -> ServerConfig {
        ServerConfig {
            secure: false,
            public_host: "unused.example.com".to_string(),
            local_host: host,
            token: "static-token".to_string(),
        }
    }

    #[tokio::test]
    async fn fetch_devices_sends_bearer_token() {
        let body = r#"[{"id":1,"name":"car-1","category":"car","status":"online"},
                       {"id":2,"name":"moto-2","category":"motorcycle","status":"offline"}]"#;
        let (host, handle) = serve_once("HTTP/1.1 200 OK", body).await;

        let api = DeviceApi::new(&server(host)).unwrap();
        let devices = api.fetch_devices().await.unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].category, Category::Car);
        assert_eq!(devices[1].status, DeviceStatus::Offline);

        let request = handle.await.unwrap();
        assert!(request.starts_with("GET /api/devices "));
        assert!(request
            .to_lowercase()
            .contains("authorization: bearer static-token"));
    }

    #[tokio::test]
    async fn fetch_devices_rejects_error_status() {
        let (host, _handle) = serve_once("HTTP/1.1 401 Unauthorized", "{}").await;

        let api = DeviceApi::new(&server(host)).unwrap();
        let result = api.fetch_devices().await;

        assert!(matches!(
            result,
            Err(FleetTrackerError::UnexpectedStatus { status: 401, .. })
        ));
    }
}
