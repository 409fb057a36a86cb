//! HTTP client for the greenhouse backend

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::{
    ApiError, ApiResponse, ControlRequest, EnvironmentSample, Greenhouse, GreenhouseDetail,
};
use crate::control::{ControlAck, ControlCommand, ControlError, ControlSink};
use crate::zone::GreenhouseSnapshot;

/// Thin REST client; every call returns the unwrapped `data` of the envelope
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://10.0.0.5:8080/api`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send `request` and decode the envelope, failing on non-success status
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!("Backend rejected credentials");
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            warn!(status = %status, "Backend returned non-success status");
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        self.execute(self.http.get(self.url(path))).await?.into_result()
    }

    pub async fn greenhouses(&self) -> Result<Vec<Greenhouse>, ApiError> {
        self.get("/devices/greenhouses").await
    }

    pub async fn greenhouse_detail(&self, greenhouse_id: &str) -> Result<GreenhouseDetail, ApiError> {
        self.get(&format!("/devices/greenhouses/{}/detail", greenhouse_id))
            .await
    }

    /// Environment history for one greenhouse, oldest sample first
    pub async fn environment(&self, greenhouse_id: &str) -> Result<Vec<EnvironmentSample>, ApiError> {
        debug!(greenhouse_id, "GET environment");
        let request = self
            .http
            .get(self.url("/data/environment"))
            .query(&[("greenhouseId", greenhouse_id)]);
        self.execute(request).await?.into_result()
    }

    /// Fetch the zone/actuator snapshot for one greenhouse.
    ///
    /// Readings come from the newest environment sample. Missing environment
    /// data is not fatal; zones are returned without ambient readings.
    pub async fn snapshot(&self, greenhouse_id: &str) -> Result<GreenhouseSnapshot, ApiError> {
        let detail = self.greenhouse_detail(greenhouse_id).await?;
        let latest = match self.environment(greenhouse_id).await {
            Ok(mut samples) => samples.pop(),
            Err(e) => {
                warn!(greenhouse_id, error = %e, "No environment data, zones will lack readings");
                None
            }
        };
        Ok(detail.into_snapshot(latest.as_ref()))
    }

    pub async fn control_device(
        &self,
        device_id: &str,
        request: &ControlRequest,
    ) -> Result<String, ApiError> {
        debug!(device_id, action = ?request.action, "POST control");
        let url = self.url(&format!("/devices/{}/control", device_id));
        let envelope: ApiResponse<String> = self.execute(self.http.post(url).json(request)).await?;
        // Some deployments acknowledge with `data: null` and the text in `msg`
        match envelope.into_result() {
            Err(ApiError::MissingData) => Ok(String::new()),
            other => other,
        }
    }
}

impl ControlSink for ApiClient {
    async fn issue_control(&self, command: &ControlCommand) -> Result<ControlAck, ControlError> {
        let request = ControlRequest::from(command);
        match self.control_device(&command.actuator_id, &request).await {
            Ok(message) => Ok(ControlAck {
                actuator_id: command.actuator_id.clone(),
                message,
            }),
            Err(ApiError::Backend { code, msg }) => Err(ControlError::Rejected { code, message: msg }),
            Err(e) => Err(ControlError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlAction;
    use crate::zone::ZoneStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one connection per canned `(status line, body)` pair and
    /// collect each request as "METHOD target"
    async fn serve(responses: Vec<(&'static str, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                let header_end = loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    assert!(n > 0, "connection closed before headers");
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let content_length = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < header_end + content_length {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }

                let request_line = head.lines().next().unwrap_or_default();
                let target: Vec<&str> = request_line.split_whitespace().take(2).collect();
                seen.push(target.join(" "));

                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            seen
        });
        (base, server)
    }

    #[test]
    fn test_base_url_normalized() {
        let client = ApiClient::new("http://localhost:8080/api/");
        assert_eq!(client.base_url(), "http://localhost:8080/api");
        assert_eq!(
            client.url("/devices/greenhouses"),
            "http://localhost:8080/api/devices/greenhouses"
        );
    }

    #[tokio::test]
    async fn test_snapshot_uses_backend_routes() {
        let (base, server) = serve(vec![
            (
                "200 OK",
                r#"{"code":200,"msg":"ok","data":[{"id":"gh_001","name":"East","crop":"Tomato","status":"NORMAL","healthScore":90}]}"#,
            ),
            (
                "200 OK",
                r#"{"code":200,"msg":"ok","data":{"info":{"id":"gh_001","name":"East","crop":"Tomato","status":"NORMAL","healthScore":90},"zones":[{"zone":{"id":"z1","name":"Bed 1","status":"WARNING"}}]}}"#,
            ),
            (
                "200 OK",
                r#"{"code":200,"msg":"ok","data":[{"time":"09:00","temp":21.0,"humidity":55.0,"light":300,"co2":410,"voltage":3.3},{"time":"10:00","temp":23.5,"humidity":61.0,"light":420,"co2":400,"voltage":3.3}]}"#,
            ),
        ])
        .await;

        let client = ApiClient::new(base).with_token("secret");
        let greenhouses = client.greenhouses().await.unwrap();
        assert_eq!(greenhouses[0].id, "gh_001");
        let snapshot = client.snapshot("gh_001").await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            vec![
                "GET /api/devices/greenhouses",
                "GET /api/devices/greenhouses/gh_001/detail",
                "GET /api/data/environment?greenhouseId=gh_001",
            ]
        );
        let zone = &snapshot.zones[0];
        assert_eq!(zone.status, ZoneStatus::Warning);
        assert_eq!(zone.temperature, Some(23.5));
        assert_eq!(zone.moisture, Some(61.0));
    }

    #[tokio::test]
    async fn test_control_posts_to_device_route() {
        let (base, server) = serve(vec![(
            "200 OK",
            r#"{"code":200,"msg":"ok","data":"Pump started"}"#,
        )])
        .await;

        let client = ApiClient::new(base);
        let command = ControlCommand::new("pump-1", ControlAction::Irrigation, 300).unwrap();
        let ack = client.issue_control(&command).await.unwrap();

        assert_eq!(ack.message, "Pump started");
        assert_eq!(server.await.unwrap(), vec!["POST /api/devices/pump-1/control"]);
    }

    #[tokio::test]
    async fn test_http_status_is_reported() {
        let (base, server) = serve(vec![
            ("401 Unauthorized", "<html>login required</html>"),
            ("500 Internal Server Error", "<html>oops</html>"),
        ])
        .await;

        let client = ApiClient::new(base);
        let unauthorized = client.greenhouses().await.unwrap_err();
        assert!(matches!(unauthorized, ApiError::Unauthorized));
        assert!(unauthorized.to_string().contains("401"));

        let failed = client.greenhouse_detail("gh_001").await.unwrap_err();
        assert!(matches!(failed, ApiError::Status { status: 500 }));
        assert!(failed.to_string().contains("500"));
        server.await.unwrap();
    }
}
