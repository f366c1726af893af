use reqwest::{Client, Method, StatusCode, header::HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::envelope::ApiEnvelope;
use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::observability::inject_trace_headers;

/// A backend call described independently of any attempt to send it, so the
/// refresh wrapper can replay it verbatim.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Plain client for the `/api/v1` backend: one attempt per call, no token handling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    settings: ApiSettings,
}

impl ApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// Send one attempt of `request` and decode the envelope's `data` as `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
        request_id: &str,
    ) -> Result<T, ApiError> {
        let url = self.url(&request.path);

        let mut headers = HeaderMap::new();
        inject_trace_headers(&mut headers, request_id);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(
                method = %request.method,
                url = %url,
                request_id = %request_id,
                error = %e,
                "Backend request failed"
            );
            ApiError::from(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await?;

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            request_id = %request_id,
            "Backend responded"
        );

        decode_envelope(status, &bytes)
    }
}

fn decode_envelope<T: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<T, ApiError> {
    let envelope = serde_json::from_slice::<ApiEnvelope<Value>>(bytes).ok();

    if !status.is_success() {
        let message = envelope
            .and_then(|e| e.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        return Err(ApiError::from_status(status, message));
    }

    let envelope = envelope
        .ok_or_else(|| ApiError::Decode("response body is not an API envelope".to_string()))?;

    if !envelope.success {
        let message = envelope
            .message
            .unwrap_or_else(|| "request rejected".to_string());
        return Err(ApiError::BadRequest(message));
    }

    serde_json::from_value(envelope.data.unwrap_or(Value::Null))
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserIdentity;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(ApiSettings::with_base_url(format!("{}/api/v1", server.uri()))).unwrap()
    }

    #[tokio::test]
    async fn test_send_attaches_bearer_and_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .and(header("authorization", "Bearer tok-abc"))
            .and(header_exists("x-request-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"id": 7, "nickname": "김아빠"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user: UserIdentity = client_for(&server)
            .send(&ApiRequest::get("/users/me"), Some("tok-abc"), "req-1")
            .await
            .unwrap();

        assert_eq!(user.id, 7);
        assert_eq!(user.nickname, "김아빠");
        assert!(user.family_id.is_none());
    }

    #[tokio::test]
    async fn test_error_status_uses_envelope_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/families"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "success": false,
                "message": "Family name already exists",
                "code": "FAMILY_DUPLICATE"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send::<Value>(
                &ApiRequest::post("/families", json!({"name": "Kims"})),
                Some("tok"),
                "req-2",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Conflict(m) if m == "Family name already exists"));
    }

    #[tokio::test]
    async fn test_non_envelope_error_body_falls_back_to_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send::<Value>(&ApiRequest::get("/users/me"), None, "req-3")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Server(m) if m == "Internal Server Error"));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(3))
                    .set_body_json(json!({"success": true})),
            )
            .mount(&server)
            .await;

        let settings = ApiSettings {
            request_timeout_secs: 1,
            ..ApiSettings::with_base_url(format!("{}/api/v1", server.uri()))
        };
        let err = ApiClient::new(settings)
            .unwrap()
            .send::<Value>(&ApiRequest::get("/users/me"), None, "req-4")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Timeout));
    }

    #[test]
    fn test_success_false_is_rejected() {
        let err = decode_envelope::<Value>(
            StatusCode::OK,
            br#"{"success":false,"message":"nope"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "nope"));
    }

    #[test]
    fn test_empty_data_decodes_to_unit() {
        decode_envelope::<()>(StatusCode::OK, br#"{"success":true}"#).unwrap();
    }
}
