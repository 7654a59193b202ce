use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult, FlowError};
use crate::http;
use crate::tokens::TokenStore;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// Sends requests with the cached bearer token. A 401 triggers one token
/// refresh and exactly one retry; whatever the retry returns is final.
pub struct AuthenticatedClient {
    http: Client,
    tokens: TokenStore,
}

impl AuthenticatedClient {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self::with_store(
            http::api_client(&config.user_agent),
            TokenStore::open(config)?,
        ))
    }

    pub fn with_store(http: Client, tokens: TokenStore) -> Self {
        Self { http, tokens }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub async fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> AuthResult<Response> {
        let token = self.tokens.get_access_token().await?;
        let mut response = self.send(&method, url, &headers, body, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("401 Unauthorized (access token has probably expired)");
            let token = self
                .tokens
                .refresh()
                .await?
                .access_token()
                .map(String::from)
                .ok_or(FlowError::MissingToken("accessToken"))?;
            response = self.send(&method, url, &headers, body, &token).await?;
        }

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(response)
        } else {
            Err(AuthError::transport(&response))
        }
    }

    pub async fn get_json(&mut self, url: &str, headers: HeaderMap) -> AuthResult<Value> {
        let response = self.request(Method::GET, url, headers, None).await?;
        Ok(response.json().await?)
    }

    /// POSTs and decodes the reply. An empty body decodes to `Value::Null`.
    pub async fn post_json(
        &mut self,
        url: &str,
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> AuthResult<Value> {
        let response = self.request(Method::POST, url, headers, body).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&Value>,
        token: &str,
    ) -> AuthResult<Response> {
        debug!(%method, url, "Sending authenticated request");
        let mut request = self
            .http
            .request(method.clone(), url)
            .headers(headers.clone())
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::auth_config;
    use crate::tokens::TokenSet;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with_tokens(server: &MockServer, dir: &TempDir) -> AuthenticatedClient {
        let cfg = auth_config(&server.uri(), dir.path().join("tokens.json"));
        let seeded: TokenSet =
            serde_json::from_value(json!({"accessToken": "expired", "refreshToken": "r-1"}))
                .expect("token set");
        seeded.save(&cfg.token_file).expect("seed");
        AuthenticatedClient::new(&cfg).expect("client")
    }

    async fn mount_refresh(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/refresh/v1"))
            .and(header("Authorization", "Bearer r-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"accessToken": "renewed", "refreshToken": "r-2"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn unauthorized_is_retried_once_after_refresh() {
        let server = MockServer::start().await;
        let dir = TempDir::new().expect("tempdir");
        mount_refresh(&server).await;

        Mock::given(method("GET"))
            .and(path("/vehicles"))
            .and(header("Authorization", "Bearer expired"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vehicles"))
            .and(header("Authorization", "Bearer renewed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_with_tokens(&server, &dir);
        let body = client
            .get_json(&format!("{}/vehicles", server.uri()), HeaderMap::new())
            .await
            .expect("vehicles");

        assert_eq!(body, json!({"data": []}));
        assert_eq!(client.tokens().tokens().refresh_token(), Some("r-2"));
    }

    #[tokio::test]
    async fn second_unauthorized_is_final() {
        let server = MockServer::start().await;
        let dir = TempDir::new().expect("tempdir");
        mount_refresh(&server).await;

        Mock::given(method("GET"))
            .and(path("/vehicles"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let mut client = client_with_tokens(&server, &dir);
        let err = client
            .get_json(&format!("{}/vehicles", server.uri()), HeaderMap::new())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let server = MockServer::start().await;
        let dir = TempDir::new().expect("tempdir");

        Mock::given(method("POST"))
            .and(path("/vehicles/VIN/charging/start"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_with_tokens(&server, &dir);
        let err = client
            .post_json(
                &format!("{}/vehicles/VIN/charging/start", server.uri()),
                HeaderMap::new(),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(client.tokens().tokens().access_token(), Some("expired"));
    }

    #[tokio::test]
    async fn empty_post_reply_is_null() {
        let server = MockServer::start().await;
        let dir = TempDir::new().expect("tempdir");

        Mock::given(method("POST"))
            .and(path("/noop"))
            .and(header("Authorization", "Bearer expired"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut client = client_with_tokens(&server, &dir);
        let reply = client
            .post_json(&format!("{}/noop", server.uri()), HeaderMap::new(), None)
            .await
            .expect("reply");
        assert_eq!(reply, Value::Null);
    }
}
