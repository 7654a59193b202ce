//! Fake identity provider pages shared by the unit tests.

use crate::config::{AuthConfig, Credentials};
use serde_json::Value;
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub(crate) const IDENTITY_ACTION: &str = "/signin-service/v1/client/login/identifier";
pub(crate) const AUTHENTICATE_ACTION: &str = "/signin-service/v1/client/login/authenticate";

pub(crate) const PASSWORD_PAGE: &str = r#"<html><head><script>
    window._IDK = {
      templateModel: {"hmac":"hmac-password","relayState":"relay-1","postAction":"login/authenticate"}
    };
  </script></head><body></body></html>"#;

pub(crate) const APP_REDIRECT: &str = "weconnect://authenticated#state=st-1&id_token=id-1&access_token=at-1&code=code-1&token_type=bearer";

pub(crate) fn auth_config(server_uri: &str, token_file: PathBuf) -> AuthConfig {
    AuthConfig {
        credentials: Credentials::new("driver@example.com", "s3cret"),
        login_url: server_uri.to_string(),
        identity_url: server_uri.to_string(),
        user_agent: "carlink-test".to_string(),
        token_file,
    }
}

pub(crate) fn login_page() -> String {
    format!(
        r#"<html><body>
             <form id="emailPasswordForm" method="POST" action="{IDENTITY_ACTION}">
               <input type="hidden" name="_csrf" value="csrf-1">
               <input type="hidden" name="relayState" value="relay-1">
               <input type="hidden" name="hmac" value="hmac-email">
               <input type="email" name="email">
             </form>
           </body></html>"#
    )
}

/// Mounts a provider whose login succeeds and issues `tokens`. Each endpoint
/// expects exactly one call.
pub(crate) async fn mount_successful_login(server: &MockServer, tokens: Value) {
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page()))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(IDENTITY_ACTION))
        .respond_with(ResponseTemplate::new(200).set_body_string(PASSWORD_PAGE))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(AUTHENTICATE_ACTION))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", APP_REDIRECT))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens))
        .expect(1)
        .mount(server)
        .await;
}
