//! Scripted browser login against the identity provider.
//!
//! The provider only offers an interactive web login. [`LoginFlow`] walks it the
//! way a browser would: fetch the authorize page, post the email, post the
//! password, then pick the tokens out of the redirect to the app's custom scheme
//! and trade them for an access/refresh token pair.

use crate::config::{AuthConfig, Credentials};
use crate::error::{ensure_success, redacted_url, AuthError, AuthResult, FlowError};
use crate::form::{resolve_action, Form, ScriptValues};
use crate::http;
use crate::tokens::TokenSet;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method, Response};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use url::Url;

pub const REDIRECT_URI: &str = "weconnect://authenticated";
const REGION: &str = "emea";

const IDENTITY_FORM_ID: &str = "emailPasswordForm";
const CREDENTIALS_FORM_ID: &str = "credentialsForm";
const IDENTIFIER_PATH: &str = "/login/identifier";
const AUTHENTICATE_PATH: &str = "/login/authenticate";

/// Parameters the provider passes back in the fragment of the app redirect.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectFragment {
    pub state: String,
    pub id_token: String,
    pub access_token: String,
    pub code: String,
}

impl RedirectFragment {
    pub fn parse(location: &str) -> AuthResult<Self> {
        let url = Url::parse(location)?;
        let params: HashMap<String, String> = url::form_urlencoded::parse(
            url.fragment().unwrap_or_default().as_bytes(),
        )
        .into_owned()
        .collect();

        let take = |key: &'static str| -> Result<String, FlowError> {
            params
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(FlowError::MissingFragment(key))
        };

        Ok(Self {
            state: take("state")?,
            id_token: take("id_token")?,
            access_token: take("access_token")?,
            code: take("code")?,
        })
    }
}

/// Drives one scripted login per call. Holds no session state between calls.
#[derive(Debug, Clone)]
pub struct LoginFlow {
    login_url: String,
    identity_url: String,
    user_agent: String,
}

/// Ephemeral state of a single login attempt.
struct LoginSession {
    client: Client,
}

impl LoginFlow {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            login_url: config.login_url.trim_end_matches('/').to_string(),
            identity_url: config.identity_url.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub async fn perform_login(&self, credentials: &Credentials) -> AuthResult<TokenSet> {
        info!("Retrieving tokens using web login");
        let session = LoginSession {
            client: http::login_client(&self.user_agent)?,
        };

        let login_page = self.initiate(&session).await?;
        let (identity_form, identity_url, password_page) =
            self.identify(&session, &login_page, credentials).await?;
        let response = self
            .authenticate(
                &session,
                identity_form,
                &identity_url,
                &password_page,
                credentials,
            )
            .await?;
        let fragment = observe_redirect(response).await?;
        self.exchange(&session, fragment).await
    }

    async fn initiate(&self, session: &LoginSession) -> AuthResult<String> {
        let nonce = generate_nonce();
        info!("Fetching login page");
        let response = session
            .client
            .get(format!("{}/authorize", self.login_url))
            .query(&[("nonce", nonce.as_str()), ("redirect_uri", REDIRECT_URI)])
            .send()
            .await?;
        Ok(ensure_success(response)?.text().await?)
    }

    async fn identify(
        &self,
        session: &LoginSession,
        login_page: &str,
        credentials: &Credentials,
    ) -> AuthResult<(Form, Url, String)> {
        let mut form = Form::find(login_page, IDENTITY_FORM_ID)
            .ok_or(FlowError::MissingForm(IDENTITY_FORM_ID))?;
        let action = form
            .action
            .clone()
            .ok_or(FlowError::MissingAction(IDENTITY_FORM_ID))?;
        let target = resolve_action(&self.identity_url, &action)?;

        form.set("email", credentials.email.as_str());
        form.set("registerFlow", "false");
        debug!(fields = ?form.field_names(), %target, "Identity form");

        info!("Submitting email as identity");
        let response = form.submit(&session.client, target.clone()).await?;
        let page = ensure_success(response)?.text().await?;
        Ok((form, target, page))
    }

    async fn authenticate(
        &self,
        session: &LoginSession,
        identity_form: Form,
        identity_target: &Url,
        password_page: &str,
        credentials: &Credentials,
    ) -> AuthResult<Response> {
        let script = ScriptValues::scan(password_page);

        let (mut form, target) = match Form::find(password_page, CREDENTIALS_FORM_ID) {
            Some(form) => {
                let target = match form.action.as_deref() {
                    Some(action) => {
                        authenticate_url(&resolve_action(&self.identity_url, action)?)
                    }
                    None => authenticate_url(identity_target),
                };
                (form, target)
            }
            None => {
                if script.hmac.is_none() {
                    return Err(FlowError::MissingHmac.into());
                }
                (identity_form, authenticate_url(identity_target))
            }
        };

        if let Some(hmac) = script.hmac {
            form.set("hmac", hmac);
        }
        if form.get("relayState").is_none() {
            if let Some(relay_state) = script.relay_state {
                form.set("relayState", relay_state);
            }
        }
        debug!(fields = ?form.field_names(), %target, "Credentials form");
        form.set("password", credentials.password.as_str());
        form.method = Method::POST;

        info!("Submitting password");
        form.submit(&session.client, target).await
    }

    async fn exchange(
        &self,
        session: &LoginSession,
        fragment: RedirectFragment,
    ) -> AuthResult<TokenSet> {
        let body = json!({
            "state": fragment.state,
            "id_token": fragment.id_token,
            "redirect_uri": REDIRECT_URI,
            "region": REGION,
            "access_token": fragment.access_token,
            "authorizationCode": fragment.code,
        });

        info!("Fetching access and refresh tokens");
        let response = session
            .client
            .post(format!("{}/login/v1", self.login_url))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        let tokens: TokenSet = ensure_success(response)?.json().await?;
        Ok(tokens)
    }
}

/// The password step must end in a redirect to [`REDIRECT_URI`]. That URI is
/// never fetched; its fragment carries the values for the token exchange.
async fn observe_redirect(response: Response) -> AuthResult<RedirectFragment> {
    let status = response.status();

    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if location.starts_with(REDIRECT_URI) {
            return RedirectFragment::parse(location);
        }
        warn!(%status, location, "Redirect to an unexpected location");
        return Err(FlowError::UnexpectedStage { status }.into());
    }

    if status.is_success() {
        let url = redacted_url(response.url());
        let page = response.text().await?;
        match Form::find(&page, IDENTITY_FORM_ID) {
            Some(form) => warn!(fields = ?form.field_names(), "Terms and conditions form"),
            None => warn!("Unexpected stage within the login process"),
        }
        return Err(FlowError::TermsAcceptanceRequired { url }.into());
    }

    Err(AuthError::transport(&response))
}

fn authenticate_url(identity_target: &Url) -> Url {
    let mut url = identity_target.clone();
    let path = url.path().to_string();
    if path.contains(IDENTIFIER_PATH) {
        url.set_path(&path.replace(IDENTIFIER_PATH, AUTHENTICATE_PATH));
    } else if !path.contains(AUTHENTICATE_PATH) {
        url.set_path(&format!("{}{}", path.trim_end_matches('/'), AUTHENTICATE_PATH));
    }
    url
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
