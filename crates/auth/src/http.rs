use crate::error::AuthResult;
use reqwest::{redirect, Client};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

/// Client for the token and vehicle endpoints.
pub fn api_client(user_agent: &str) -> Client {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Client for one login attempt: its own cookie jar, and redirects are only
/// followed while they stay on http(s). A redirect to any other scheme is
/// handed back as the 3xx response so its `Location` can be read.
pub fn login_client(user_agent: &str) -> AuthResult<Client> {
    let policy = redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if matches!(attempt.url().scheme(), "http" | "https") {
            attempt.follow()
        } else {
            attempt.stop()
        }
    });

    Ok(Client::builder()
        .user_agent(user_agent)
        .cookie_store(true)
        .redirect(policy)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}
