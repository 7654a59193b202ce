use reqwest::StatusCode;
use thiserror::Error;

/// A step of the scripted login could not find what it expected.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("form '{0}' not found in login page")]
    MissingForm(&'static str),

    #[error("form '{0}' has no action")]
    MissingAction(&'static str),

    #[error("hmac not found in login page scripts")]
    MissingHmac,

    #[error("redirect fragment is missing '{0}'")]
    MissingFragment(&'static str),

    #[error("token response lacks '{0}'")]
    MissingToken(&'static str),

    #[error("password step returned {status} without a redirect to the app scheme")]
    UnexpectedStage { status: StatusCode },

    #[error("updated terms and conditions must be accepted (page: {url})")]
    TermsAcceptanceRequired { url: String },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP {status} from {url}")]
    Transport { status: StatusCode, url: String },

    #[error("Login flow failed: {0}")]
    Flow(#[from] FlowError),

    #[error("No refresh token cached")]
    TokenMissing,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Token file {path}: {source}")]
    TokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::Transport { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                "Not authorized. Run `carlink login` to sign in again."
            }
            AuthError::Transport { .. } => "The vehicle service returned an error.",
            AuthError::Flow(FlowError::TermsAcceptanceRequired { .. }) => {
                "New terms and conditions must be accepted in the app or web portal first."
            }
            AuthError::Flow(_) => "The login page changed. The scripted login needs updating.",
            AuthError::TokenMissing => "No refresh token available. Run `carlink login`.",
            AuthError::Network(_) => "Network error. Check your connection.",
            AuthError::Url(_) => "A configured URL is invalid.",
            AuthError::TokenFile { .. } => "The token file could not be read or written.",
            AuthError::Json(_) => "Unexpected response format.",
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AuthError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn transport(response: &reqwest::Response) -> Self {
        AuthError::Transport {
            status: response.status(),
            url: redacted_url(response.url()),
        }
    }
}

/// Drops query and fragment, which may carry form fields or tokens.
pub(crate) fn redacted_url(url: &url::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Turns any non-success response into [`AuthError::Transport`].
pub(crate) fn ensure_success(response: reqwest::Response) -> AuthResult<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(AuthError::transport(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_url_drops_query_and_fragment() {
        let url = url::Url::parse("https://id.example.com/login/authenticate?email=a%40b.c&password=x#frag")
            .expect("url");
        assert_eq!(redacted_url(&url), "https://id.example.com/login/authenticate");
    }
}
