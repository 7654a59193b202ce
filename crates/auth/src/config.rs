use std::fmt;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the token store and the login flow need to know about the identity provider.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub credentials: Credentials,
    /// Base of the authorize, token exchange and refresh endpoints.
    pub login_url: String,
    /// Host that serves the login forms; relative form actions resolve against it.
    pub identity_url: String,
    pub user_agent: String,
    pub token_file: PathBuf,
}

impl AuthConfig {
    pub(crate) fn login_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.login_url.trim_end_matches('/'), path)
    }
}
