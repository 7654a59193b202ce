use crate::config::{AuthConfig, Credentials};
use crate::error::{ensure_success, AuthError, AuthResult, FlowError};
use crate::http;
use crate::login::LoginFlow;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Provider-issued token bag. Stored verbatim, so fields this crate does not
/// know about survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSet(Map<String, Value>);

impl TokenSet {
    pub fn access_token(&self) -> Option<&str> {
        self.non_empty("accessToken")
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.non_empty("refreshToken")
    }

    pub fn id_token(&self) -> Option<&str> {
        self.non_empty("idToken")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Reads a token file. `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> AuthResult<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let data = fs::read_to_string(path).map_err(|source| token_file_error(path, source))?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Writes the set next to `path` and renames it into place, so a crash
    /// mid-write never leaves a truncated token file behind.
    pub fn save(&self, path: &Path) -> AuthResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomically(path, &json).map_err(|source| token_file_error(path, source))
    }
}

fn token_file_error(path: &Path, source: std::io::Error) -> AuthError {
    AuthError::TokenFile {
        path: path.display().to_string(),
        source,
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&tmp_path, perms)?;
    }
    drop(file);

    fs::rename(&tmp_path, path)
}

/// Owns the current [`TokenSet`] and the token file, fetching tokens through
/// the web login when none are cached.
pub struct TokenStore {
    path: PathBuf,
    tokens: TokenSet,
    credentials: Credentials,
    flow: LoginFlow,
    http: Client,
    refresh_url: String,
}

impl TokenStore {
    /// Builds the store and loads the token file if one exists.
    pub fn open(config: &AuthConfig) -> AuthResult<Self> {
        let tokens = match TokenSet::load(&config.token_file)? {
            Some(tokens) => {
                info!("Retrieving tokens from file: {}", config.token_file.display());
                tokens
            }
            None => TokenSet::default(),
        };

        Ok(Self {
            path: config.token_file.clone(),
            tokens,
            credentials: config.credentials.clone(),
            flow: LoginFlow::new(config),
            http: http::api_client(&config.user_agent),
            refresh_url: config.login_endpoint("/refresh/v1"),
        })
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached access token, logging in first when there is none.
    pub async fn get_access_token(&mut self) -> AuthResult<String> {
        if let Some(token) = self.tokens.access_token() {
            return Ok(token.to_string());
        }
        self.login().await?;
        self.tokens
            .access_token()
            .map(String::from)
            .ok_or_else(|| FlowError::MissingToken("accessToken").into())
    }

    pub fn get_refresh_token(&self) -> AuthResult<&str> {
        self.tokens.refresh_token().ok_or(AuthError::TokenMissing)
    }

    /// Runs the full web login and replaces the cached set with its result.
    pub async fn login(&mut self) -> AuthResult<&TokenSet> {
        let tokens = self.flow.perform_login(&self.credentials).await?;
        self.replace(tokens)
    }

    /// Mints new tokens from the refresh token. The response replaces the whole
    /// set; nothing from the previous set is merged back in.
    pub async fn refresh(&mut self) -> AuthResult<&TokenSet> {
        info!("Refreshing tokens using web api");
        let refresh_token = self.get_refresh_token()?.to_string();

        let response = self
            .http
            .get(&self.refresh_url)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(refresh_token)
            .send()
            .await?;
        let tokens: TokenSet = ensure_success(response)?.json().await?;
        self.replace(tokens)
    }

    /// Forgets the cached tokens and removes the token file.
    pub fn clear(&mut self) -> AuthResult<()> {
        self.tokens = TokenSet::default();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(token_file_error(&self.path, source)),
        }
    }

    fn replace(&mut self, tokens: TokenSet) -> AuthResult<&TokenSet> {
        tokens.save(&self.path)?;
        info!("Tokens stored in {}", self.path.display());
        self.tokens = tokens;
        Ok(&self.tokens)
    }
}
