use anyhow::{Context, Result};
use carlink_auth::{AuthConfig, Credentials};
use carlink_vehicle::VehicleConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "CARLINK_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user: UserConfig,
    pub car: CarConfig,
    pub url: UrlConfig,
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CarConfig {
    pub vin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    pub login: String,
    pub identity: String,
    pub api: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub token_file: PathBuf,
    pub vehicle_status_file: String,
    pub vehicles_file: String,
    pub report_file: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            login: "https://login.apps.emea.vwapps.io".to_string(),
            identity: "https://identity.vwgroup.io".to_string(),
            api: "https://mobileapi.apps.emea.vwapps.io".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0"
                .to_string(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("tokens.json"),
            vehicle_status_file: "status/vehicle_status_%Y%m%d_%H%M%S.json".to_string(),
            vehicles_file: "status/vehicles_%Y%m%d_%H%M%S.json".to_string(),
            report_file: PathBuf::from("reports/charge_report.csv"),
            log_file: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the config file (if any) and applies environment overrides.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match config_path(explicit) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// `CARLINK_EMAIL`, `CARLINK_PASSWORD` and `CARLINK_VIN` win over the file.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(email) = non_empty("CARLINK_EMAIL") {
            self.user.email = email;
        }
        if let Some(password) = non_empty("CARLINK_PASSWORD") {
            self.user.password = password;
        }
        if let Some(vin) = non_empty("CARLINK_VIN") {
            self.car.vin = vin;
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            credentials: Credentials::new(self.user.email.clone(), self.user.password.clone()),
            login_url: self.url.login.clone(),
            identity_url: self.url.identity.clone(),
            user_agent: self.url.user_agent.clone(),
            token_file: self.settings.token_file.clone(),
        }
    }

    pub fn vehicle_config(&self) -> VehicleConfig {
        VehicleConfig {
            api_url: self.url.api.clone(),
            vehicle_status_file: self.settings.vehicle_status_file.clone(),
            vehicles_file: self.settings.vehicles_file.clone(),
        }
    }
}

/// `--config`, then `CARLINK_CONFIG`, then `./config.toml`, then the platform
/// config directory. `None` when nothing exists and nothing was asked for.
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from("config.toml");
    if local.is_file() {
        return Some(local);
    }
    ProjectDirs::from("com", "carlink", "carlink")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .filter(|path| path.is_file())
}
