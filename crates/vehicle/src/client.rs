use crate::error::VehicleResult;
use crate::schema::StatusView;
use crate::snapshot::{stamp_request_time, timestamped_path, write_snapshot};
use carlink_auth::AuthenticatedClient;
use chrono::{Local, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct VehicleConfig {
    pub api_url: String,
    /// strftime pattern for status snapshot files.
    pub vehicle_status_file: String,
    /// strftime pattern for vehicle list files.
    pub vehicles_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingAction {
    Start,
    Stop,
}

impl ChargingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargingAction::Start => "start",
            ChargingAction::Stop => "stop",
        }
    }
}

impl fmt::Display for ChargingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChargingOutcome {
    /// The status document did not report plug or charging state.
    StateUnknown,
    PlugDisconnected(String),
    AlreadySatisfied,
    Requested { request_id: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSummary {
    pub vin: String,
    pub model: String,
    pub nickname: String,
    pub role: String,
}

impl VehicleSummary {
    fn from_api(v: &Value) -> Option<Self> {
        let field = |key: &str| {
            v.get(key)
                .and_then(|f| f.as_str())
                .unwrap_or("")
                .to_string()
        };
        Some(Self {
            vin: v.get("vin")?.as_str()?.to_string(),
            model: field("model"),
            nickname: field("nickname"),
            role: field("role"),
        })
    }
}

pub struct VehicleClient {
    api: AuthenticatedClient,
    config: VehicleConfig,
}

impl VehicleClient {
    pub fn new(api: AuthenticatedClient, config: VehicleConfig) -> Self {
        Self { api, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    pub async fn list_vehicles(&mut self) -> VehicleResult<Vec<VehicleSummary>> {
        info!("Fetching vehicles");
        let url = self.url("/vehicles");
        let doc = self.api.get_json(&url, Self::json_headers()).await?;

        let path = timestamped_path(&self.config.vehicles_file, &Local::now())?;
        write_snapshot(&path, &doc)?;

        let vehicles: Vec<VehicleSummary> = doc
            .get("data")
            .and_then(|d| d.as_array())
            .map(|arr| arr.iter().filter_map(VehicleSummary::from_api).collect())
            .unwrap_or_default();

        for v in &vehicles {
            info!("model        : {}", v.model);
            info!("    nickname : {}", v.nickname);
            info!("    role     : {}", v.role);
            info!("    vin      : {}", v.vin);
        }
        Ok(vehicles)
    }

    /// Fetches the status document, stamps it with the request time and saves
    /// it as a snapshot for later reporting.
    pub async fn get_status(&mut self, vin: &str) -> VehicleResult<Value> {
        info!("Fetching vehicle status");
        let url = self.url(&format!("/vehicles/{}/status", vin));
        let mut doc = self.api.get_json(&url, Self::json_headers()).await?;
        stamp_request_time(&mut doc, Utc::now());

        let path = timestamped_path(&self.config.vehicle_status_file, &Local::now())?;
        write_snapshot(&path, &doc)?;
        info!("Status stored at: {}", path.display());

        let view = StatusView::new(&doc);
        info!("charging_state           : {}", view.render("charging_state"));
        info!("current_soc              : {}", view.render("current_soc_pct"));
        info!("car_captured_timestamp   : {}", view.render("car_captured_timestamp"));

        Ok(doc)
    }

    /// Starts or stops charging unless the car is already in the requested
    /// state or unplugged. Only [`ChargingOutcome::Requested`] sends a command.
    pub async fn set_charging(
        &mut self,
        vin: &str,
        action: ChargingAction,
    ) -> VehicleResult<ChargingOutcome> {
        let doc = self.get_status(vin).await?;
        let view = StatusView::new(&doc);

        let (Some(plug), Some(charging)) = (
            view.text("plug_connection_state"),
            view.text("charging_state"),
        ) else {
            error!("Unable to determine current connection and charging status");
            return Ok(ChargingOutcome::StateUnknown);
        };

        if plug != "connected" {
            warn!("Plug needs to be connected - currently: {}", plug);
            return Ok(ChargingOutcome::PlugDisconnected(plug.to_string()));
        }
        let is_charging = charging == "charging";
        match action {
            ChargingAction::Start if is_charging => {
                info!("Currently charging - nothing more to do");
                return Ok(ChargingOutcome::AlreadySatisfied);
            }
            ChargingAction::Stop if !is_charging => {
                info!("Not currently charging - nothing more to do");
                return Ok(ChargingOutcome::AlreadySatisfied);
            }
            _ => {}
        }

        info!("Requesting vehicle to {} charging", action);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Content-Version", HeaderValue::from_static("1"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let url = self.url(&format!("/vehicles/{}/charging/{}", vin, action));
        let reply = self.api.post_json(&url, headers, None).await?;

        let request_id = reply
            .pointer("/data/requestID")
            .or_else(|| reply.get("requestID"))
            .and_then(|v| v.as_str())
            .map(String::from);
        info!("requestID: {}", request_id.as_deref().unwrap_or("-"));

        Ok(ChargingOutcome::Requested { request_id })
    }
}
