//! Field lookup across the status document layouts the API has served.
//!
//! Snapshots captured before December 2022 nest everything under `data`; later
//! ones group fields by domain and wrap each status in a `value` object. Each
//! layout has its own closed path table, chosen once per document.

use serde_json::Value;

/// Report columns, in output order.
pub const REPORT_COLUMNS: [&str; 16] = [
    "timestamp",
    "car_captured_timestamp",
    "odometer",
    "plug_connection_state",
    "charging_state",
    "plug_lock_state",
    "max_charge_current_ac",
    "charge_type",
    "charge_power_kw",
    "charge_rate_kmph",
    "target_soc_pct",
    "current_soc_pct",
    "remaining_charging_time_m",
    "cruising_range_electric_km",
    "climatisation_state",
    "remaining_climatisation_time_m",
];

pub const MISSING: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// Fields under a top-level `data` object, no `value` wrappers.
    Legacy,
    /// Domain groups (`charging`, `climatisation`, ...) with `value` wrappers.
    Current,
}

type PathTable = [(&'static str, &'static [&'static str])];

const CURRENT_PATHS: &PathTable = &[
    ("timestamp", &["requestTimestamp"]),
    ("car_captured_timestamp", &["charging", "chargingStatus", "value", "carCapturedTimestamp"]),
    ("odometer", &["measurements", "odometerStatus", "value", "odometer"]),
    ("plug_connection_state", &["charging", "plugStatus", "value", "plugConnectionState"]),
    ("charging_state", &["charging", "chargingStatus", "value", "chargingState"]),
    ("plug_lock_state", &["charging", "plugStatus", "value", "plugLockState"]),
    ("max_charge_current_ac", &["charging", "chargingSettings", "value", "maxChargeCurrentAC"]),
    ("charge_type", &["charging", "chargingStatus", "value", "chargeType"]),
    ("charge_power_kw", &["charging", "chargingStatus", "value", "chargePower_kW"]),
    ("charge_rate_kmph", &["charging", "chargingStatus", "value", "chargeRate_kmph"]),
    ("target_soc_pct", &["charging", "chargingSettings", "value", "targetSOC_pct"]),
    ("current_soc_pct", &["charging", "batteryStatus", "value", "currentSOC_pct"]),
    ("remaining_charging_time_m", &["charging", "chargingStatus", "value", "remainingChargingTimeToComplete_min"]),
    ("cruising_range_electric_km", &["charging", "batteryStatus", "value", "cruisingRangeElectric_km"]),
    ("climatisation_state", &["climatisation", "climatisationStatus", "value", "climatisationState"]),
    ("remaining_climatisation_time_m", &["climatisation", "climatisationStatus", "value", "remainingClimatisationTime_min"]),
];

const LEGACY_PATHS: &PathTable = &[
    ("timestamp", &["requestTimestamp"]),
    ("car_captured_timestamp", &["data", "chargingStatus", "carCapturedTimestamp"]),
    ("odometer", &["data", "odometerStatus", "odometer"]),
    ("plug_connection_state", &["data", "plugStatus", "plugConnectionState"]),
    ("charging_state", &["data", "chargingStatus", "chargingState"]),
    ("plug_lock_state", &["data", "plugStatus", "plugLockState"]),
    ("max_charge_current_ac", &["data", "chargingSettings", "maxChargeCurrentAC"]),
    ("charge_type", &["data", "chargingStatus", "chargeType"]),
    ("charge_power_kw", &["data", "chargingStatus", "chargePower_kW"]),
    ("charge_rate_kmph", &["data", "chargingStatus", "chargeRate_kmph"]),
    ("target_soc_pct", &["data", "chargingSettings", "targetSOC_pct"]),
    ("current_soc_pct", &["data", "batteryStatus", "currentSOC_pct"]),
    ("remaining_charging_time_m", &["data", "chargingStatus", "remainingChargingTimeToComplete_min"]),
    ("cruising_range_electric_km", &["data", "batteryStatus", "cruisingRangeElectric_km"]),
    ("climatisation_state", &["data", "climatisationStatus", "climatisationState"]),
    ("remaining_climatisation_time_m", &["data", "climatisationStatus", "remainingClimatisationTime_min"]),
];

impl SchemaVersion {
    pub fn detect(doc: &Value) -> Self {
        if doc.get("data").is_some() {
            SchemaVersion::Legacy
        } else {
            SchemaVersion::Current
        }
    }

    pub fn path(self, column: &str) -> Option<&'static [&'static str]> {
        let table = match self {
            SchemaVersion::Legacy => LEGACY_PATHS,
            SchemaVersion::Current => CURRENT_PATHS,
        };
        table
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, path)| *path)
    }
}

/// Read-only view of one status document through its schema's path table.
#[derive(Debug, Clone, Copy)]
pub struct StatusView<'a> {
    doc: &'a Value,
    version: SchemaVersion,
}

impl<'a> StatusView<'a> {
    pub fn new(doc: &'a Value) -> Self {
        Self {
            doc,
            version: SchemaVersion::detect(doc),
        }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn lookup(&self, column: &str) -> Option<&'a Value> {
        let path = self.version.path(column)?;
        path.iter().try_fold(self.doc, |value, key| value.get(key))
    }

    pub fn text(&self, column: &str) -> Option<&'a str> {
        self.lookup(column).and_then(Value::as_str)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.lookup(column).and_then(Value::as_f64)
    }

    /// Cell text for the report: `-` when the path is missing, strings
    /// unquoted, null as an empty cell, everything else as JSON text.
    pub fn render(&self, column: &str) -> String {
        match self.lookup(column) {
            None => MISSING.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn row(&self) -> Vec<String> {
        REPORT_COLUMNS.iter().map(|c| self.render(c)).collect()
    }
}
