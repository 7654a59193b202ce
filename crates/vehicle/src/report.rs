use crate::error::{VehicleError, VehicleResult};
use crate::schema::{StatusView, REPORT_COLUMNS};
use crate::session::{ChargeSession, SessionTracker};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of one report run.
#[derive(Debug, Default)]
pub struct ChargeReport {
    pub rows: usize,
    pub skipped: Vec<PathBuf>,
    pub sessions: Vec<ChargeSession>,
}

impl ChargeReport {
    /// Writes one CSV row per snapshot matching `glob_pattern`, in file name
    /// order, and collects the charge sessions found along the way.
    ///
    /// Missing fields become `-`; files that cannot be read or parsed are
    /// skipped with a warning so older captures never abort the report.
    pub fn generate<W: Write>(glob_pattern: &str, writer: W) -> VehicleResult<Self> {
        info!("Generating a charge report from {}", glob_pattern);
        let mut paths: Vec<PathBuf> = glob::glob(glob_pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));

        let mut out = csv::Writer::from_writer(writer);
        out.write_record(REPORT_COLUMNS)?;

        let mut report = ChargeReport::default();
        let mut tracker = SessionTracker::default();

        for path in paths {
            let doc = match read_snapshot(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.skipped.push(path);
                    continue;
                }
            };

            let view = StatusView::new(&doc);
            if let Some(session) = tracker.observe(&view) {
                report.sessions.push(session);
            }
            out.write_record(view.row())?;
            report.rows += 1;
        }

        out.flush()?;
        Ok(report)
    }
}

fn read_snapshot(path: &Path) -> VehicleResult<Value> {
    let text = fs::read_to_string(path).map_err(|e| VehicleError::file(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, doc: &Value) {
        fs::write(dir.path().join(name), doc.to_string()).expect("write snapshot");
    }

    fn pattern(dir: &TempDir) -> String {
        format!("{}/status_*.json", dir.path().display())
    }

    fn full_snapshot(ts: &str, state: &str, soc: u32) -> Value {
        json!({
            "requestTimestamp": ts,
            "measurements": {"odometerStatus": {"value": {"odometer": 12000}}},
            "charging": {
                "chargingStatus": {"value": {
                    "carCapturedTimestamp": ts,
                    "chargingState": state,
                    "chargeType": "ac",
                    "chargePower_kW": 11,
                    "chargeRate_kmph": 50,
                    "remainingChargingTimeToComplete_min": 90
                }},
                "plugStatus": {"value": {"plugConnectionState": "connected", "plugLockState": "locked"}},
                "chargingSettings": {"value": {"maxChargeCurrentAC": "maximum", "targetSOC_pct": 80}},
                "batteryStatus": {"value": {"currentSOC_pct": soc, "cruisingRangeElectric_km": 200}}
            },
            "climatisation": {"climatisationStatus": {"value": {
                "climatisationState": "off",
                "remainingClimatisationTime_min": 0
            }}}
        })
    }

    fn generate(dir: &TempDir) -> (ChargeReport, String) {
        let mut out = Vec::new();
        let report = ChargeReport::generate(&pattern(dir), &mut out).expect("report");
        (report, String::from_utf8(out).expect("utf8"))
    }

    const HEADER: &str = "timestamp,car_captured_timestamp,odometer,plug_connection_state,charging_state,plug_lock_state,max_charge_current_ac,charge_type,charge_power_kw,charge_rate_kmph,target_soc_pct,current_soc_pct,remaining_charging_time_m,cruising_range_electric_km,climatisation_state,remaining_climatisation_time_m";

    #[test]
    fn empty_directory_yields_only_the_header() {
        let dir = TempDir::new().expect("tempdir");
        let (report, csv) = generate(&dir);
        assert_eq!(csv, format!("{HEADER}\n"));
        assert_eq!(report.rows, 0);
        assert!(report.sessions.is_empty());
    }

    #[test]
    fn missing_range_renders_dash_and_keeps_the_row() {
        let dir = TempDir::new().expect("tempdir");
        let mut doc = full_snapshot("2023-03-01T10:00:00Z", "charging", 50);
        doc["charging"]["batteryStatus"]["value"]
            .as_object_mut()
            .expect("object")
            .remove("cruisingRangeElectric_km");
        write(&dir, "status_20230301_100000.json", &doc);

        let (report, csv) = generate(&dir);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(report.rows, 1);
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "2023-03-01T10:00:00Z,2023-03-01T10:00:00Z,12000,connected,charging,locked,maximum,ac,11,50,80,50,90,-,off,0"
        );
    }

    #[test]
    fn rows_follow_file_name_order_and_sessions_are_found() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, "status_20230301_120000.json", &full_snapshot("2023-03-01T12:00:00Z", "readyForCharging", 70));
        write(&dir, "status_20230301_100000.json", &full_snapshot("2023-03-01T10:00:00Z", "charging", 30));
        write(&dir, "status_20230301_110000.json", &full_snapshot("2023-03-01T11:00:00Z", "charging", 50));

        let (report, csv) = generate(&dir);
        let states: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|l| l.split(',').nth(4).unwrap_or_default())
            .collect();
        assert_eq!(states, vec!["charging", "charging", "readyForCharging"]);

        assert_eq!(report.sessions.len(), 1);
        let session = &report.sessions[0];
        assert_eq!(session.start_soc, Some(30.0));
        assert_eq!(session.end_soc, Some(70.0));
        assert_eq!(session.duration(), Some(chrono::TimeDelta::hours(2)));
    }

    #[test]
    fn legacy_snapshots_use_their_own_paths() {
        let dir = TempDir::new().expect("tempdir");
        let doc = json!({
            "requestTimestamp": "2022-06-01T08:00:00Z",
            "data": {
                "chargingStatus": {"chargingState": "charging", "carCapturedTimestamp": "2022-06-01T07:59:00Z"},
                "batteryStatus": {"currentSOC_pct": 33, "cruisingRangeElectric_km": 120}
            }
        });
        write(&dir, "status_20220601_080000.json", &doc);

        let (_, csv) = generate(&dir);
        let row: Vec<&str> = csv.lines().nth(1).expect("row").split(',').collect();
        assert_eq!(row[0], "2022-06-01T08:00:00Z");
        assert_eq!(row[1], "2022-06-01T07:59:00Z");
        assert_eq!(row[4], "charging");
        assert_eq!(row[11], "33");
        assert_eq!(row[13], "120");
        assert_eq!(row[2], "-");
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("status_20230301_090000.json"), "{truncated").expect("write");
        write(&dir, "status_20230301_100000.json", &full_snapshot("2023-03-01T10:00:00Z", "charging", 50));

        let (report, _) = generate(&dir);
        assert_eq!(report.rows, 1);
        assert_eq!(report.skipped.len(), 1);
    }
}
