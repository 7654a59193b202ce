use crate::schema::{StatusView, MISSING};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;

/// One charge, from the first snapshot reporting `charging` to the first one
/// after it that does not.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeSession {
    pub charge_type: String,
    pub start_label: String,
    pub end_label: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub start_soc: Option<f64>,
    pub end_soc: Option<f64>,
    pub start_range: Option<f64>,
    pub end_range: Option<f64>,
}

impl ChargeSession {
    pub fn duration(&self) -> Option<TimeDelta> {
        Some(self.ended_at? - self.started_at?)
    }

    pub fn soc_added(&self) -> Option<f64> {
        Some(self.end_soc? - self.start_soc?)
    }

    pub fn range_added(&self) -> Option<f64> {
        Some(self.end_range? - self.start_range?)
    }
}

impl fmt::Display for ChargeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.started_at {
            Some(start) => writeln!(f, "{}:", start.format("%A %d %B, %Y"))?,
            None => writeln!(f, "{}:", self.start_label)?,
        }
        writeln!(f, "    type        : {} charging session", self.charge_type)?;
        writeln!(f, "    Range added : {} km", number_or_dash(self.range_added()))?;
        writeln!(
            f,
            "    SOC added   : {}% ({}% => {}%)",
            number_or_dash(self.soc_added()),
            number_or_dash(self.start_soc),
            number_or_dash(self.end_soc)
        )?;
        let duration = self
            .duration()
            .map(format_duration)
            .unwrap_or_else(|| MISSING.to_string());
        writeln!(
            f,
            "    Duration    : {} ({} => {})",
            duration, self.start_label, self.end_label
        )
    }
}

fn number_or_dash(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{:.1}", v),
        None => MISSING.to_string(),
    }
}

/// `H:MM:SS`, prefixed with the day count for multi-day spans.
pub fn format_duration(delta: TimeDelta) -> String {
    let total = delta.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    match days {
        0 => format!("{sign}{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("{sign}1 day, {hours}:{minutes:02}:{seconds:02}"),
        n => format!("{sign}{n} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}

#[derive(Debug, Clone)]
struct OpenSession {
    charge_type: String,
    label: String,
    started_at: Option<DateTime<Utc>>,
    soc: Option<f64>,
    range: Option<f64>,
}

/// Folds consecutive snapshots into charge sessions.
#[derive(Debug, Default)]
pub struct SessionTracker {
    open: Option<OpenSession>,
}

impl SessionTracker {
    /// Feeds the next snapshot; returns a session when this one closes it.
    pub fn observe(&mut self, view: &StatusView<'_>) -> Option<ChargeSession> {
        let charging = view.text("charging_state") == Some("charging");

        if charging {
            if self.open.is_none() {
                let label = captured_at(view);
                self.open = Some(OpenSession {
                    charge_type: view.render("charge_type"),
                    started_at: parse_timestamp(&label),
                    label,
                    soc: view.number("current_soc_pct"),
                    range: view.number("cruising_range_electric_km"),
                });
            }
            return None;
        }

        let open = self.open.take()?;
        let end_label = captured_at(view);
        Some(ChargeSession {
            charge_type: open.charge_type,
            start_label: open.label,
            ended_at: parse_timestamp(&end_label),
            end_label,
            started_at: open.started_at,
            start_soc: open.soc,
            end_soc: view.number("current_soc_pct"),
            start_range: open.range,
            end_range: view.number("cruising_range_electric_km"),
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

/// When the car captured the snapshot, or when it was requested if the car
/// did not say.
fn captured_at(view: &StatusView<'_>) -> String {
    view.text("car_captured_timestamp")
        .or_else(|| view.text("timestamp"))
        .unwrap_or(MISSING)
        .to_string()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
