use crate::error::{VehicleError, VehicleResult};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Expands strftime escapes in a configured file name pattern.
pub fn timestamped_path<Tz>(pattern: &str, now: &DateTime<Tz>) -> VehicleResult<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut name = String::new();
    write!(name, "{}", now.format(pattern))
        .map_err(|_| VehicleError::FileNamePattern(pattern.to_string()))?;
    Ok(PathBuf::from(name))
}

/// Records when the document was fetched, in UTC.
pub fn stamp_request_time(doc: &mut Value, now: DateTime<Utc>) {
    if let Some(obj) = doc.as_object_mut() {
        obj.insert(
            "requestTimestamp".to_string(),
            Value::String(now.format(TIMESTAMP_FORMAT).to_string()),
        );
    }
}

/// Writes `doc` pretty-printed with four-space indentation. Keys come out in
/// `serde_json::Map` order, which is sorted.
pub fn write_snapshot(path: &Path, doc: &Value) -> VehicleResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| VehicleError::file(parent, e))?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut serializer)?;

    fs::write(path, buf).map_err(|e| VehicleError::file(path, e))
}

/// Glob matching every file a status file name pattern can produce: the text
/// before the first `%`, a `*`, then the extension after the last `.`.
pub fn snapshot_glob(pattern: &str) -> String {
    let (prefix, rest) = match pattern.find('%') {
        Some(idx) => pattern.split_at(idx),
        None => return pattern.to_string(),
    };
    let extension = rest.rfind('.').map(|idx| &rest[idx..]).unwrap_or("");
    format!("{}*{}", prefix, extension)
}
