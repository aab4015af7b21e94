use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::services::TypeBreakdown;

#[derive(Debug, Serialize)]
pub struct StorageUsageResponse {
    pub storage_used: i64,
    pub storage_limit: i64,
    pub remaining_storage: i64,
    pub file_count: u64,
}

#[derive(Debug, Serialize)]
pub struct FileTypesResponse {
    pub file_types: Vec<TypeBreakdown>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ActivityParams {
    /// Explicit window when both bounds are given, otherwise `None`.
    pub fn window(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AppError> {
        match (self.start_date.as_deref(), self.end_date.as_deref()) {
            (Some(start), Some(end)) => {
                let start = parse_date(start, false)?;
                let end = parse_date(end, true)?;
                if start > end {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "startDate must not be after endDate"
                    )));
                }
                Ok(Some((start, end)))
            }
            _ => Ok(None),
        }
    }
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` date (start or end of that UTC day).
fn parse_date(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid date: {}", raw)))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid date: {}", raw)))
}

#[derive(Debug, Serialize)]
pub struct UserActivityEntry {
    pub action: &'static str,
    pub file_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserActivityResponse {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub activities: Vec<UserActivityEntry>,
}
