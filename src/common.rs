/// Date handling shared by the harvest and report endpoints
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::ServiceError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar dates are stored at noon UTC so the day survives any client offset
const HARVEST_HOUR_UTC: u32 = 12;

/// Optional calendar-day bounds for filtering harvests
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DateRangeParams {
    /// First day included, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Last day included, `YYYY-MM-DD`
    pub end_date: Option<String>,
}

/// Half-open UTC interval `[start, end)`; either side may be unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRangeParams {
    pub fn new(start_date: Option<&str>, end_date: Option<&str>) -> Self {
        Self {
            start_date: start_date.map(str::to_string),
            end_date: end_date.map(str::to_string),
        }
    }

    /// Converts the day strings into a UTC interval covering both days in full.
    pub fn to_bounds(&self) -> Result<DateBounds, ServiceError> {
        let start = non_empty(&self.start_date)
            .map(|s| parse_day(s, "start"))
            .transpose()?;
        let end = non_empty(&self.end_date)
            .map(|s| parse_day(s, "end"))
            .transpose()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ServiceError::ValidationError(
                    "startDate must not be after endDate".to_string(),
                ));
            }
        }

        let end = match end {
            Some(day) => Some(
                day.checked_add_days(Days::new(1))
                    .ok_or_else(|| ServiceError::ValidationError("Invalid end date".to_string()))?,
            ),
            None => None,
        };

        Ok(DateBounds {
            start: start.map(start_of_day),
            end: end.map(start_of_day),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_day(value: &str, which: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        ServiceError::ValidationError(format!("Invalid {} date format, expected YYYY-MM-DD", which))
    })
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Parses a harvest date: a calendar day (stored at 12:00 UTC) or a full
/// RFC 3339 timestamp.
pub fn parse_harvest_date(value: &str) -> Result<DateTime<Utc>, ServiceError> {
    let value = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return day
            .and_hms_opt(HARVEST_HOUR_UTC, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| ServiceError::ValidationError("Invalid harvest date".to_string()));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ServiceError::ValidationError("Invalid harvest date format".to_string()))
}
