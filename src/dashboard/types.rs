use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::Serialize;

use crate::date_util::{day_from_unix_seconds, parse_calendar_day};

pub const FIRST_PATIENT_IN: &str = "First patient in";
pub const LAST_PATIENT_IN: &str = "Last patient in";
pub const PATIENTS_REGISTERED: &str = "Patients registered";
pub const PATIENTS_ONGOING: &str = "Patients ongoing";
pub const PATIENTS_WITHDRAWN: &str = "Patients withdrawn";

/// Value shown when no baseline event exists yet.
pub const NOT_AVAILABLE: &str = "NA";

/// One labeled line of the dashboard's general information panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardData {
    pub label: String,
    pub value: String,
}

impl DashboardData {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// The user requesting the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub login: String,
    pub name: Option<String>,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            name: None,
        }
    }
}

/// States of the `PATIENT_STATUS` workflow that the breakdown reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientStatus {
    Ongoing,
    Withdrawn,
}

impl PatientStatus {
    pub fn from_state_id(state_id: &str) -> Option<Self> {
        match state_id {
            "ONGOING" => Some(PatientStatus::Ongoing),
            "WITHDRAWN" => Some(PatientStatus::Withdrawn),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PatientStatus::Ongoing => PATIENTS_ONGOING,
            PatientStatus::Withdrawn => PATIENTS_WITHDRAWN,
        }
    }
}

/// Calendar day read from an `event.date` column.
///
/// Text values may be a date, a naive timestamp, or RFC 3339; integer values
/// are Unix seconds. Anything else is a column conversion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventDay(pub NaiveDate);

impl FromSql for EventDay {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(bytes) => {
                let s = std::str::from_utf8(bytes).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                parse_calendar_day(s)
                    .map(EventDay)
                    .ok_or_else(|| FromSqlError::Other(format!("unrecognized date: {s:?}").into()))
            }
            ValueRef::Integer(secs) => day_from_unix_seconds(secs)
                .map(EventDay)
                .ok_or(FromSqlError::OutOfRange(secs)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
