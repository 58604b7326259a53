pub mod types;

pub use types::*;

use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{params, Connection};

use crate::date_util::format_day;
use crate::error::{Error, Result};
use crate::storage::Database;

/// Root scope used when none is configured.
pub const DEFAULT_ROOT_SCOPE_PK: i64 = 1;

/// Config key holding the root scope pk.
pub const ROOT_SCOPE_CONFIG_KEY: &str = "root_scope_pk";

const PATIENTS_REGISTERED_SQL: &str = "
    SELECT count(*) AS count
    FROM scope s
    INNER JOIN scope_ancestor sa ON s.pk = sa.scope_fk
    WHERE sa.ancestor_fk = ?1
      AND sa.ancestor_deleted = 0
      AND s.deleted = 0
      AND s.scope_model_id = 'PATIENT'";

/// Every baseline date is reduced to its UTC day (`YYYY-MM-DD`) before
/// `min`/`max`, so text timestamps, offsets, and Unix seconds (integer or
/// all-digit text) compare as days. Values SQLite cannot read come back in
/// `unreadable_date`.
const FIRST_LAST_PATIENT_SQL: &str = "
    WITH baseline AS (
        SELECT v.date AS raw,
               CASE
                   WHEN typeof(v.date) IN ('integer', 'real')
                       THEN date(v.date, 'unixepoch')
                   WHEN trim(v.date) <> '' AND trim(v.date) NOT GLOB '*[^0-9]*'
                       THEN date(CAST(trim(v.date) AS INTEGER), 'unixepoch')
                   ELSE date(trim(v.date))
               END AS day
        FROM event v
        INNER JOIN scope s ON s.pk = v.scope_fk
        INNER JOIN scope_ancestor sa ON s.pk = sa.scope_fk
        WHERE v.event_model_id = 'BASELINE'
          AND v.date IS NOT NULL
          AND sa.ancestor_fk = ?1
          AND sa.ancestor_deleted = 0
          AND s.deleted = 0
    )
    SELECT min(day) AS first_date,
           max(day) AS last_date,
           min(CASE WHEN day IS NULL THEN raw END) AS unreadable_date
    FROM baseline";

const ONGOING_WITHDRAWN_PATIENTS_SQL: &str = "
    SELECT ws.state_id AS state_id, count(*) AS count, sum(count(*)) OVER () AS total
    FROM scope s
    INNER JOIN workflow_status ws ON ws.scope_fk = s.pk
    INNER JOIN scope_ancestor sa ON sa.scope_fk = s.pk
    WHERE sa.ancestor_fk = ?1
      AND sa.ancestor_deleted = 0
      AND s.deleted = 0
      AND ws.workflow_id = 'PATIENT_STATUS'
      AND (ws.state_id = 'WITHDRAWN' OR ws.state_id = 'ONGOING')
    GROUP BY ws.state_id
    ORDER BY ws.state_id";

/// A source of general information lines for the study dashboard.
///
/// Implementations run read-only queries on the borrowed connection. Any
/// query or conversion failure aborts the whole call; no partial list is
/// returned.
pub trait DashboardPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn general_information(
        &self,
        conn: &Connection,
        user: &User,
    ) -> std::result::Result<Vec<DashboardData>, rusqlite::Error>;
}

/// Patient counts, enrollment range, and ongoing/withdrawn breakdown for all
/// live patients below a root scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudyTestDashboard {
    root_scope_pk: i64,
}

impl StudyTestDashboard {
    pub fn new(root_scope_pk: i64) -> Self {
        Self { root_scope_pk }
    }

    pub fn root_scope_pk(&self) -> i64 {
        self.root_scope_pk
    }
}

impl Default for StudyTestDashboard {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_SCOPE_PK)
    }
}

impl DashboardPlugin for StudyTestDashboard {
    fn name(&self) -> &str {
        "study-test"
    }

    fn general_information(
        &self,
        conn: &Connection,
        user: &User,
    ) -> std::result::Result<Vec<DashboardData>, rusqlite::Error> {
        // Results are the same for every user.
        log::debug!(
            "Computing general information under scope {} for {}",
            self.root_scope_pk,
            user.login
        );

        let mut data = Vec::with_capacity(5);
        data.extend(patients_registered(conn, self.root_scope_pk)?);
        data.extend(enrollment_range(conn, self.root_scope_pk)?);
        data.extend(status_breakdown(conn, self.root_scope_pk)?);
        Ok(data)
    }
}

/// Run a dashboard plugin on the reader connection.
pub async fn compute_general_information(
    db: &Database,
    plugin: Arc<dyn DashboardPlugin>,
    user: &User,
) -> Result<Vec<DashboardData>> {
    let user = user.clone();
    db.reader()
        .call(move |conn| plugin.general_information(conn, &user))
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// `count` as a share of `total`, in percent, rounded half away from zero to
/// one decimal. A non-positive total yields 0.
pub fn percentage(count: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (count as f64 * 1000.0 / total as f64).round() / 10.0
}

/// `"<count> (<pct>%)"` with one decimal.
pub fn format_share(count: i64, total: i64) -> String {
    format!("{count} ({:.1}%)", percentage(count, total))
}

// ── Internal SQL helpers ───────────────────────────────────────────

fn patients_registered(
    conn: &Connection,
    root_scope_pk: i64,
) -> std::result::Result<Vec<DashboardData>, rusqlite::Error> {
    let mut stmt = conn.prepare(PATIENTS_REGISTERED_SQL)?;
    let mut rows = stmt.query(params![root_scope_pk])?;

    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let count: i64 = row.get("count")?;
        log::debug!("{count} patients registered");
        data.push(DashboardData::new(PATIENTS_REGISTERED, count.to_string()));
    }
    Ok(data)
}

fn enrollment_range(
    conn: &Connection,
    root_scope_pk: i64,
) -> std::result::Result<Vec<DashboardData>, rusqlite::Error> {
    let mut stmt = conn.prepare(FIRST_LAST_PATIENT_SQL)?;
    let mut rows = stmt.query(params![root_scope_pk])?;

    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let unreadable: Option<Value> = row.get("unreadable_date")?;
        if let Some(raw) = unreadable {
            let idx = row.as_ref().column_index("unreadable_date")?;
            return Err(rusqlite::Error::FromSqlConversionFailure(
                idx,
                raw.data_type(),
                format!("unrecognized baseline date: {raw:?}").into(),
            ));
        }

        let first: Option<EventDay> = row.get("first_date")?;
        let last: Option<EventDay> = row.get("last_date")?;
        match (first, last) {
            (Some(EventDay(first)), Some(EventDay(last))) => {
                log::debug!("Enrollment from {first} to {last}");
                data.push(DashboardData::new(FIRST_PATIENT_IN, format_day(first)));
                data.push(DashboardData::new(LAST_PATIENT_IN, format_day(last)));
            }
            _ => {
                log::debug!("No baseline events yet");
                data.push(DashboardData::new(FIRST_PATIENT_IN, NOT_AVAILABLE));
                data.push(DashboardData::new(LAST_PATIENT_IN, NOT_AVAILABLE));
            }
        }
    }
    Ok(data)
}

fn status_breakdown(
    conn: &Connection,
    root_scope_pk: i64,
) -> std::result::Result<Vec<DashboardData>, rusqlite::Error> {
    let mut stmt = conn.prepare(ONGOING_WITHDRAWN_PATIENTS_SQL)?;
    let mut rows = stmt.query(params![root_scope_pk])?;

    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let state_id: String = row.get("state_id")?;
        let count: i64 = row.get("count")?;
        let total: i64 = row.get("total")?;

        match PatientStatus::from_state_id(&state_id) {
            Some(status) => {
                log::debug!("{state_id}: {count} of {total}");
                data.push(DashboardData::new(status.label(), format_share(count, total)));
            }
            None => log::warn!("Ignoring unexpected patient status {state_id:?}"),
        }
    }
    Ok(data)
}
