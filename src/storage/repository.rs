use rusqlite::{params, Connection, OptionalExtension};

// ── Scopes ─────────────────────────────────────────────────────────

/// Insert a scope below `parent_pk` (or as a top-level scope) and materialize
/// its `scope_ancestor` rows: every ancestor of the parent, plus the parent
/// itself. Returns the new scope's pk.
pub fn insert_scope(
    conn: &Connection,
    id: &str,
    scope_model_id: &str,
    parent_pk: Option<i64>,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO scope (id, scope_model_id) VALUES (?1, ?2)",
        params![id, scope_model_id],
    )?;
    let pk = conn.last_insert_rowid();

    if let Some(parent) = parent_pk {
        conn.execute(
            "INSERT INTO scope_ancestor (scope_fk, ancestor_fk, ancestor_deleted)
             SELECT ?1, sa.ancestor_fk, sa.ancestor_deleted
             FROM scope_ancestor sa
             WHERE sa.scope_fk = ?2",
            params![pk, parent],
        )?;
        conn.execute(
            "INSERT INTO scope_ancestor (scope_fk, ancestor_fk, ancestor_deleted)
             SELECT ?1, p.pk, p.deleted FROM scope p WHERE p.pk = ?2",
            params![pk, parent],
        )?;
    }
    Ok(pk)
}

/// Logically delete a scope and everything below it. Links that name any of
/// them as an ancestor are flagged as well. Returns false if no such scope
/// exists.
pub fn delete_scope(conn: &Connection, pk: i64) -> Result<bool, rusqlite::Error> {
    let exists: Option<i64> = conn
        .query_row("SELECT pk FROM scope WHERE pk = ?1", params![pk], |row| {
            row.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Ok(false);
    }
    conn.execute(
        "UPDATE scope SET deleted = 1
         WHERE pk = ?1
            OR pk IN (SELECT scope_fk FROM scope_ancestor WHERE ancestor_fk = ?1)",
        params![pk],
    )?;
    conn.execute(
        "UPDATE scope_ancestor SET ancestor_deleted = 1
         WHERE ancestor_fk IN (SELECT pk FROM scope WHERE deleted = 1)",
        [],
    )?;
    Ok(true)
}

pub fn find_scope_pk(conn: &Connection, id: &str) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row("SELECT pk FROM scope WHERE id = ?1", params![id], |row| {
        row.get(0)
    })
    .optional()
}

// ── Events ─────────────────────────────────────────────────────────

pub fn insert_event(
    conn: &Connection,
    scope_pk: i64,
    event_model_id: &str,
    date: Option<&str>,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO event (scope_fk, event_model_id, date) VALUES (?1, ?2, ?3)",
        params![scope_pk, event_model_id, date],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Workflow status ────────────────────────────────────────────────

/// Set the current state of `workflow_id` on a scope, replacing any earlier state.
pub fn set_workflow_status(
    conn: &Connection,
    scope_pk: i64,
    workflow_id: &str,
    state_id: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO workflow_status (scope_fk, workflow_id, state_id)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(scope_fk, workflow_id) DO UPDATE SET state_id = excluded.state_id",
        params![scope_pk, workflow_id, state_id],
    )?;
    Ok(())
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Status ─────────────────────────────────────────────────────────

/// Row counts shown by `studydash status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub scopes: i64,
    pub deleted_scopes: i64,
    pub events: i64,
    pub workflow_statuses: i64,
}

pub fn store_counts(conn: &Connection) -> Result<StoreCounts, rusqlite::Error> {
    let (scopes, deleted_scopes) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(deleted), 0) FROM scope",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let events = conn.query_row("SELECT COUNT(*) FROM event", [], |row| row.get(0))?;
    let workflow_statuses =
        conn.query_row("SELECT COUNT(*) FROM workflow_status", [], |row| row.get(0))?;
    Ok(StoreCounts {
        scopes,
        deleted_scopes,
        events,
        workflow_statuses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn ancestors(conn: &Connection, pk: i64) -> Vec<(i64, i64)> {
        let mut stmt = conn
            .prepare(
                "SELECT ancestor_fk, ancestor_deleted FROM scope_ancestor
                 WHERE scope_fk = ?1 ORDER BY ancestor_fk",
            )
            .unwrap();
        stmt.query_map([pk], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_scope_materializes_ancestors() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let study = insert_scope(conn, "STUDY", "STUDY", None)?;
                let site = insert_scope(conn, "SITE-01", "CENTER", Some(study))?;
                let patient = insert_scope(conn, "P-001", "PATIENT", Some(site))?;

                assert!(ancestors(conn, study).is_empty());
                assert_eq!(ancestors(conn, site), vec![(study, 0)]);
                assert_eq!(ancestors(conn, patient), vec![(study, 0), (site, 0)]);
                assert_eq!(find_scope_pk(conn, "P-001")?, Some(patient));
                assert_eq!(find_scope_pk(conn, "P-404")?, None);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_scope_flags_descendant_links() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let study = insert_scope(conn, "STUDY", "STUDY", None)?;
                let site = insert_scope(conn, "SITE-01", "CENTER", Some(study))?;
                let patient = insert_scope(conn, "P-001", "PATIENT", Some(site))?;

                assert!(delete_scope(conn, site)?);
                assert!(!delete_scope(conn, 9999)?);

                assert_eq!(ancestors(conn, patient), vec![(study, 0), (site, 1)]);
                let deleted: Vec<(i64, i64)> = conn
                    .prepare("SELECT pk, deleted FROM scope ORDER BY pk")?
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<_, _>>()?;
                assert_eq!(deleted, vec![(study, 0), (site, 1), (patient, 1)]);

                // Scopes created under a deleted parent inherit the flag.
                let late = insert_scope(conn, "P-002", "PATIENT", Some(site))?;
                assert_eq!(ancestors(conn, late), vec![(study, 0), (site, 1)]);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_workflow_status_replaces_state() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                let study = insert_scope(conn, "STUDY", "STUDY", None)?;
                let patient = insert_scope(conn, "P-001", "PATIENT", Some(study))?;
                set_workflow_status(conn, patient, "PATIENT_STATUS", "ONGOING")?;
                set_workflow_status(conn, patient, "PATIENT_STATUS", "WITHDRAWN")?;

                let states: Vec<String> = conn
                    .prepare("SELECT state_id FROM workflow_status WHERE scope_fk = ?1")?
                    .query_map([patient], |row| row.get(0))?
                    .collect::<Result<_, _>>()?;
                assert_eq!(states, vec!["WITHDRAWN".to_string()]);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                assert_eq!(get_config(conn, "root_scope_pk")?, None);
                set_config(conn, "root_scope_pk", "7")?;
                set_config(conn, "root_scope_pk", "8")?;
                set_config(conn, "a_key", "x")?;
                assert_eq!(get_config(conn, "root_scope_pk")?, Some("8".to_string()));
                assert_eq!(
                    list_config(conn)?,
                    vec![
                        ("a_key".to_string(), "x".to_string()),
                        ("root_scope_pk".to_string(), "8".to_string()),
                    ]
                );
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_counts() {
        let db = Database::open_memory().await.unwrap();
        let counts = db
            .writer()
            .call(|conn| {
                assert_eq!(store_counts(conn)?, StoreCounts::default());
                let study = insert_scope(conn, "STUDY", "STUDY", None)?;
                let patient = insert_scope(conn, "P-001", "PATIENT", Some(study))?;
                insert_event(conn, patient, "BASELINE", Some("2020-01-10"))?;
                set_workflow_status(conn, patient, "PATIENT_STATUS", "ONGOING")?;
                delete_scope(conn, patient)?;
                store_counts(conn)
            })
            .await
            .unwrap();
        assert_eq!(
            counts,
            StoreCounts {
                scopes: 2,
                deleted_scopes: 1,
                events: 1,
                workflow_statuses: 1,
            }
        );
    }
}
