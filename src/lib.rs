pub mod dashboard;
pub mod date_util;
pub mod error;
pub mod storage;

use std::sync::Arc;

pub use dashboard::{
    DashboardData, DashboardPlugin, StudyTestDashboard, User, DEFAULT_ROOT_SCOPE_PK,
    ROOT_SCOPE_CONFIG_KEY,
};
pub use error::{Error, Result};
pub use storage::repository::StoreCounts;
pub use storage::Database;

use storage::repository;

/// Main entry point for the study dashboard.
pub struct StudyDashboard {
    db: Database,
}

impl StudyDashboard {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The configured root scope, or [`DEFAULT_ROOT_SCOPE_PK`] if unset.
    pub async fn root_scope_pk(&self) -> Result<i64> {
        let stored: Option<String> = self
            .db
            .reader()
            .call(|conn| repository::get_config(conn, ROOT_SCOPE_CONFIG_KEY))
            .await?;

        match stored {
            Some(value) => parse_root_scope_pk(&value),
            None => Ok(DEFAULT_ROOT_SCOPE_PK),
        }
    }

    // ── Dashboard ──────────────────────────────────────────────────

    /// General information for the configured root scope.
    pub async fn general_information(&self, user: &User) -> Result<Vec<DashboardData>> {
        let root = self.root_scope_pk().await?;
        self.general_information_for(root, user).await
    }

    /// General information for an explicit root scope.
    pub async fn general_information_for(
        &self,
        root_scope_pk: i64,
        user: &User,
    ) -> Result<Vec<DashboardData>> {
        let plugin: Arc<dyn DashboardPlugin> = Arc::new(StudyTestDashboard::new(root_scope_pk));
        dashboard::compute_general_information(&self.db, plugin, user).await
    }

    pub async fn status(&self) -> Result<StoreCounts> {
        self.db
            .reader()
            .call(|conn| repository::store_counts(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Store a config value. `root_scope_pk` must be an integer.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        if key == ROOT_SCOPE_CONFIG_KEY {
            parse_root_scope_pk(value)?;
        }
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.trim().to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

fn parse_root_scope_pk(value: &str) -> Result<i64> {
    value.trim().parse::<i64>().map_err(|_| {
        Error::Config(format!(
            "{ROOT_SCOPE_CONFIG_KEY} must be an integer scope pk, got {value:?}"
        ))
    })
}
