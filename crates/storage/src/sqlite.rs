//! SQLite repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::model::{
    Alert, PendingAlert, Service, ServiceKey, ServiceState, StateValue, UncheckedState,
};
use crate::repository::{ChangeSet, Repository};
use crate::StorageError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS service (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        server TEXT NOT NULL,
        name TEXT NOT NULL,
        period INTEGER,
        state_id INTEGER,
        timed_out INTEGER NOT NULL DEFAULT 0,
        last_seen TEXT,
        UNIQUE (server, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS service_state (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        service_id INTEGER NOT NULL REFERENCES service (id),
        rtime TEXT NOT NULL,
        state TEXT NOT NULL,
        info TEXT,
        checked INTEGER NOT NULL DEFAULT 0,
        prev_id INTEGER REFERENCES service_state (id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_service_state_checked
        ON service_state (checked)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alert (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        service_id INTEGER NOT NULL REFERENCES service (id),
        service_state_id INTEGER REFERENCES service_state (id),
        ctime TEXT NOT NULL,
        channel TEXT NOT NULL,
        event TEXT NOT NULL,
        message TEXT NOT NULL,
        reported INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_alert_reported
        ON alert (reported)
    "#,
];

/// Repository backed by a SQLite database
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Wrap an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!("Connected to SQLite database {}", url);
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("SQLite schema ready");
        Ok(())
    }

    /// Register a service
    pub async fn add_service(
        &self,
        server: &str,
        name: &str,
        period: Option<i64>,
    ) -> Result<i64, StorageError> {
        let row = sqlx::query(
            r#"
            INSERT INTO service (server, name, period)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(server)
        .bind(name)
        .bind(period)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// Record a new observation, linking it to the service's current state
    pub async fn record_state(
        &self,
        service_id: i64,
        state: StateValue,
        info: Option<&str>,
        rtime: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut tx = self.pool.begin().await?;

        let prev_id: Option<i64> = sqlx::query("SELECT state_id FROM service WHERE id = ?")
            .bind(service_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("service #{}", service_id)))?
            .try_get("state_id")?;

        let row = sqlx::query(
            r#"
            INSERT INTO service_state (service_id, rtime, state, info, prev_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(service_id)
        .bind(rtime)
        .bind(state.as_str())
        .bind(info)
        .bind(prev_id)
        .fetch_one(&mut *tx)
        .await?;
        let id: i64 = row.try_get("id")?;

        sqlx::query("UPDATE service SET state_id = ?, last_seen = ? WHERE id = ?")
            .bind(id)
            .bind(rtime)
            .bind(service_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    pub async fn service(&self, id: i64) -> Result<Service, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, server, name, period, state_id, timed_out, last_seen
            FROM service
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("service #{}", id)))?;

        service_from_row(&row)
    }

    pub async fn state(&self, id: i64) -> Result<ServiceState, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, service_id, rtime, state, info, checked, prev_id
            FROM service_state
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("service state #{}", id)))?;

        state_from_row(&row)
    }

    /// All alerts in creation order
    pub async fn alerts(&self) -> Result<Vec<Alert>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, service_id, service_state_id, ctime, channel, event, message, reported
            FROM alert
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(alert_from_row).collect()
    }
}

fn service_from_row(row: &SqliteRow) -> Result<Service, StorageError> {
    Ok(Service {
        id: row.try_get("id")?,
        key: ServiceKey {
            server: row.try_get("server")?,
            name: row.try_get("name")?,
        },
        period: row.try_get("period")?,
        state_id: row.try_get("state_id")?,
        timed_out: row.try_get("timed_out")?,
        last_seen: row.try_get("last_seen")?,
    })
}

fn state_from_row(row: &SqliteRow) -> Result<ServiceState, StorageError> {
    let state: String = row.try_get("state")?;
    Ok(ServiceState {
        id: row.try_get("id")?,
        service_id: row.try_get("service_id")?,
        rtime: row.try_get("rtime")?,
        state: state.parse()?,
        info: row.try_get("info")?,
        checked: row.try_get("checked")?,
        prev_id: row.try_get("prev_id")?,
    })
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert, StorageError> {
    Ok(Alert {
        id: row.try_get("id")?,
        service_id: row.try_get("service_id")?,
        service_state_id: row.try_get("service_state_id")?,
        ctime: row.try_get("ctime")?,
        channel: row.try_get("channel")?,
        event: row.try_get("event")?,
        message: row.try_get("message")?,
        reported: row.try_get("reported")?,
    })
}

fn parse_optional_state(value: Option<String>) -> Result<Option<StateValue>, StorageError> {
    value.map(|s| s.parse()).transpose()
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn unchecked_states(&self) -> Result<Vec<UncheckedState>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.service_id, s.rtime, s.state, s.info, s.checked, s.prev_id,
                   p.state AS prev_state, sv.server, sv.name
            FROM service_state s
            JOIN service sv ON sv.id = s.service_id
            LEFT JOIN service_state p ON p.id = s.prev_id
            WHERE s.checked = 0
            ORDER BY s.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UncheckedState {
                    state: state_from_row(row)?,
                    service: ServiceKey {
                        server: row.try_get("server")?,
                        name: row.try_get("name")?,
                    },
                    prev_state: parse_optional_state(row.try_get("prev_state")?)?,
                })
            })
            .collect()
    }

    async fn timeout_candidates(&self) -> Result<Vec<Service>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, server, name, period, state_id, timed_out, last_seen
            FROM service
            WHERE period IS NOT NULL
              AND state_id IS NOT NULL
              AND last_seen IS NOT NULL
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(service_from_row).collect()
    }

    async fn pending_alerts(&self) -> Result<Vec<PendingAlert>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.service_id, a.service_state_id, a.ctime, a.channel, a.event,
                   a.message, a.reported, sv.server, sv.name,
                   cs.state AS current_state, cs.info AS current_info
            FROM alert a
            JOIN service sv ON sv.id = a.service_id
            LEFT JOIN service_state cs ON cs.id = sv.state_id
            WHERE a.reported = 0
            ORDER BY a.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let current_state = parse_optional_state(row.try_get("current_state")?)?;
                let current_info: Option<String> = row.try_get("current_info")?;
                Ok(PendingAlert {
                    alert: alert_from_row(row)?,
                    service: ServiceKey {
                        server: row.try_get("server")?,
                        name: row.try_get("name")?,
                    },
                    current_state: current_state.map(|s| (s, current_info)),
                })
            })
            .collect()
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StorageError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for alert in &changes.new_alerts {
            sqlx::query(
                r#"
                INSERT INTO alert (service_id, service_state_id, ctime, channel, event, message)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(alert.service_id)
            .bind(alert.service_state_id)
            .bind(now)
            .bind(alert.channel)
            .bind(alert.event)
            .bind(alert.message.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for id in &changes.checked_states {
            update_one(&mut tx, "UPDATE service_state SET checked = 1 WHERE id = ?", *id).await?;
        }

        for (id, timed_out) in &changes.timed_out {
            let result = sqlx::query("UPDATE service SET timed_out = ? WHERE id = ?")
                .bind(*timed_out)
                .bind(*id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StorageError::NotFound(format!("service #{}", id)));
            }
        }

        for id in &changes.reported_alerts {
            update_one(&mut tx, "UPDATE alert SET reported = 1 WHERE id = ?", *id).await?;
        }

        // Dropping `tx` on an early return above rolls everything back
        tx.commit().await?;
        debug!(
            "Committed {} alerts, {} checked states, {} timeout flags, {} reported alerts",
            changes.new_alerts.len(),
            changes.checked_states.len(),
            changes.timed_out.len(),
            changes.reported_alerts.len()
        );
        Ok(())
    }
}

async fn update_one(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    statement: &str,
    id: i64,
) -> Result<(), StorageError> {
    let result = sqlx::query(statement).bind(id).execute(&mut **tx).await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound(format!("row #{} for `{}`", id, statement)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewAlert;

    async fn repository() -> SqliteRepository {
        // One connection, otherwise every connection gets its own memory database
        let repo = SqliteRepository::connect("sqlite::memory:", 1).await.unwrap();
        repo.init_schema().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_record_state_links_predecessor() {
        let repo = repository().await;
        let svc = repo.add_service("web1", "nginx", Some(60)).await.unwrap();

        let first = repo
            .record_state(svc, StateValue::Ok, None, Utc::now())
            .await
            .unwrap();
        let second = repo
            .record_state(svc, StateValue::Err, Some("502"), Utc::now())
            .await
            .unwrap();

        let state = repo.state(second).await.unwrap();
        assert_eq!(state.prev_id, Some(first));
        assert_eq!(state.state, StateValue::Err);
        assert_eq!(state.info.as_deref(), Some("502"));
        assert_eq!(repo.service(svc).await.unwrap().state_id, Some(second));
    }

    #[tokio::test]
    async fn test_queries_and_commit() {
        let repo = repository().await;
        let svc = repo.add_service("web1", "nginx", Some(60)).await.unwrap();
        repo.add_service("web1", "cron", None).await.unwrap();
        let first = repo
            .record_state(svc, StateValue::Ok, None, Utc::now())
            .await
            .unwrap();
        let second = repo
            .record_state(svc, StateValue::Unk, Some("no data"), Utc::now())
            .await
            .unwrap();

        let unchecked = repo.unchecked_states().await.unwrap();
        assert_eq!(unchecked.len(), 2);
        assert_eq!(unchecked[0].state.id, first);
        assert_eq!(unchecked[0].prev_state, None);
        assert_eq!(unchecked[1].prev_state, Some(StateValue::Ok));

        let candidates = repo.timeout_candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key.name, "nginx");

        let state = repo.state(second).await.unwrap();
        let changes = ChangeSet {
            new_alerts: vec![NewAlert::state_unknown(&state)],
            checked_states: vec![first, second],
            timed_out: vec![(svc, true)],
            ..ChangeSet::new()
        };
        repo.commit(changes).await.unwrap();

        assert!(repo.unchecked_states().await.unwrap().is_empty());
        assert!(repo.service(svc).await.unwrap().timed_out);

        let pending = repo.pending_alerts().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].alert.event, "unk");
        assert_eq!(
            pending[0].current_state,
            Some((StateValue::Unk, Some("no data".to_string())))
        );
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let repo = repository().await;
        let svc = repo.add_service("web1", "nginx", None).await.unwrap();
        let state = repo
            .record_state(svc, StateValue::Ok, None, Utc::now())
            .await
            .unwrap();

        let changes = ChangeSet {
            checked_states: vec![state],
            reported_alerts: vec![42],
            ..ChangeSet::new()
        };
        assert!(matches!(
            repo.commit(changes).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!repo.state(state).await.unwrap().checked);
        assert!(repo.alerts().await.unwrap().is_empty());
    }
}
