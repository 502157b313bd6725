//! sqlx-backed DeliveryStore. Runs against SQLite or Postgres through the
//! Any driver; identifiers and timestamps cross the boundary as text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::any::AnyConnectOptions;
use sqlx::migrate::Migrator;
use sqlx::{AnyPool, ConnectOptions, Row};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

use mt_core::error::StoreError;
use mt_core::ids::EmailId;
use mt_core::ports::{DeliveryStore, MarkOpened};
use mt_core::recipient::Recipient;
use mt_core::record::{DeliveryRecord, DeliveryStatus};

static MIGRATOR: Migrator = sqlx::migrate!();

pub async fn new_pool(database_url: &str) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();
    let opts = AnyConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL: {}", database_url))?
        // Reduce noisy logs by default
        .log_statements(log::LevelFilter::Off);
    let pool = AnyPool::connect_with(opts).await?;
    Ok(pool)
}

pub async fn migrate(pool: &AnyPool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    info!("database migrations applied");
    Ok(())
}

/// DeliveryStore implementation over a sqlx pool.
#[derive(Clone)]
pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

fn store_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Rejected(other.to_string()),
    }
}

fn format_ts(at: OffsetDateTime) -> Result<String, StoreError> {
    at.format(&Rfc3339)
        .map_err(|e| StoreError::Rejected(format!("unformattable timestamp: {e}")))
}

fn parse_ts(text: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|e| StoreError::Rejected(format!("corrupt timestamp {text:?}: {e}")))
}

#[async_trait]
impl DeliveryStore for SqlStore {
    async fn put(&self, record: DeliveryRecord) -> Result<(), StoreError> {
        let (status, failure_reason) = match &record.status {
            DeliveryStatus::Sent => ("sent", None),
            DeliveryStatus::Failed(reason) => ("failed", Some(reason.clone())),
        };
        let opened_at = record.opened_at.map(format_ts).transpose()?;

        sqlx::query(
            "INSERT INTO delivery_records \
                 (id, recipient, subject, body_digest, status, failure_reason, sent_at, opened_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                 recipient = excluded.recipient, \
                 subject = excluded.subject, \
                 body_digest = excluded.body_digest, \
                 status = excluded.status, \
                 failure_reason = excluded.failure_reason, \
                 sent_at = excluded.sent_at, \
                 opened_at = excluded.opened_at",
        )
        .bind(record.id.to_string())
        .bind(record.recipient.as_str())
        .bind(&record.subject)
        .bind(&record.body_digest)
        .bind(status)
        .bind(failure_reason)
        .bind(format_ts(record.sent_at)?)
        .bind(opened_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn mark_opened(
        &self,
        id: EmailId,
        at: OffsetDateTime,
    ) -> Result<MarkOpened, StoreError> {
        // The opened_at guard makes the first-open decision in one atomic
        // statement; concurrent callers for the same id cannot both win.
        let updated = sqlx::query(
            "UPDATE delivery_records SET opened_at = $1 \
             WHERE id = $2 AND opened_at IS NULL",
        )
        .bind(format_ts(at)?)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if updated.rows_affected() > 0 {
            return Ok(MarkOpened::FirstOpen);
        }

        let exists = sqlx::query("SELECT id FROM delivery_records WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(if exists.is_some() {
            MarkOpened::AlreadyOpened
        } else {
            MarkOpened::NoRecord
        })
    }

    async fn get(&self, id: EmailId) -> Result<Option<DeliveryRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, recipient, subject, body_digest, status, failure_reason, sent_at, opened_at \
             FROM delivery_records WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id_text: String = row.try_get("id").map_err(store_err)?;
        let recipient_text: String = row.try_get("recipient").map_err(store_err)?;
        let subject: String = row.try_get("subject").map_err(store_err)?;
        let body_digest: String = row.try_get("body_digest").map_err(store_err)?;
        let status_text: String = row.try_get("status").map_err(store_err)?;
        let failure_reason: Option<String> = row.try_get("failure_reason").map_err(store_err)?;
        let sent_at_text: String = row.try_get("sent_at").map_err(store_err)?;
        let opened_at_text: Option<String> = row.try_get("opened_at").map_err(store_err)?;

        let status = match (status_text.as_str(), failure_reason) {
            ("sent", _) => DeliveryStatus::Sent,
            ("failed", Some(reason)) => DeliveryStatus::Failed(reason),
            ("failed", None) => DeliveryStatus::Failed(String::new()),
            (other, _) => {
                return Err(StoreError::Rejected(format!("corrupt status {other:?}")));
            }
        };

        Ok(Some(DeliveryRecord {
            id: EmailId::parse(&id_text)
                .map_err(|e| StoreError::Rejected(format!("corrupt id: {e}")))?,
            recipient: Recipient::parse(&recipient_text)
                .map_err(|e| StoreError::Rejected(format!("corrupt recipient: {e}")))?,
            subject,
            body_digest,
            status,
            sent_at: parse_ts(&sent_at_text)?,
            opened_at: opened_at_text.as_deref().map(parse_ts).transpose()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_core::ids::EmailIdGenerator;
    use sqlx::any::Any;
    use sqlx::pool::PoolOptions;
    use time::macros::datetime;

    async fn test_store() -> SqlStore {
        sqlx::any::install_default_drivers();
        // a single connection keeps the in-memory database alive and shared
        let pool = PoolOptions::<Any>::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();
        SqlStore::new(pool)
    }

    fn record(id: EmailId, status: DeliveryStatus) -> DeliveryRecord {
        DeliveryRecord {
            id,
            recipient: Recipient::parse("a@example.com").unwrap(),
            subject: "Launch".into(),
            body_digest: DeliveryRecord::body_digest_of("<p>hi</p>"),
            status,
            sent_at: datetime!(2026-01-15 10:30:00 UTC),
            opened_at: None,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = test_store().await;
        let id = EmailIdGenerator.next();
        let stored = record(id, DeliveryStatus::Failed("mailbox unavailable".into()));
        store.put(stored.clone()).await.unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn get_unknown_id_returns_none() {
        let store = test_store().await;
        assert!(store.get(EmailIdGenerator.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_upserts_by_id() {
        let store = test_store().await;
        let id = EmailIdGenerator.next();
        store.put(record(id, DeliveryStatus::Sent)).await.unwrap();

        let mut replacement = record(id, DeliveryStatus::Sent);
        replacement.subject = "Replaced".into();
        store.put(replacement).await.unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.subject, "Replaced");
    }

    #[tokio::test]
    async fn mark_opened_is_idempotent() {
        let store = test_store().await;
        let id = EmailIdGenerator.next();
        store.put(record(id, DeliveryStatus::Sent)).await.unwrap();

        let first = datetime!(2026-01-16 08:00:00 UTC);
        let second = datetime!(2026-01-17 09:00:00 UTC);
        assert_eq!(
            store.mark_opened(id, first).await.unwrap(),
            MarkOpened::FirstOpen
        );
        assert_eq!(
            store.mark_opened(id, second).await.unwrap(),
            MarkOpened::AlreadyOpened
        );

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.opened_at, Some(first));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_opens_record_exactly_one_first_open() {
        let store = test_store().await;
        let id = EmailIdGenerator.next();
        store.put(record(id, DeliveryStatus::Sent)).await.unwrap();

        let at = datetime!(2026-01-16 08:00:00 UTC);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.mark_opened(id, at).await.unwrap() },
            ));
        }

        let mut first_opens = 0;
        for handle in handles {
            if handle.await.unwrap() == MarkOpened::FirstOpen {
                first_opens += 1;
            }
        }
        assert_eq!(first_opens, 1);
        assert_eq!(store.get(id).await.unwrap().unwrap().opened_at, Some(at));
    }

    #[tokio::test]
    async fn mark_opened_reports_missing_records() {
        let store = test_store().await;
        assert_eq!(
            store
                .mark_opened(EmailIdGenerator.next(), datetime!(2026-01-16 08:00:00 UTC))
                .await
                .unwrap(),
            MarkOpened::NoRecord
        );
    }
}
