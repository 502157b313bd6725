use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::ids::EmailId;
use crate::ports::{DeliveryStore, MarkOpened};

/// Terminal state of one open-signal correlation. Purely observational: the
/// caller serves the same pixel no matter which state is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Identifier failed shape validation; the store was never touched.
    Rejected,
    /// Well-formed identifier with no matching record (forged or stale).
    Unmatched,
    /// First open captured for this record.
    Recorded,
    /// A duplicate open; the stored timestamp is untouched.
    AlreadyRecorded,
    /// The store was unreachable; the signal is dropped, not retried.
    StoreFailed,
}

/// Correlates inbound open signals with their originating delivery records.
/// Open tracking is best-effort: nothing here ever propagates an error back
/// to the triggering channel.
pub struct OpenCorrelator {
    store: Arc<dyn DeliveryStore>,
}

impl OpenCorrelator {
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    /// Handle one open signal end to end: validate the identifier shape,
    /// then mark the matching record opened if one exists.
    pub async fn on_open_signal(&self, raw_id: &str) -> OpenOutcome {
        let id = match EmailId::parse(raw_id) {
            Ok(id) => id,
            Err(e) => {
                debug!(raw_id, error = %e, "open signal rejected");
                return OpenOutcome::Rejected;
            }
        };

        match self.store.mark_opened(id, OffsetDateTime::now_utc()).await {
            Ok(MarkOpened::FirstOpen) => {
                info!(id = %id, "open recorded");
                OpenOutcome::Recorded
            }
            Ok(MarkOpened::AlreadyOpened) => {
                debug!(id = %id, "open already recorded");
                OpenOutcome::AlreadyRecorded
            }
            Ok(MarkOpened::NoRecord) => {
                debug!(id = %id, "open signal for unknown id");
                OpenOutcome::Unmatched
            }
            Err(e) => {
                warn!(id = %id, error = %e, "open signal dropped, store unavailable");
                OpenOutcome::StoreFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::ids::EmailIdGenerator;
    use crate::recipient::Recipient;
    use crate::record::{DeliveryRecord, DeliveryStatus};
    use crate::store_memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;

    /// Store wrapper that counts accesses, to prove rejected signals never
    /// reach the store.
    struct CountingStore {
        inner: MemoryStore,
        accesses: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryStore::new(),
                accesses: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DeliveryStore for CountingStore {
        async fn put(&self, record: DeliveryRecord) -> Result<(), StoreError> {
            self.accesses.fetch_add(1, Ordering::SeqCst);
            self.inner.put(record).await
        }

        async fn mark_opened(
            &self,
            id: EmailId,
            at: OffsetDateTime,
        ) -> Result<MarkOpened, StoreError> {
            self.accesses.fetch_add(1, Ordering::SeqCst);
            self.inner.mark_opened(id, at).await
        }

        async fn get(&self, id: EmailId) -> Result<Option<DeliveryRecord>, StoreError> {
            self.accesses.fetch_add(1, Ordering::SeqCst);
            self.inner.get(id).await
        }
    }

    struct UnavailableStore;

    #[async_trait]
    impl DeliveryStore for UnavailableStore {
        async fn put(&self, _record: DeliveryRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn mark_opened(
            &self,
            _id: EmailId,
            _at: OffsetDateTime,
        ) -> Result<MarkOpened, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn get(&self, _id: EmailId) -> Result<Option<DeliveryRecord>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    fn sent_record(id: EmailId) -> DeliveryRecord {
        DeliveryRecord {
            id,
            recipient: Recipient::parse("a@example.com").unwrap(),
            subject: "hi".into(),
            body_digest: DeliveryRecord::body_digest_of("<p>hi</p>"),
            status: DeliveryStatus::Sent,
            sent_at: datetime!(2026-01-15 10:30:00 UTC),
            opened_at: None,
        }
    }

    #[tokio::test]
    async fn malformed_id_is_rejected_without_store_access() {
        let store = CountingStore::new();
        let correlator = OpenCorrelator::new(store.clone());

        let outcome = correlator.on_open_signal("not-a-uuid").await;

        assert_eq!(outcome, OpenOutcome::Rejected);
        assert_eq!(store.accesses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn never_issued_id_is_unmatched_and_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let correlator = OpenCorrelator::new(store.clone());

        let phantom = EmailIdGenerator.next();
        let outcome = correlator.on_open_signal(&phantom.to_string()).await;

        assert_eq!(outcome, OpenOutcome::Unmatched);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn first_open_is_recorded_and_repeats_are_noops() {
        let store = Arc::new(MemoryStore::new());
        let id = EmailIdGenerator.next();
        store.put(sent_record(id)).await.unwrap();
        let correlator = OpenCorrelator::new(store.clone());

        assert_eq!(
            correlator.on_open_signal(&id.to_string()).await,
            OpenOutcome::Recorded
        );
        let first_opened_at = store.get(id).await.unwrap().unwrap().opened_at;
        assert!(first_opened_at.is_some());

        assert_eq!(
            correlator.on_open_signal(&id.to_string()).await,
            OpenOutcome::AlreadyRecorded
        );
        assert_eq!(
            store.get(id).await.unwrap().unwrap().opened_at,
            first_opened_at
        );
    }

    #[tokio::test]
    async fn store_failure_is_absorbed() {
        let correlator = OpenCorrelator::new(Arc::new(UnavailableStore));
        let id = EmailIdGenerator.next();

        let outcome = correlator.on_open_signal(&id.to_string()).await;

        assert_eq!(outcome, OpenOutcome::StoreFailed);
    }
}
