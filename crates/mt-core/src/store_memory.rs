use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::ids::EmailId;
use crate::ports::{DeliveryStore, MarkOpened};
use crate::record::DeliveryRecord;

/// In-memory DeliveryStore for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<EmailId, DeliveryRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of all stored records, for assertions and diagnostics.
    pub fn records(&self) -> Vec<DeliveryRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn put(&self, record: DeliveryRecord) -> Result<(), StoreError> {
        self.records.insert(record.id, record);
        Ok(())
    }

    async fn mark_opened(
        &self,
        id: EmailId,
        at: OffsetDateTime,
    ) -> Result<MarkOpened, StoreError> {
        // The shard entry lock serializes concurrent opens for one id.
        match self.records.get_mut(&id) {
            None => Ok(MarkOpened::NoRecord),
            Some(record) if record.opened_at.is_some() => Ok(MarkOpened::AlreadyOpened),
            Some(mut record) => {
                record.opened_at = Some(at);
                Ok(MarkOpened::FirstOpen)
            }
        }
    }

    async fn get(&self, id: EmailId) -> Result<Option<DeliveryRecord>, StoreError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }
}
