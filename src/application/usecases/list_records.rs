use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{models::MessageRecord, repositories::MessageRecordRepository};

const DEFAULT_LIMIT: u32 = 100;

pub struct ListRecordsUseCase {
    records: Arc<dyn MessageRecordRepository>,
}

impl ListRecordsUseCase {
    pub fn new(records: Arc<dyn MessageRecordRepository>) -> Self {
        Self { records }
    }

    pub async fn execute(&self, owner_id: Uuid) -> anyhow::Result<Vec<MessageRecord>> {
        self.records.list_by_owner(owner_id, DEFAULT_LIMIT).await
    }
}
