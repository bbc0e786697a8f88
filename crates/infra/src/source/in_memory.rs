use std::sync::RwLock;

use stockcast_inventory::RawTicketRecord;

use super::{SourceError, TicketSource};

/// In-memory ticket source for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTicketSource {
    records: RwLock<Vec<RawTicketRecord>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryTicketSource {
    pub fn new(records: Vec<RawTicketRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            failure: RwLock::new(None),
        }
    }

    /// Replace the stored records.
    pub fn replace(&self, records: Vec<RawTicketRecord>) {
        if let Ok(mut guard) = self.records.write() {
            *guard = records;
        }
    }

    /// Make every subsequent fetch fail with a query error (`None` clears it).
    pub fn fail_with(&self, message: Option<&str>) {
        if let Ok(mut guard) = self.failure.write() {
            *guard = message.map(str::to_string);
        }
    }
}

#[async_trait::async_trait]
impl TicketSource for InMemoryTicketSource {
    async fn fetch_ticket_records(&self) -> Result<Vec<RawTicketRecord>, SourceError> {
        if let Some(message) = self.failure.read().ok().and_then(|f| f.clone()) {
            return Err(SourceError::Query(message));
        }
        self.records
            .read()
            .map(|r| r.clone())
            .map_err(|_| SourceError::Query("in-memory source poisoned".to_string()))
    }
}
