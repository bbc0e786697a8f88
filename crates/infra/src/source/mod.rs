//! Ticket data sources.
//!
//! A source yields [`RawTicketRecord`]s; aggregation happens in the inventory
//! crate. Nothing here retries: errors go straight back to the caller.

mod in_memory;
mod mysql;

use thiserror::Error;

use stockcast_inventory::RawTicketRecord;

pub use in_memory::InMemoryTicketSource;
pub use mysql::{MySqlTicketSource, TICKET_MATERIALS_QUERY};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("expected column missing from query result: {0}")]
    MissingColumn(String),

    #[error("could not decode column {column}: {reason}")]
    Decode { column: String, reason: String },
}

#[async_trait::async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetch every ticket-material event with its catalog and stock columns.
    async fn fetch_ticket_records(&self) -> Result<Vec<RawTicketRecord>, SourceError>;
}

#[async_trait::async_trait]
impl<S> TicketSource for std::sync::Arc<S>
where
    S: TicketSource + ?Sized,
{
    async fn fetch_ticket_records(&self) -> Result<Vec<RawTicketRecord>, SourceError> {
        (**self).fetch_ticket_records().await
    }
}
