//! Inventory demand domain.
//!
//! Ticket-material events as read from the transactional store, and the
//! deterministic monthly aggregation that turns them into model features
//! (no IO, no HTTP, no storage).

pub mod monthly;
pub mod ticket;

pub use monthly::{aggregate_monthly, ExclusionReport, MonthlyAggregation, MonthlyFeatureRow};
pub use ticket::{MaterialKind, RawTicketRecord};
