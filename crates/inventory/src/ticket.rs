use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use stockcast_core::{MaterialId, YearMonth};

/// How a material is tracked in stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    /// Tracked by unit (the ticket event references a serial number).
    #[serde(rename = "Serializado")]
    Serialized,
    /// Tracked by quantity.
    #[serde(rename = "No Serializado")]
    NonSerialized,
}

impl MaterialKind {
    pub fn from_serial_present(has_serial: bool) -> Self {
        if has_serial {
            MaterialKind::Serialized
        } else {
            MaterialKind::NonSerialized
        }
    }
}

/// One ticket-material event joined with catalog and stock aggregates.
///
/// Every column is optional except the serialization flag, mirroring what the
/// outer joins can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTicketRecord {
    pub material_id: Option<MaterialId>,
    pub event_at: Option<NaiveDateTime>,
    /// Requested quantity.
    pub demand: Option<f64>,
    pub stock_before: Option<f64>,
    pub stock_after: Option<f64>,
    pub kind: MaterialKind,
    pub material_name: Option<String>,
    pub material_description: Option<String>,
    pub minimum_stock: Option<f64>,
    /// Serialized units currently in use or assigned.
    pub serialized_in_use: Option<f64>,
    /// Summed quantity of non-serialized stock.
    pub bulk_quantity: Option<f64>,
}

impl RawTicketRecord {
    /// A record with only the required flag set; tests and fixtures fill in
    /// the rest.
    pub fn empty(kind: MaterialKind) -> Self {
        Self {
            material_id: None,
            event_at: None,
            demand: None,
            stock_before: None,
            stock_after: None,
            kind,
            material_name: None,
            material_description: None,
            minimum_stock: None,
            serialized_in_use: None,
            bulk_quantity: None,
        }
    }

    pub fn month(&self) -> Option<YearMonth> {
        self.event_at.map(YearMonth::from_datetime)
    }

    /// Stock consumed by the event: `stock_before - stock_after`.
    pub fn realized_usage(&self) -> Option<f64> {
        Some(self.stock_before? - self.stock_after?)
    }

    /// Current stock of the material.
    ///
    /// Exactly one subsidiary aggregate contributes, chosen by the serialization
    /// flag. A missing aggregate counts as zero and the result is never negative.
    pub fn current_stock(&self) -> f64 {
        let contributing = match self.kind {
            MaterialKind::Serialized => self.serialized_in_use,
            MaterialKind::NonSerialized => self.bulk_quantity,
        };
        match contributing {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => 0.0,
        }
    }
}
