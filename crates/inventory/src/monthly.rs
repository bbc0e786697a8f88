//! Monthly feature aggregation.
//!
//! Groups ticket events by (material, calendar month), sums demand and
//! realized usage, and attaches the material's current stock and display name
//! from its most recent catalogued event (one carrying a name). Rows missing any required value are dropped
//! and reported through [`ExclusionReport`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stockcast_core::{MaterialId, YearMonth};

use crate::ticket::RawTicketRecord;

/// One row per (material, month), ready to be fed to the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyFeatureRow {
    #[serde(rename = "MaterialID")]
    pub material_id: MaterialId,
    #[serde(rename = "YearMonth")]
    pub year_month: YearMonth,
    #[serde(rename = "Demand")]
    pub demand: f64,
    #[serde(rename = "RealUsage")]
    pub real_usage: f64,
    #[serde(rename = "StockActual")]
    pub stock_actual: f64,
    #[serde(rename = "MaterialName")]
    pub material_name: String,
}

/// What the aggregation had to leave out, and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionReport {
    /// Records without a material id or event date (cannot be bucketed).
    pub unbucketed_records: usize,
    /// Monthly rows dropped because at least one required value was missing.
    pub dropped_rows: usize,
    pub missing_name_rows: usize,
    pub missing_demand_rows: usize,
    pub missing_usage_rows: usize,
    /// Distinct materials that lost at least one monthly row.
    pub excluded_materials: usize,
}

impl ExclusionReport {
    pub fn is_empty(&self) -> bool {
        self.unbucketed_records == 0 && self.dropped_rows == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyAggregation {
    /// Sorted by (material, month).
    pub rows: Vec<MonthlyFeatureRow>,
    pub exclusions: ExclusionReport,
}

#[derive(Debug, Default)]
struct MonthSums {
    demand: Option<f64>,
    usage: Option<f64>,
}

fn accumulate(acc: &mut Option<f64>, value: Option<f64>) {
    if let Some(v) = value {
        *acc = Some(acc.unwrap_or(0.0) + v);
    }
}

/// Aggregate raw ticket events into monthly feature rows.
///
/// The result depends only on the multiset of input records: records are put
/// in a canonical order before any floating point summation, and the "most
/// recent record" of a material is picked by event time with a total order
/// over the remaining fields as tie-break. Records without a catalog name
/// only count as most recent when the material has no named record at all.
pub fn aggregate_monthly(records: &[RawTicketRecord]) -> MonthlyAggregation {
    let mut exclusions = ExclusionReport::default();

    let mut keyed: Vec<(MaterialId, YearMonth, &RawTicketRecord)> = Vec::with_capacity(records.len());
    for r in records {
        match (r.material_id, r.month()) {
            (Some(id), Some(month)) => keyed.push((id, month, r)),
            _ => exclusions.unbucketed_records += 1,
        }
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| canonical_cmp(a.2, b.2)));

    let mut sums: BTreeMap<(MaterialId, YearMonth), MonthSums> = BTreeMap::new();
    let mut latest: BTreeMap<MaterialId, &RawTicketRecord> = BTreeMap::new();
    let mut latest_named: BTreeMap<MaterialId, &RawTicketRecord> = BTreeMap::new();

    for (id, month, r) in &keyed {
        let entry = sums.entry((*id, *month)).or_default();
        accumulate(&mut entry.demand, r.demand);
        accumulate(&mut entry.usage, r.realized_usage());
        // Ascending canonical order: the last record seen per material is the latest.
        latest.insert(*id, r);
        if r.material_name.is_some() {
            latest_named.insert(*id, r);
        }
    }

    let mut rows = Vec::with_capacity(sums.len());
    let mut excluded: BTreeSet<MaterialId> = BTreeSet::new();

    for ((material_id, year_month), s) in sums {
        let Some(last) = latest_named.get(&material_id).or_else(|| latest.get(&material_id)) else {
            continue;
        };
        let name = last.material_name.clone();

        if name.is_none() {
            exclusions.missing_name_rows += 1;
        }
        if s.demand.is_none() {
            exclusions.missing_demand_rows += 1;
        }
        if s.usage.is_none() {
            exclusions.missing_usage_rows += 1;
        }

        match (s.demand, s.usage, name) {
            (Some(demand), Some(real_usage), Some(material_name)) => rows.push(MonthlyFeatureRow {
                material_id,
                year_month,
                demand,
                real_usage,
                stock_actual: last.current_stock(),
                material_name,
            }),
            _ => {
                exclusions.dropped_rows += 1;
                excluded.insert(material_id);
            }
        }
    }
    exclusions.excluded_materials = excluded.len();

    if !exclusions.is_empty() {
        warn!(
            unbucketed_records = exclusions.unbucketed_records,
            dropped_rows = exclusions.dropped_rows,
            missing_name_rows = exclusions.missing_name_rows,
            missing_demand_rows = exclusions.missing_demand_rows,
            missing_usage_rows = exclusions.missing_usage_rows,
            excluded_materials = exclusions.excluded_materials,
            "monthly aggregation excluded incomplete data"
        );
    }
    debug!(records = records.len(), rows = rows.len(), "monthly aggregation finished");

    MonthlyAggregation { rows, exclusions }
}

fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Total order over every field except the material id (compared by the caller).
fn canonical_cmp(a: &RawTicketRecord, b: &RawTicketRecord) -> Ordering {
    a.event_at
        .cmp(&b.event_at)
        .then_with(|| cmp_f64(a.demand, b.demand))
        .then_with(|| cmp_f64(a.stock_before, b.stock_before))
        .then_with(|| cmp_f64(a.stock_after, b.stock_after))
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.material_name.cmp(&b.material_name))
        .then_with(|| a.material_description.cmp(&b.material_description))
        .then_with(|| cmp_f64(a.minimum_stock, b.minimum_stock))
        .then_with(|| cmp_f64(a.serialized_in_use, b.serialized_in_use))
        .then_with(|| cmp_f64(a.bulk_quantity, b.bulk_quantity))
}
