//! MySQL-backed ticket source.
//!
//! ## Error Mapping
//!
//! | SQLx Error | SourceError | Scenario |
//! |------------|-------------|----------|
//! | Io / Tls / PoolTimedOut / PoolClosed / Configuration | `Connection` | database unreachable or misconfigured |
//! | ColumnNotFound | `MissingColumn` | schema no longer matches the query |
//! | ColumnDecode | `Decode` | a column holds an unexpected type |
//! | Database / other | `Query` | the server rejected the query |
//!
//! The query casts to `DOUBLE`, which needs MySQL 8.0.17+ or MariaDB 10.4.5+.

use std::str::FromStr;

use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{FromRow, Row};
use tracing::{debug, instrument};

use stockcast_core::MaterialId;
use stockcast_inventory::{MaterialKind, RawTicketRecord};

use super::{SourceError, TicketSource};
use crate::config::DatabaseConfig;

/// One row per ticket-material event, joined with the catalog and the two
/// stock aggregates. Both aggregates are selected; the serialization flag
/// decides which one counts.
pub const TICKET_MATERIALS_QUERY: &str = r#"
    SELECT
        CAST(tm.material_id AS SIGNED) AS MaterialID,
        CAST(tm.fecha AS DATETIME) AS fecha,
        CAST(tm.cantidad AS DOUBLE) AS Demand,
        CAST(tm.stock_anterior AS DOUBLE) AS stock_anterior,
        CAST(tm.stock_actual AS DOUBLE) AS stock_actual,
        CAST((tm.serial IS NOT NULL) AS SIGNED) AS has_serial,
        cm.name AS MaterialName,
        cm.description AS MaterialDescription,
        CAST(cm.stock_minimo_default AS DOUBLE) AS StockMinimo,
        CAST(ms_salida.count AS DOUBLE) AS serial_in_use,
        CAST(ms_sinserial.quantity AS DOUBLE) AS bulk_quantity
    FROM ticket_materiales tm
    LEFT JOIN catalogo_materiales cm
        ON cm.codigo_equipo = tm.codigo_material
    LEFT JOIN (
        SELECT id AS idserial, COUNT(*) AS count
        FROM materiales_serial
        WHERE estado IN ('en uso', 'asignado')
        GROUP BY idserial
    ) ms_salida
        ON tm.material_id = ms_salida.idserial
    LEFT JOIN (
        SELECT id AS idsinserial, SUM(quantity) AS quantity
        FROM materiales_sinserial
        GROUP BY idsinserial
    ) ms_sinserial
        ON tm.material_id = ms_sinserial.idsinserial
"#;

/// Reads ticket records from the transactional MySQL database.
///
/// The pool connects lazily, so constructing the source never touches the
/// network; the first query does.
#[derive(Debug, Clone)]
pub struct MySqlTicketSource {
    pool: MySqlPool,
}

impl MySqlTicketSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn connect_lazy(database: &DatabaseConfig) -> Result<Self, SourceError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect_lazy_with(connect_options(database)?);
        Ok(Self::new(pool))
    }
}

fn connect_options(database: &DatabaseConfig) -> Result<MySqlConnectOptions, SourceError> {
    match database {
        DatabaseConfig::Url(url) => MySqlConnectOptions::from_str(url).map_err(map_sqlx_error),
        DatabaseConfig::Parts {
            user,
            password,
            host,
            port,
            name,
        } => {
            let options = MySqlConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .database(name);
            Ok(match password {
                Some(password) => options.password(password),
                None => options,
            })
        }
    }
}

#[async_trait::async_trait]
impl TicketSource for MySqlTicketSource {
    #[instrument(skip(self), err)]
    async fn fetch_ticket_records(&self) -> Result<Vec<RawTicketRecord>, SourceError> {
        let rows = sqlx::query(TICKET_MATERIALS_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let ticket = TicketRow::from_row(row).map_err(map_sqlx_error)?;
            records.push(ticket.into());
        }

        debug!(records = records.len(), "ticket records fetched");
        Ok(records)
    }
}

struct TicketRow {
    material_id: Option<i64>,
    fecha: Option<NaiveDateTime>,
    demand: Option<f64>,
    stock_before: Option<f64>,
    stock_after: Option<f64>,
    has_serial: Option<i64>,
    name: Option<String>,
    description: Option<String>,
    minimum_stock: Option<f64>,
    serial_in_use: Option<f64>,
    bulk_quantity: Option<f64>,
}

impl<'r> FromRow<'r, MySqlRow> for TicketRow {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(TicketRow {
            material_id: row.try_get("MaterialID")?,
            fecha: row.try_get("fecha")?,
            demand: row.try_get("Demand")?,
            stock_before: row.try_get("stock_anterior")?,
            stock_after: row.try_get("stock_actual")?,
            has_serial: row.try_get("has_serial")?,
            name: row.try_get("MaterialName")?,
            description: row.try_get("MaterialDescription")?,
            minimum_stock: row.try_get("StockMinimo")?,
            serial_in_use: row.try_get("serial_in_use")?,
            bulk_quantity: row.try_get("bulk_quantity")?,
        })
    }
}

impl From<TicketRow> for RawTicketRecord {
    fn from(row: TicketRow) -> Self {
        RawTicketRecord {
            material_id: row.material_id.map(MaterialId::new),
            event_at: row.fecha,
            demand: row.demand,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            kind: MaterialKind::from_serial_present(row.has_serial.unwrap_or(0) != 0),
            material_name: row.name,
            material_description: row.description,
            minimum_stock: row.minimum_stock,
            serialized_in_use: row.serial_in_use,
            bulk_quantity: row.bulk_quantity,
        }
    }
}

fn map_sqlx_error(err: sqlx::Error) -> SourceError {
    match err {
        sqlx::Error::ColumnNotFound(column) => SourceError::MissingColumn(column),
        sqlx::Error::ColumnDecode { index, source } => SourceError::Decode {
            column: index,
            reason: source.to_string(),
        },
        e @ (sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_)) => SourceError::Connection(e.to_string()),
        sqlx::Error::Database(db_err) => SourceError::Query(db_err.message().to_string()),
        other => SourceError::Query(other.to_string()),
    }
}
