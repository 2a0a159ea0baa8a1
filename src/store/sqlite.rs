//! SQLite-backed store
//!
//! Dates are stored as ISO-8601 text, so range filters compare lexically.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::{AssignmentRow, CustomerRow, EfficiencyMetrics, SalesStore, VendorCategory};
use crate::error::{StoreError, StoreResult};
use crate::period::Period;

/// Tables the store reads from
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS report_period (
    begin_date TEXT NOT NULL,
    end_date   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS customers (
    customer_id   TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    parent_id     TEXT,
    gross_sales   REAL NOT NULL DEFAULT 0,
    cogs          REAL NOT NULL DEFAULT 0,
    cash_discount REAL NOT NULL DEFAULT 0,
    ar_total      REAL NOT NULL DEFAULT 0,
    ar_past       REAL NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS efficiency_enrollment (
    program     TEXT NOT NULL,
    customer_id TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS efficiency_metrics (
    customer_id      TEXT PRIMARY KEY,
    credit_total     REAL NOT NULL,
    rebate_sales     REAL NOT NULL,
    comparison_sales REAL NOT NULL,
    line_value       REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS sales (
    customer_id  TEXT NOT NULL,
    invoice_date TEXT NOT NULL,
    amount       REAL NOT NULL,
    qualifying   INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS vendor_sales (
    customer_id  TEXT NOT NULL,
    category     TEXT NOT NULL,
    invoice_date TEXT NOT NULL,
    amount       REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS quarterly_assignments (
    customer_id TEXT NOT NULL,
    calculator  TEXT NOT NULL,
    seq         INTEGER NOT NULL DEFAULT 0
);
"#;

/// Store running every read operation as a SQL query
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Create any missing tables
    pub fn init_schema(&self) -> StoreResult<()> {
        self.get_conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn get_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Query(format!("connection lock poisoned: {}", e)))
    }
}

impl SalesStore for SqliteStore {
    fn period_window(&self) -> StoreResult<(NaiveDate, NaiveDate)> {
        let conn = self.get_conn()?;
        let window = conn
            .query_row(
                "SELECT begin_date, end_date FROM report_period LIMIT 1",
                [],
                |row| Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, NaiveDate>(1)?)),
            )
            .optional()?;

        window.ok_or_else(|| StoreError::Query("report_period is empty".to_string()))
    }

    fn customer_feed(&self, _period: &Period) -> StoreResult<Vec<CustomerRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT customer_id, name, gross_sales, cogs, cash_discount, ar_total, ar_past
            FROM customers
            ORDER BY customer_id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CustomerRow {
                    customer_id: row.get(0)?,
                    name: row.get(1)?,
                    gross_sales: row.get(2)?,
                    cogs: row.get(3)?,
                    cash_discount: row.get(4)?,
                    ar_total: row.get(5)?,
                    ar_past: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn efficiency_enrolled(&self, program: &str, customer_id: &str) -> StoreResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM efficiency_enrollment WHERE program = ?1 AND customer_id = ?2",
            params![program, customer_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn efficiency_metrics(
        &self,
        _period: &Period,
        customer_id: &str,
    ) -> StoreResult<Option<EfficiencyMetrics>> {
        let conn = self.get_conn()?;
        let metrics = conn
            .query_row(
                r#"
                SELECT credit_total, rebate_sales, comparison_sales, line_value
                FROM efficiency_metrics
                WHERE customer_id = ?1
                "#,
                params![customer_id],
                |row| {
                    Ok(EfficiencyMetrics {
                        credit_total: row.get(0)?,
                        rebate_sales: row.get(1)?,
                        comparison_sales: row.get(2)?,
                        line_value: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(metrics)
    }

    fn prior_year_sales(&self, window: &Period, customer_id: &str) -> StoreResult<Option<f64>> {
        let conn = self.get_conn()?;
        let total: Option<f64> = conn.query_row(
            r#"
            SELECT SUM(s.amount)
            FROM sales s
            LEFT JOIN customers c ON c.customer_id = s.customer_id
            WHERE s.qualifying = 1
              AND s.invoice_date BETWEEN ?2 AND ?3
              AND COALESCE(NULLIF(c.parent_id, ''), s.customer_id) = COALESCE(
                  (SELECT NULLIF(parent_id, '') FROM customers WHERE customer_id = ?1),
                  ?1)
            "#,
            params![customer_id, window.begin, window.end],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn quarterly_assignments(&self, _period: &Period) -> StoreResult<Vec<AssignmentRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT customer_id, calculator FROM quarterly_assignments ORDER BY customer_id, seq",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(AssignmentRow {
                    customer_id: row.get(0)?,
                    calculator: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn vendor_category_sales(
        &self,
        customer_id: &str,
        category: VendorCategory,
        period: &Period,
    ) -> StoreResult<Option<f64>> {
        let conn = self.get_conn()?;
        let total: Option<f64> = conn.query_row(
            r#"
            SELECT SUM(amount)
            FROM vendor_sales
            WHERE customer_id = ?1
              AND UPPER(category) = ?2
              AND invoice_date BETWEEN ?3 AND ?4
            "#,
            params![customer_id, category.as_str(), period.begin, period.end],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn quarterly_sales(&self, period: &Period, customer_id: &str) -> StoreResult<[f64; 4]> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT (CAST(strftime('%m', s.invoice_date) AS INTEGER) - 1) / 3 AS quarter,
                   SUM(s.amount)
            FROM sales s
            LEFT JOIN customers c ON c.customer_id = s.customer_id
            WHERE s.qualifying = 1
              AND s.invoice_date BETWEEN ?2 AND ?3
              AND COALESCE(NULLIF(c.parent_id, ''), s.customer_id) = COALESCE(
                  (SELECT NULLIF(parent_id, '') FROM customers WHERE customer_id = ?1),
                  ?1)
            GROUP BY quarter
            "#,
        )?;

        let mut quarters = [0.0; 4];
        let rows = stmt.query_map(params![customer_id, period.begin, period.end], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (quarter, amount) = row?;
            let slot = quarters.get_mut(quarter as usize).ok_or_else(|| StoreError::Parse {
                field: "invoice_date".to_string(),
                value: format!("quarter {}", quarter),
            })?;
            *slot = amount;
        }
        Ok(quarters)
    }
}
