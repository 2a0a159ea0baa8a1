//! In-memory store loaded from a directory of CSV extracts
//!
//! Expected files (header row required):
//! - `period.csv`: begin,end
//! - `customers.csv`: customer_id,name,parent_id,gross_sales,cogs,cash_discount,ar_total,ar_past
//! - `efficiency_enrollment.csv`: program,customer_id
//! - `efficiency_metrics.csv`: customer_id,credit_total,rebate_sales,comparison_sales,line_value
//! - `sales.csv`: customer_id,invoice_date,amount,qualifying
//! - `vendor_sales.csv`: customer_id,category,invoice_date,amount
//! - `quarterly_assignments.csv`: customer_id,calculator
//!
//! Only `period.csv` and `customers.csv` must exist; the rest default to empty.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{AssignmentRow, CustomerRow, EfficiencyMetrics, SalesStore, VendorCategory};
use crate::error::{StoreError, StoreResult};
use crate::period::Period;

#[derive(Debug, Deserialize)]
struct PeriodCsvRow {
    begin: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct CustomerCsvRow {
    customer_id: String,
    name: String,
    parent_id: Option<String>,
    gross_sales: f64,
    cogs: f64,
    #[serde(default)]
    cash_discount: f64,
    #[serde(default)]
    ar_total: f64,
    #[serde(default)]
    ar_past: f64,
}

#[derive(Debug, Deserialize)]
struct EnrollmentCsvRow {
    program: String,
    customer_id: String,
}

#[derive(Debug, Deserialize)]
struct MetricsCsvRow {
    customer_id: String,
    credit_total: f64,
    rebate_sales: f64,
    comparison_sales: f64,
    line_value: f64,
}

/// One invoice line total
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaleRow {
    pub customer_id: String,
    pub invoice_date: NaiveDate,
    pub amount: f64,
    #[serde(default = "default_qualifying")]
    pub qualifying: bool,
}

fn default_qualifying() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct VendorSaleCsvRow {
    customer_id: String,
    category: String,
    invoice_date: NaiveDate,
    amount: f64,
}

/// Vendor-program sales line
#[derive(Debug, Clone, PartialEq)]
pub struct VendorSaleRow {
    pub customer_id: String,
    pub category: VendorCategory,
    pub invoice_date: NaiveDate,
    pub amount: f64,
}

/// Store holding every extract in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub window: Option<(NaiveDate, NaiveDate)>,
    pub customers: Vec<CustomerRow>,
    /// customer id -> parent account id
    pub parents: HashMap<String, String>,
    /// (program, customer id)
    pub enrollments: HashSet<(String, String)>,
    pub metrics: HashMap<String, EfficiencyMetrics>,
    pub sales: Vec<SaleRow>,
    pub vendor_sales: Vec<VendorSaleRow>,
    pub assignments: Vec<AssignmentRow>,
}

impl MemoryStore {
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Self {
        Self {
            window: Some((begin, end)),
            ..Default::default()
        }
    }

    /// Load all extracts from a data directory
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref();
        let mut store = MemoryStore::default();

        let periods: Vec<PeriodCsvRow> = read_rows(dir, "period.csv", true)?;
        let period = periods.first().ok_or_else(|| {
            StoreError::Query("period.csv has no rows".to_string())
        })?;
        store.window = Some((period.begin, period.end));

        for row in read_rows::<CustomerCsvRow>(dir, "customers.csv", true)? {
            if let Some(parent) = row.parent_id.filter(|p| !p.is_empty()) {
                store.parents.insert(row.customer_id.clone(), parent);
            }
            store.customers.push(CustomerRow {
                customer_id: row.customer_id,
                name: row.name,
                gross_sales: row.gross_sales,
                cogs: row.cogs,
                cash_discount: row.cash_discount,
                ar_total: row.ar_total,
                ar_past: row.ar_past,
            });
        }

        for row in read_rows::<EnrollmentCsvRow>(dir, "efficiency_enrollment.csv", false)? {
            store.enrollments.insert((row.program, row.customer_id));
        }

        for row in read_rows::<MetricsCsvRow>(dir, "efficiency_metrics.csv", false)? {
            store.metrics.insert(
                row.customer_id,
                EfficiencyMetrics {
                    credit_total: row.credit_total,
                    rebate_sales: row.rebate_sales,
                    comparison_sales: row.comparison_sales,
                    line_value: row.line_value,
                },
            );
        }

        store.sales = read_rows(dir, "sales.csv", false)?;

        for row in read_rows::<VendorSaleCsvRow>(dir, "vendor_sales.csv", false)? {
            store.vendor_sales.push(VendorSaleRow {
                customer_id: row.customer_id,
                category: row.category.parse()?,
                invoice_date: row.invoice_date,
                amount: row.amount,
            });
        }

        store.assignments = read_rows(dir, "quarterly_assignments.csv", false)?;

        debug!(
            "loaded {} customers, {} sales lines, {} assignments from {}",
            store.customers.len(),
            store.sales.len(),
            store.assignments.len(),
            dir.display()
        );

        Ok(store)
    }

    pub fn add_customer(&mut self, customer_id: &str, gross_sales: f64, cogs: f64) -> &mut Self {
        self.customers.push(CustomerRow {
            customer_id: customer_id.to_string(),
            name: format!("Customer {}", customer_id),
            gross_sales,
            cogs,
            cash_discount: 0.0,
            ar_total: 0.0,
            ar_past: 0.0,
        });
        self
    }

    pub fn set_parent(&mut self, customer_id: &str, parent_id: &str) -> &mut Self {
        self.parents.insert(customer_id.to_string(), parent_id.to_string());
        self
    }

    pub fn enroll(&mut self, program: &str, customer_id: &str) -> &mut Self {
        self.enrollments.insert((program.to_string(), customer_id.to_string()));
        self
    }

    pub fn set_metrics(&mut self, customer_id: &str, metrics: EfficiencyMetrics) -> &mut Self {
        self.metrics.insert(customer_id.to_string(), metrics);
        self
    }

    pub fn add_sale(&mut self, customer_id: &str, invoice_date: NaiveDate, amount: f64) -> &mut Self {
        self.sales.push(SaleRow {
            customer_id: customer_id.to_string(),
            invoice_date,
            amount,
            qualifying: true,
        });
        self
    }

    pub fn add_vendor_sale(
        &mut self,
        customer_id: &str,
        category: VendorCategory,
        invoice_date: NaiveDate,
        amount: f64,
    ) -> &mut Self {
        self.vendor_sales.push(VendorSaleRow {
            customer_id: customer_id.to_string(),
            category,
            invoice_date,
            amount,
        });
        self
    }

    pub fn assign(&mut self, customer_id: &str, calculator: &str) -> &mut Self {
        self.assignments.push(AssignmentRow {
            customer_id: customer_id.to_string(),
            calculator: calculator.to_string(),
        });
        self
    }

    fn account_of<'a>(&'a self, customer_id: &'a str) -> &'a str {
        self.parents
            .get(customer_id)
            .map(String::as_str)
            .unwrap_or(customer_id)
    }
}

impl SalesStore for MemoryStore {
    fn period_window(&self) -> StoreResult<(NaiveDate, NaiveDate)> {
        self.window
            .ok_or_else(|| StoreError::Query("no reporting period configured".to_string()))
    }

    fn customer_feed(&self, _period: &Period) -> StoreResult<Vec<CustomerRow>> {
        let mut rows = self.customers.clone();
        rows.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
        Ok(rows)
    }

    fn efficiency_enrolled(&self, program: &str, customer_id: &str) -> StoreResult<bool> {
        Ok(self
            .enrollments
            .contains(&(program.to_string(), customer_id.to_string())))
    }

    fn efficiency_metrics(
        &self,
        _period: &Period,
        customer_id: &str,
    ) -> StoreResult<Option<EfficiencyMetrics>> {
        Ok(self.metrics.get(customer_id).copied())
    }

    fn prior_year_sales(&self, window: &Period, customer_id: &str) -> StoreResult<Option<f64>> {
        let account = self.account_of(customer_id);
        let mut lines = self
            .sales
            .iter()
            .filter(|s| s.qualifying && window.contains(s.invoice_date))
            .filter(|s| self.account_of(&s.customer_id) == account)
            .peekable();

        if lines.peek().is_none() {
            return Ok(None);
        }
        Ok(Some(lines.map(|s| s.amount).sum()))
    }

    fn quarterly_assignments(&self, _period: &Period) -> StoreResult<Vec<AssignmentRow>> {
        let mut rows = self.assignments.clone();
        // stable: keeps each customer's calculators in feed order
        rows.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
        Ok(rows)
    }

    fn vendor_category_sales(
        &self,
        customer_id: &str,
        category: VendorCategory,
        period: &Period,
    ) -> StoreResult<Option<f64>> {
        let mut lines = self
            .vendor_sales
            .iter()
            .filter(|v| v.customer_id == customer_id && v.category == category)
            .filter(|v| period.contains(v.invoice_date))
            .peekable();

        if lines.peek().is_none() {
            return Ok(None);
        }
        Ok(Some(lines.map(|v| v.amount).sum()))
    }

    fn quarterly_sales(&self, period: &Period, customer_id: &str) -> StoreResult<[f64; 4]> {
        let account = self.account_of(customer_id);
        let mut quarters = [0.0; 4];
        for sale in self
            .sales
            .iter()
            .filter(|s| s.qualifying && period.contains(s.invoice_date))
            .filter(|s| self.account_of(&s.customer_id) == account)
        {
            quarters[Period::quarter_index(sale.invoice_date)] += sale.amount;
        }
        Ok(quarters)
    }
}

/// Deserialize every row of `file`; a missing optional file yields no rows
fn read_rows<T: DeserializeOwned>(dir: &Path, file: &str, required: bool) -> StoreResult<Vec<T>> {
    let path = dir.join(file);
    if !required && !path.exists() {
        debug!("{} not present, treating as empty", path.display());
        return Ok(Vec::new());
    }

    let handle = File::open(&path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(handle);

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}
