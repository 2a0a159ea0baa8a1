//! Read operations against the sales data store
//!
//! The engine never talks to a database directly; everything it reads goes
//! through `SalesStore`. Two backends ship with the crate: a CSV data
//! directory loaded into memory and a SQLite database.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, SCHEMA};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::period::Period;

/// One row of the customer feed, figures already summed over the period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRow {
    pub customer_id: String,
    pub name: String,
    pub gross_sales: f64,
    pub cogs: f64,
    pub cash_discount: f64,
    pub ar_total: f64,
    pub ar_past: f64,
}

/// Efficiency program metrics for one customer over the period.
/// Prior-year sales are resolved separately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub credit_total: f64,
    pub rebate_sales: f64,
    pub comparison_sales: f64,
    pub line_value: f64,
}

/// Maps one customer to one named quarterly calculator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub customer_id: String,
    pub calculator: String,
}

/// Vendor-funded rebate pools a customer's sales are apportioned over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorCategory {
    A,
    Monthly,
    Quarterly,
    Growth,
}

impl VendorCategory {
    pub const ALL: [VendorCategory; 4] = [
        VendorCategory::A,
        VendorCategory::Monthly,
        VendorCategory::Quarterly,
        VendorCategory::Growth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VendorCategory::A => "A",
            VendorCategory::Monthly => "MONTHLY",
            VendorCategory::Quarterly => "QUARTERLY",
            VendorCategory::Growth => "GROWTH",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            VendorCategory::A => 0,
            VendorCategory::Monthly => 1,
            VendorCategory::Quarterly => 2,
            VendorCategory::Growth => 3,
        }
    }
}

impl std::str::FromStr for VendorCategory {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(VendorCategory::A),
            "MONTHLY" => Ok(VendorCategory::Monthly),
            "QUARTERLY" => Ok(VendorCategory::Quarterly),
            "GROWTH" => Ok(VendorCategory::Growth),
            other => Err(StoreError::Parse {
                field: "category".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Named, parameterized read operations the engine consumes.
///
/// `Ok(None)` means the lookup found no row; callers treat it as zero.
///
/// The customer feed, efficiency metrics and assignment feed are extracts
/// taken for the reporting period: their rows already describe that window
/// and carry no dates. `MemoryStore` and `SqliteStore` ignore the `period`
/// argument of those three operations. A store over undated history must
/// apply it itself. Sales lookups filter by invoice date in every store.
pub trait SalesStore {
    /// Reporting window configured for this run
    fn period_window(&self) -> StoreResult<(NaiveDate, NaiveDate)>;

    /// Customers with activity in the period, sorted by customer id
    fn customer_feed(&self, period: &Period) -> StoreResult<Vec<CustomerRow>>;

    fn efficiency_enrolled(&self, program: &str, customer_id: &str) -> StoreResult<bool>;

    /// Period totals feeding the efficiency formula
    fn efficiency_metrics(
        &self,
        period: &Period,
        customer_id: &str,
    ) -> StoreResult<Option<EfficiencyMetrics>>;

    /// Qualifying sales over `window`, rolled up to the customer's parent account
    fn prior_year_sales(&self, window: &Period, customer_id: &str) -> StoreResult<Option<f64>>;

    /// Every calculator assignment, sorted by customer id
    fn quarterly_assignments(&self, period: &Period) -> StoreResult<Vec<AssignmentRow>>;

    fn vendor_category_sales(
        &self,
        customer_id: &str,
        category: VendorCategory,
        period: &Period,
    ) -> StoreResult<Option<f64>>;

    /// Qualifying sales in the period split by calendar quarter, rolled up to
    /// the customer's parent account
    fn quarterly_sales(&self, period: &Period, customer_id: &str) -> StoreResult<[f64; 4]>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Store wrapper that fails chosen operations, for degradation tests

    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;

    pub struct FlakyStore {
        pub inner: MemoryStore,
        /// Operation names that fail for every customer
        pub failing_ops: HashSet<&'static str>,
        /// (operation, customer) pairs that fail
        pub failing_for: HashSet<(&'static str, String)>,
        pub assignment_loads: Cell<u32>,
    }

    impl FlakyStore {
        pub fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                failing_ops: HashSet::new(),
                failing_for: HashSet::new(),
                assignment_loads: Cell::new(0),
            }
        }

        pub fn fail(mut self, op: &'static str) -> Self {
            self.failing_ops.insert(op);
            self
        }

        pub fn fail_for(mut self, op: &'static str, customer_id: &str) -> Self {
            self.failing_for.insert((op, customer_id.to_string()));
            self
        }

        fn check(&self, op: &'static str, customer_id: &str) -> StoreResult<()> {
            if self.failing_ops.contains(op)
                || self.failing_for.contains(&(op, customer_id.to_string()))
            {
                return Err(StoreError::Query(format!("{} unavailable", op)));
            }
            Ok(())
        }
    }

    impl SalesStore for FlakyStore {
        fn period_window(&self) -> StoreResult<(NaiveDate, NaiveDate)> {
            self.check("period_window", "")?;
            self.inner.period_window()
        }

        fn customer_feed(&self, period: &Period) -> StoreResult<Vec<CustomerRow>> {
            self.check("customer_feed", "")?;
            self.inner.customer_feed(period)
        }

        fn efficiency_enrolled(&self, program: &str, customer_id: &str) -> StoreResult<bool> {
            self.check("efficiency_enrolled", customer_id)?;
            self.inner.efficiency_enrolled(program, customer_id)
        }

        fn efficiency_metrics(
            &self,
            period: &Period,
            customer_id: &str,
        ) -> StoreResult<Option<EfficiencyMetrics>> {
            self.check("efficiency_metrics", customer_id)?;
            self.inner.efficiency_metrics(period, customer_id)
        }

        fn prior_year_sales(&self, window: &Period, customer_id: &str) -> StoreResult<Option<f64>> {
            self.check("prior_year_sales", customer_id)?;
            self.inner.prior_year_sales(window, customer_id)
        }

        fn quarterly_assignments(&self, period: &Period) -> StoreResult<Vec<AssignmentRow>> {
            self.assignment_loads.set(self.assignment_loads.get() + 1);
            self.check("quarterly_assignments", "")?;
            self.inner.quarterly_assignments(period)
        }

        fn vendor_category_sales(
            &self,
            customer_id: &str,
            category: VendorCategory,
            period: &Period,
        ) -> StoreResult<Option<f64>> {
            self.check("vendor_category_sales", customer_id)?;
            self.inner.vendor_category_sales(customer_id, category, period)
        }

        fn quarterly_sales(&self, period: &Period, customer_id: &str) -> StoreResult<[f64; 4]> {
            self.check("quarterly_sales", customer_id)?;
            self.inner.quarterly_sales(period, customer_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_category_parse() {
        assert_eq!("monthly".parse::<VendorCategory>().unwrap(), VendorCategory::Monthly);
        assert_eq!(" Growth ".parse::<VendorCategory>().unwrap(), VendorCategory::Growth);
        assert!("rebate".parse::<VendorCategory>().is_err());
    }

    #[test]
    fn test_vendor_category_indexes_are_distinct() {
        let mut seen = [false; 4];
        for category in VendorCategory::ALL {
            assert!(!seen[category.index()]);
            seen[category.index()] = true;
        }
    }
}
