//! Vendor rebate allocation across the four vendor-funded pools

use serde::{Deserialize, Serialize};

use super::RebateContext;
use crate::error::ErrorSummary;
use crate::store::VendorCategory;

/// A customer's qualifying sales per vendor category
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorAllocation {
    /// Indexed by `VendorCategory::index`
    pub by_category: [f64; 4],
}

impl VendorAllocation {
    /// Look up each category independently; a failed category counts as zero
    /// without affecting the others.
    pub fn allocate(ctx: &RebateContext<'_>, customer_id: &str, summary: &mut ErrorSummary) -> Self {
        let mut allocation = VendorAllocation::default();

        for category in VendorCategory::ALL {
            let amount = match ctx.store.vendor_category_sales(customer_id, category, &ctx.period) {
                Ok(amount) => amount.unwrap_or(0.0),
                Err(e) => {
                    summary.record(customer_id, &format!("vendor {}", category.as_str()), e);
                    0.0
                }
            };
            allocation.by_category[category.index()] = amount;
        }

        allocation
    }

    pub fn get(&self, category: VendorCategory) -> f64 {
        self.by_category[category.index()]
    }

    pub fn total(&self) -> f64 {
        self.by_category.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use crate::store::testing::FlakyStore;
    use crate::store::MemoryStore;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_allocates_each_category() {
        let mut store = MemoryStore::new(d(2025, 1, 1), d(2025, 12, 31));
        store
            .add_vendor_sale("C001", VendorCategory::A, d(2025, 2, 1), 100.0)
            .add_vendor_sale("C001", VendorCategory::A, d(2025, 9, 1), 50.0)
            .add_vendor_sale("C001", VendorCategory::Growth, d(2025, 3, 1), 20.0)
            .add_vendor_sale("C001", VendorCategory::Monthly, d(2024, 3, 1), 999.0)
            .add_vendor_sale("C002", VendorCategory::Quarterly, d(2025, 3, 1), 999.0);

        let period = Period::new(d(2025, 1, 1), d(2025, 12, 31)).unwrap();
        let ctx = RebateContext::new(&store, period, d(2026, 1, 5));
        let mut summary = ErrorSummary::new();
        let allocation = VendorAllocation::allocate(&ctx, "C001", &mut summary);

        assert_relative_eq!(allocation.get(VendorCategory::A), 150.0);
        assert_eq!(allocation.get(VendorCategory::Monthly), 0.0);
        assert_eq!(allocation.get(VendorCategory::Quarterly), 0.0);
        assert_relative_eq!(allocation.get(VendorCategory::Growth), 20.0);
        assert_relative_eq!(allocation.total(), 170.0);
        assert!(summary.is_empty());
    }

    #[test]
    fn test_failure_is_isolated_to_customer() {
        let mut inner = MemoryStore::new(d(2025, 1, 1), d(2025, 12, 31));
        inner.add_vendor_sale("C002", VendorCategory::A, d(2025, 2, 1), 10.0);
        let store = FlakyStore::new(inner).fail_for("vendor_category_sales", "C001");

        let period = Period::new(d(2025, 1, 1), d(2025, 12, 31)).unwrap();
        let ctx = RebateContext::new(&store, period, d(2026, 1, 5));
        let mut summary = ErrorSummary::new();

        let failed = VendorAllocation::allocate(&ctx, "C001", &mut summary);
        assert_eq!(failed.total(), 0.0);
        assert_eq!(summary.len(), 4);

        let ok = VendorAllocation::allocate(&ctx, "C002", &mut summary);
        assert_relative_eq!(ok.total(), 10.0);
        assert_eq!(summary.len(), 4);
    }
}
