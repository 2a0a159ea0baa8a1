//! Comparable prior-year sales for a customer

use log::debug;

use super::RebateContext;
use crate::error::ErrorSummary;

/// Qualifying parent-account sales over the prior-year window of `ctx.period`.
///
/// No matching sales and a failed lookup both count as zero; the failure is
/// recorded.
pub fn prior_year_sales(ctx: &RebateContext<'_>, customer_id: &str, summary: &mut ErrorSummary) -> f64 {
    let window = ctx.period.prior(ctx.today);

    match ctx.store.prior_year_sales(&window, customer_id) {
        Ok(Some(total)) => total,
        Ok(None) => {
            debug!("customer {}: no prior-year sales in {}", customer_id, window);
            0.0
        }
        Err(e) => {
            summary.record(customer_id, "prior year sales", e);
            0.0
        }
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

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new(d(2026, 1, 1), d(2026, 12, 31));
        store
            .add_sale("C001", d(2025, 3, 1), 1_000.0)
            .add_sale("C001", d(2025, 10, 17), 200.0)
            .add_sale("C001", d(2025, 11, 20), 5_000.0);
        store
    }

    #[test]
    fn test_open_year_stops_at_today_last_year() {
        let store = store();
        let period = Period::new(d(2026, 1, 1), d(2026, 12, 31)).unwrap();
        let ctx = RebateContext::new(&store, period, d(2026, 10, 17));
        let mut summary = ErrorSummary::new();

        assert_relative_eq!(prior_year_sales(&ctx, "C001", &mut summary), 1_200.0);
        assert!(summary.is_empty());
    }

    #[test]
    fn test_closed_year_uses_whole_window() {
        let store = store();
        let period = Period::new(d(2026, 1, 1), d(2026, 12, 31)).unwrap();
        let ctx = RebateContext::new(&store, period, d(2027, 2, 1));
        let mut summary = ErrorSummary::new();

        assert_relative_eq!(prior_year_sales(&ctx, "C001", &mut summary), 6_200.0);
    }

    #[test]
    fn test_failure_counts_as_zero() {
        let store = FlakyStore::new(store()).fail("prior_year_sales");
        let period = Period::new(d(2026, 1, 1), d(2026, 12, 31)).unwrap();
        let ctx = RebateContext::new(&store, period, d(2026, 10, 17));
        let mut summary = ErrorSummary::new();

        assert_eq!(prior_year_sales(&ctx, "C001", &mut summary), 0.0);
        assert_eq!(summary.len(), 1);
    }
}
