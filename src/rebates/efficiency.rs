//! Efficiency rebate
//!
//! Enrolled customers earn a rate on sales above a fixed floor when they keep
//! credits under 1% of rebate sales and grow over the prior year. The rate is
//! tiered on line value (dollars per shipped line):
//!
//! | Line value   | Rate |
//! |--------------|------|
//! | [20, 25)     | 1.0% |
//! | [25, 30)     | 1.5% |
//! | 30 and above | 2.0% |
//!
//! Sales below the floor are not clamped: an eligible customer under the
//! floor gets a negative amount.

use log::debug;
use serde::{Deserialize, Serialize};

use super::prior_year::prior_year_sales;
use super::RebateContext;
use crate::error::{EngineResult, ErrorSummary};
use crate::store::EfficiencyMetrics;

/// Rebate sales below this earn nothing
pub const SALES_FLOOR: f64 = 500_000.0;

/// Credits must stay under this percentage of rebate sales
pub const MAX_CREDIT_PCT: f64 = 1.0;

/// Program label on detail rows
pub const LABEL: &str = "Efficiency";

/// Rate for a line value, 0 below the first tier
pub fn tier_rate(line_value: f64) -> f64 {
    if line_value >= 30.0 {
        0.02
    } else if line_value >= 25.0 {
        0.015
    } else if line_value >= 20.0 {
        0.01
    } else {
        0.0
    }
}

/// Figures the efficiency formula is evaluated on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyInputs {
    pub credit_total: f64,
    pub rebate_sales: f64,
    pub comparison_sales: f64,
    pub previous_year_sales: f64,
    pub line_value: f64,
    /// credit_total / rebate_sales * 100
    pub credit_pct: f64,
}

impl EfficiencyInputs {
    pub fn new(metrics: EfficiencyMetrics, previous_year_sales: f64) -> Self {
        let credit_pct = if metrics.rebate_sales != 0.0 {
            metrics.credit_total / metrics.rebate_sales * 100.0
        } else if metrics.credit_total == 0.0 {
            0.0
        } else {
            f64::INFINITY
        };

        Self {
            credit_total: metrics.credit_total,
            rebate_sales: metrics.rebate_sales,
            comparison_sales: metrics.comparison_sales,
            previous_year_sales,
            line_value: metrics.line_value,
            credit_pct,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.credit_pct < MAX_CREDIT_PCT && self.comparison_sales > self.previous_year_sales
    }

    pub fn rate(&self) -> f64 {
        tier_rate(self.line_value)
    }

    pub fn amount(&self) -> f64 {
        if self.is_eligible() {
            self.rate() * (self.rebate_sales - SALES_FLOOR)
        } else {
            0.0
        }
    }
}

/// Audit row emitted for every enrolled customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyDetail {
    pub customer_id: String,
    pub inputs: EfficiencyInputs,
    pub eligible: bool,
    pub rate: f64,
    pub amount: f64,
}

/// Evaluates the efficiency program for one enrollment program name
#[derive(Debug, Clone)]
pub struct EfficiencyEvaluator {
    program: String,
}

impl EfficiencyEvaluator {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Detail row for an enrolled customer, `None` when not enrolled.
    ///
    /// A failed lookup drops the program for this customer only.
    pub fn evaluate(
        &self,
        ctx: &RebateContext<'_>,
        customer_id: &str,
        summary: &mut ErrorSummary,
    ) -> Option<EfficiencyDetail> {
        match self.try_evaluate(ctx, customer_id, summary) {
            Ok(detail) => detail,
            Err(e) => {
                summary.record(customer_id, LABEL, e);
                None
            }
        }
    }

    fn try_evaluate(
        &self,
        ctx: &RebateContext<'_>,
        customer_id: &str,
        summary: &mut ErrorSummary,
    ) -> EngineResult<Option<EfficiencyDetail>> {
        if !ctx.store.efficiency_enrolled(&self.program, customer_id)? {
            return Ok(None);
        }

        let metrics = match ctx.store.efficiency_metrics(&ctx.period, customer_id)? {
            Some(metrics) => metrics,
            None => {
                debug!("customer {}: enrolled but no efficiency metrics", customer_id);
                EfficiencyMetrics {
                    credit_total: 0.0,
                    rebate_sales: 0.0,
                    comparison_sales: 0.0,
                    line_value: 0.0,
                }
            }
        };

        let previous_year_sales = prior_year_sales(ctx, customer_id, summary);
        let inputs = EfficiencyInputs::new(metrics, previous_year_sales);

        Ok(Some(EfficiencyDetail {
            customer_id: customer_id.to_string(),
            eligible: inputs.is_eligible(),
            rate: inputs.rate(),
            amount: inputs.amount(),
            inputs,
        }))
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

    fn metrics(credit_total: f64, rebate_sales: f64, comparison_sales: f64, line_value: f64) -> EfficiencyMetrics {
        EfficiencyMetrics { credit_total, rebate_sales, comparison_sales, line_value }
    }

    fn period() -> Period {
        Period::new(d(2025, 1, 1), d(2025, 12, 31)).unwrap()
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier_rate(19.999), 0.0);
        assert_eq!(tier_rate(20.0), 0.01);
        assert_eq!(tier_rate(24.999), 0.01);
        assert_eq!(tier_rate(25.0), 0.015);
        assert_eq!(tier_rate(29.999), 0.015);
        assert_eq!(tier_rate(30.0), 0.02);
        assert_eq!(tier_rate(85.0), 0.02);
        assert_eq!(tier_rate(f64::NAN), 0.0);
    }

    #[test]
    fn test_credit_pct_blocks_eligibility_at_any_line_value() {
        for line_value in [0.0, 20.0, 27.0, 45.0] {
            // 7,000 / 700,000 = exactly 1%
            let inputs = EfficiencyInputs::new(metrics(7_000.0, 700_000.0, 900_000.0, line_value), 100.0);
            assert_relative_eq!(inputs.credit_pct, 1.0);
            assert!(!inputs.is_eligible());
            assert_eq!(inputs.amount(), 0.0);
        }
    }

    #[test]
    fn test_no_growth_blocks_eligibility() {
        for line_value in [20.0, 27.0, 45.0] {
            let flat = EfficiencyInputs::new(metrics(0.0, 700_000.0, 650_000.0, line_value), 650_000.0);
            assert!(!flat.is_eligible());
            assert_eq!(flat.amount(), 0.0);

            let shrinking = EfficiencyInputs::new(metrics(0.0, 700_000.0, 600_000.0, line_value), 650_000.0);
            assert_eq!(shrinking.amount(), 0.0);
        }
    }

    #[test]
    fn test_below_floor_is_not_clamped() {
        let inputs = EfficiencyInputs::new(metrics(0.0, 400_000.0, 400_000.0, 30.0), 100.0);
        assert!(inputs.is_eligible());
        assert_relative_eq!(inputs.amount(), -2_000.0);
    }

    #[test]
    fn test_zero_rebate_sales() {
        let inputs = EfficiencyInputs::new(metrics(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(inputs.credit_pct, 0.0);

        let with_credits = EfficiencyInputs::new(metrics(10.0, 0.0, 5.0, 0.0), 0.0);
        assert!(with_credits.credit_pct.is_infinite());
        assert!(!with_credits.is_eligible());
    }

    #[test]
    fn test_enrolled_customer_earns_tier_rate() {
        let mut store = MemoryStore::new(d(2025, 1, 1), d(2025, 12, 31));
        store
            .enroll("EFFICIENCY", "C001")
            .set_metrics("C001", metrics(3_500.0, 700_000.0, 750_000.0, 27.0))
            .add_sale("C001", d(2024, 5, 1), 600_000.0);

        let ctx = RebateContext::new(&store, period(), d(2026, 10, 17));
        let mut summary = ErrorSummary::new();
        let detail = EfficiencyEvaluator::new("EFFICIENCY")
            .evaluate(&ctx, "C001", &mut summary)
            .unwrap();

        assert_relative_eq!(detail.inputs.credit_pct, 0.5);
        assert_relative_eq!(detail.inputs.previous_year_sales, 600_000.0);
        assert!(detail.eligible);
        assert_relative_eq!(detail.amount, 3_000.0);
    }

    #[test]
    fn test_not_enrolled_has_no_detail() {
        let mut store = MemoryStore::new(d(2025, 1, 1), d(2025, 12, 31));
        store.set_metrics("C001", metrics(0.0, 900_000.0, 900_000.0, 35.0));

        let ctx = RebateContext::new(&store, period(), d(2026, 10, 17));
        let mut summary = ErrorSummary::new();
        let detail = EfficiencyEvaluator::new("EFFICIENCY").evaluate(&ctx, "C001", &mut summary);
        assert!(detail.is_none());
    }

    #[test]
    fn test_enrolled_without_metrics_still_emits_row() {
        let mut store = MemoryStore::new(d(2025, 1, 1), d(2025, 12, 31));
        store.enroll("EFFICIENCY", "C001");

        let ctx = RebateContext::new(&store, period(), d(2026, 10, 17));
        let mut summary = ErrorSummary::new();
        let detail = EfficiencyEvaluator::new("EFFICIENCY")
            .evaluate(&ctx, "C001", &mut summary)
            .unwrap();

        assert_eq!(detail.amount, 0.0);
        assert!(!detail.eligible);
    }

    #[test]
    fn test_lookup_failure_drops_program() {
        let mut inner = MemoryStore::new(d(2025, 1, 1), d(2025, 12, 31));
        inner.enroll("EFFICIENCY", "C001");
        let store = FlakyStore::new(inner).fail("efficiency_metrics");

        let ctx = RebateContext::new(&store, period(), d(2026, 10, 17));
        let mut summary = ErrorSummary::new();
        let detail = EfficiencyEvaluator::new("EFFICIENCY").evaluate(&ctx, "C001", &mut summary);

        assert!(detail.is_none());
        assert_eq!(summary.len(), 1);
    }
}
