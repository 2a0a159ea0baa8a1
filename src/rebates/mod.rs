//! Rebate programs computed per customer
//!
//! - **Efficiency**: tiered rate on sales density, gated on credits and growth
//! - **Vendor allocation**: customer sales apportioned to vendor-funded pools
//! - **Quarterly**: calculators assigned to a customer by name in a data feed
//! - **Static programs**: one-off programs bound to the coop and other slots

pub mod calculators;
pub mod efficiency;
pub mod prior_year;
pub mod quarterly;
pub mod vendor;

pub use calculators::{
    CalculatorDef, CalculatorDispatch, CalculatorRegistry, ProgramOutcome, ProgramSlot,
    RebateCalculator, StaticProgram, STATIC_PROGRAMS,
};
pub use efficiency::{EfficiencyDetail, EfficiencyEvaluator, EfficiencyInputs};
pub use quarterly::AssignmentScanner;
pub use vendor::VendorAllocation;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::period::Period;
use crate::store::SalesStore;

/// Everything a program needs to look up a customer's figures
#[derive(Clone, Copy)]
pub struct RebateContext<'a> {
    pub store: &'a dyn SalesStore,
    pub period: Period,
    /// Date the run treats as "today" for open-period comparisons
    pub today: NaiveDate,
}

impl<'a> RebateContext<'a> {
    pub fn new(store: &'a dyn SalesStore, period: Period, today: NaiveDate) -> Self {
        Self { store, period, today }
    }
}

/// Amount one program credits one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebateResult {
    pub customer_id: String,
    pub program_label: String,
    pub amount: f64,
    /// Q1..Q4 breakdown; when present `amount` is its sum
    pub quarters: Option<[f64; 4]>,
}

impl RebateResult {
    pub fn flat(customer_id: &str, program_label: &str, amount: f64) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            program_label: program_label.to_string(),
            amount,
            quarters: None,
        }
    }

    pub fn quarterly(customer_id: &str, program_label: &str, quarters: [f64; 4]) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            program_label: program_label.to_string(),
            amount: quarters.iter().sum(),
            quarters: Some(quarters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quarterly_amount_is_sum_of_quarters() {
        let result = RebateResult::quarterly("C001", "Quarterly 1%", [10.0, 20.5, 0.0, 4.25]);
        assert_relative_eq!(result.amount, 34.75);
        assert_eq!(result.quarters, Some([10.0, 20.5, 0.0, 4.25]));
    }

    #[test]
    fn test_flat_has_no_breakdown() {
        let result = RebateResult::flat("C001", "Coop", 12.0);
        assert!(result.quarters.is_none());
    }
}
