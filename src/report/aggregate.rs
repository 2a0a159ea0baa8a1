//! Per-customer aggregate and audit detail rows

use serde::{Deserialize, Serialize};

use crate::rebates::{EfficiencyDetail, ProgramOutcome, RebateResult, VendorAllocation};
use crate::store::CustomerRow;

/// One customer's profitability line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAggregate {
    pub customer_id: String,
    pub name: String,
    pub gross_sales: f64,
    pub coop_rebate: f64,
    pub efficiency_rebate: f64,
    pub quarterly_rebate: f64,
    pub other_rebate: f64,
    /// coop + efficiency + quarterly + other
    pub total_rebate: f64,
    pub cash_discount: f64,
    /// gross - total rebate - cash discount
    pub net_sales: f64,
    pub cogs: f64,
    /// gross - cogs
    pub margin: f64,
    pub ar_total: f64,
    pub ar_past: f64,
    pub vendor_rebate_by_category: [f64; 4],
    pub vendor_rebate_total: f64,
}

impl CustomerAggregate {
    /// Combine one customer's program results into its aggregate line
    pub fn build(
        customer: &CustomerRow,
        programs: &ProgramOutcome,
        efficiency_rebate: f64,
        vendor: &VendorAllocation,
    ) -> Self {
        let total_rebate = programs.coop + efficiency_rebate + programs.quarterly + programs.other;

        Self {
            customer_id: customer.customer_id.clone(),
            name: customer.name.clone(),
            gross_sales: customer.gross_sales,
            coop_rebate: programs.coop,
            efficiency_rebate,
            quarterly_rebate: programs.quarterly,
            other_rebate: programs.other,
            total_rebate,
            cash_discount: customer.cash_discount,
            net_sales: customer.gross_sales - total_rebate - customer.cash_discount,
            cogs: customer.cogs,
            margin: customer.gross_sales - customer.cogs,
            ar_total: customer.ar_total,
            ar_past: customer.ar_past,
            vendor_rebate_by_category: vendor.by_category,
            vendor_rebate_total: vendor.total(),
        }
    }
}

/// Audit row shown alongside the aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RebateDetail {
    Efficiency(EfficiencyDetail),
    Program(RebateResult),
}

impl RebateDetail {
    pub fn customer_id(&self) -> &str {
        match self {
            RebateDetail::Efficiency(detail) => &detail.customer_id,
            RebateDetail::Program(result) => &result.customer_id,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            RebateDetail::Efficiency(detail) => detail.amount,
            RebateDetail::Program(result) => result.amount,
        }
    }
}
