//! Rebate Engine - per-customer rebate computation for the customer profitability report
//!
//! This library provides:
//! - Reporting period and prior-year window resolution
//! - Efficiency rebate eligibility and tiered formula
//! - Vendor rebate allocation across the four vendor pools
//! - Quarterly calculators assigned by name from a data feed
//! - A single-pass runner that aggregates every program per customer

pub mod cancel;
pub mod config;
pub mod error;
pub mod period;
pub mod rebates;
pub mod report;
pub mod store;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use config::RunConfig;
pub use error::{RebateError, StoreError};
pub use period::Period;
pub use rebates::{CalculatorRegistry, RebateCalculator, RebateContext, RebateResult};
pub use report::{CustomerAggregate, RebateDetail, RebateRunner, ReportBuffer, ReportSink, RunStatus, RunSummary};
pub use store::{MemoryStore, SalesStore, SqliteStore};
