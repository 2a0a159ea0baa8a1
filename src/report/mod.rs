//! Customer profitability report assembly
//!
//! The runner emits one `CustomerAggregate` per customer, with its audit
//! detail rows, to a `ReportSink`. Formatting and file output belong to the
//! sink.

mod aggregate;
mod runner;

pub use aggregate::{CustomerAggregate, RebateDetail};
pub use runner::{RebateRunner, RunStatus, RunSummary};

/// Receives each finished customer, in feed order
pub trait ReportSink {
    fn emit(&mut self, aggregate: CustomerAggregate, details: Vec<RebateDetail>);
}

/// Sink that keeps everything in memory
#[derive(Debug, Clone, Default)]
pub struct ReportBuffer {
    pub aggregates: Vec<CustomerAggregate>,
    pub details: Vec<RebateDetail>,
}

impl ReportSink for ReportBuffer {
    fn emit(&mut self, aggregate: CustomerAggregate, details: Vec<RebateDetail>) {
        self.aggregates.push(aggregate);
        self.details.extend(details);
    }
}

impl ReportBuffer {
    /// Sum of total rebates across all customers
    pub fn total_rebate(&self) -> f64 {
        self.aggregates.iter().map(|a| a.total_rebate).sum()
    }
}
