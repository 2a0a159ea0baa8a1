//! Single-pass rebate run over the customer feed
//!
//! Customers are processed strictly in feed order, one at a time. The cancel
//! token is checked before each customer; a customer interrupted mid-way is
//! dropped rather than emitted partially.

use chrono::NaiveDate;
use log::{error, info};
use serde::{Deserialize, Serialize};

use super::aggregate::{CustomerAggregate, RebateDetail};
use super::ReportSink;
use crate::cancel::CancelToken;
use crate::config::RunConfig;
use crate::error::{EngineResult, ErrorSummary, RebateError};
use crate::period::Period;
use crate::rebates::{
    CalculatorDispatch, CalculatorRegistry, EfficiencyEvaluator, RebateContext, VendorAllocation,
};
use crate::store::{CustomerRow, SalesStore};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every customer in the feed was emitted
    Completed,
    /// The cancel token tripped; customers emitted so far are complete
    Stopped,
    /// Setup failed before any customer was processed
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "stopped",
            RunStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Outcome of a run plus every failure degraded along the way
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub period: Option<Period>,
    pub customers_emitted: usize,
    pub messages: Vec<String>,
}

/// Runs every rebate program for each customer and emits the aggregates
pub struct RebateRunner {
    registry: CalculatorRegistry,
    efficiency: EfficiencyEvaluator,
    today: NaiveDate,
}

impl RebateRunner {
    pub fn new(registry: CalculatorRegistry, efficiency: EfficiencyEvaluator, today: NaiveDate) -> Self {
        Self { registry, efficiency, today }
    }

    /// Built-in calculators plus those declared in the config
    pub fn from_config(config: &RunConfig) -> Self {
        let mut registry = CalculatorRegistry::with_builtins();
        for def in &config.quarterly_calculators {
            registry.register_def(def);
        }

        Self::new(
            registry,
            EfficiencyEvaluator::new(config.efficiency_program.clone()),
            config.today(),
        )
    }

    pub fn registry(&self) -> &CalculatorRegistry {
        &self.registry
    }

    /// Process the whole customer feed into `sink`
    pub fn run(&self, store: &dyn SalesStore, sink: &mut dyn ReportSink, cancel: &CancelToken) -> RunSummary {
        let mut summary = ErrorSummary::new();

        let (period, customers) = match self.setup(store) {
            Ok(setup) => setup,
            Err(e) => {
                error!("run aborted: {}", e);
                summary.note(e.to_string());
                return RunSummary {
                    status: RunStatus::Aborted,
                    period: None,
                    customers_emitted: 0,
                    messages: summary.into_messages(),
                };
            }
        };

        info!("rebate run over {} for {} customers", period, customers.len());

        let ctx = RebateContext::new(store, period, self.today);
        let mut dispatch = CalculatorDispatch::new(&self.registry);
        let mut emitted = 0;
        let mut status = RunStatus::Completed;

        for customer in &customers {
            if cancel.is_cancelled() {
                status = RunStatus::Stopped;
                break;
            }

            match self.process_customer(&ctx, &mut dispatch, customer, cancel, &mut summary) {
                Ok((aggregate, details)) => {
                    sink.emit(aggregate, details);
                    emitted += 1;
                }
                Err(RebateError::Cancelled) => {
                    status = RunStatus::Stopped;
                    break;
                }
                Err(e) => summary.record(&customer.customer_id, "customer", e),
            }
        }

        if status == RunStatus::Stopped {
            summary.note(format!(
                "run stopped after {} of {} customers",
                emitted,
                customers.len()
            ));
        }

        info!(
            "rebate run {}: {} customers emitted, {} messages",
            status,
            emitted,
            summary.len()
        );

        RunSummary {
            status,
            period: Some(period),
            customers_emitted: emitted,
            messages: summary.into_messages(),
        }
    }

    fn setup(&self, store: &dyn SalesStore) -> EngineResult<(Period, Vec<CustomerRow>)> {
        self.registry.validate_static()?;

        let (begin, end) = store
            .period_window()
            .map_err(|e| RebateError::FatalSetup(format!("period unavailable: {}", e)))?;
        let period = Period::new(begin, end)?;

        let customers = store
            .customer_feed(&period)
            .map_err(|e| RebateError::FatalSetup(format!("customer feed unavailable: {}", e)))?;

        Ok((period, customers))
    }

    /// Aggregate and detail rows for one customer
    fn process_customer(
        &self,
        ctx: &RebateContext<'_>,
        dispatch: &mut CalculatorDispatch<'_>,
        customer: &CustomerRow,
        cancel: &CancelToken,
        summary: &mut ErrorSummary,
    ) -> EngineResult<(CustomerAggregate, Vec<RebateDetail>)> {
        let id = customer.customer_id.as_str();

        let vendor = VendorAllocation::allocate(ctx, id, summary);
        let efficiency = self.efficiency.evaluate(ctx, id, summary);
        let programs = dispatch.run(ctx, id, cancel, summary)?;

        let efficiency_rebate = efficiency.as_ref().map(|e| e.amount).unwrap_or(0.0);
        let aggregate = CustomerAggregate::build(customer, &programs, efficiency_rebate, &vendor);

        let mut details = Vec::with_capacity(programs.details.len() + 1);
        if let Some(detail) = efficiency {
            details.push(RebateDetail::Efficiency(detail));
        }
        details.extend(programs.details.into_iter().map(RebateDetail::Program));

        Ok((aggregate, details))
    }
}
