//! Named rebate calculators and their dispatch
//!
//! Calculators live in a registry keyed by name, built once before the run.
//! Two groups of names are dispatched per customer:
//! 1. The static program list, bound to the coop and other aggregate slots
//! 2. The quarterly calculators assigned to the customer by the assignment feed
//!
//! An assigned name with no registered calculator, or a calculator that
//! fails, contributes zero for that one program and is recorded.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::quarterly::AssignmentScanner;
use super::{RebateContext, RebateResult};
use crate::cancel::CancelToken;
use crate::error::{EngineResult, ErrorSummary, RebateError};

/// A rebate program that can be invoked for one customer by name
pub trait RebateCalculator {
    /// Label shown on detail rows
    fn label(&self) -> &str;

    /// Amount credited to `customer_id`, or `None` when the program does not apply
    fn calculate(&self, ctx: &RebateContext<'_>, customer_id: &str) -> EngineResult<Option<RebateResult>>;
}

/// Aggregate column a static program's amount is added to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramSlot {
    Coop,
    Other,
}

/// One-off program invoked for every customer
#[derive(Debug, Clone, Copy)]
pub struct StaticProgram {
    pub name: &'static str,
    pub label: &'static str,
    pub slot: ProgramSlot,
}

/// Programs run for every customer regardless of assignments.
///
/// None of these have a calculation yet; they are registered as
/// `NotImplemented` so their slots stay in the totals.
pub const STATIC_PROGRAMS: &[StaticProgram] = &[
    StaticProgram { name: "coop_advertising", label: "Co-op Advertising", slot: ProgramSlot::Coop },
    StaticProgram { name: "market_development", label: "Market Development", slot: ProgramSlot::Coop },
    StaticProgram { name: "catalog_placement", label: "Catalog Placement", slot: ProgramSlot::Coop },
    StaticProgram { name: "trade_show", label: "Trade Show", slot: ProgramSlot::Coop },
    StaticProgram { name: "digital_marketing", label: "Digital Marketing", slot: ProgramSlot::Coop },
    StaticProgram { name: "freight_allowance", label: "Freight Allowance", slot: ProgramSlot::Other },
    StaticProgram { name: "new_store_allowance", label: "New Store Allowance", slot: ProgramSlot::Other },
    StaticProgram { name: "conversion_incentive", label: "Conversion Incentive", slot: ProgramSlot::Other },
    StaticProgram { name: "volume_incentive", label: "Volume Incentive", slot: ProgramSlot::Other },
    StaticProgram { name: "early_payment", label: "Early Payment", slot: ProgramSlot::Other },
    StaticProgram { name: "equipment_bundle", label: "Equipment Bundle", slot: ProgramSlot::Other },
    StaticProgram { name: "private_label", label: "Private Label", slot: ProgramSlot::Other },
    StaticProgram { name: "loyalty_bonus", label: "Loyalty Bonus", slot: ProgramSlot::Other },
    StaticProgram { name: "group_purchasing", label: "Group Purchasing", slot: ProgramSlot::Other },
    StaticProgram { name: "contract_pricing", label: "Contract Pricing", slot: ProgramSlot::Other },
];

/// Program with a reserved slot but no calculation; never credits anything
#[derive(Debug, Clone)]
pub struct NotImplemented {
    label: String,
}

impl NotImplemented {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl RebateCalculator for NotImplemented {
    fn label(&self) -> &str {
        &self.label
    }

    fn calculate(&self, _ctx: &RebateContext<'_>, _customer_id: &str) -> EngineResult<Option<RebateResult>> {
        Ok(None)
    }
}

/// Flat percentage of each quarter's qualifying sales
#[derive(Debug, Clone)]
pub struct QuarterlyRate {
    label: String,
    rate: f64,
}

impl QuarterlyRate {
    pub fn new(label: impl Into<String>, rate: f64) -> Self {
        Self { label: label.into(), rate }
    }
}

impl RebateCalculator for QuarterlyRate {
    fn label(&self) -> &str {
        &self.label
    }

    fn calculate(&self, ctx: &RebateContext<'_>, customer_id: &str) -> EngineResult<Option<RebateResult>> {
        let sales = ctx.store.quarterly_sales(&ctx.period, customer_id)?;
        let quarters = sales.map(|q| q * self.rate);
        Ok(Some(RebateResult::quarterly(customer_id, &self.label, quarters)))
    }
}

/// Sales threshold a quarter must reach to earn `rate`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub min_sales: f64,
    pub rate: f64,
}

/// Per-quarter rate chosen by the highest threshold the quarter reaches
#[derive(Debug, Clone)]
pub struct QuarterlyTiered {
    label: String,
    /// Sorted by ascending `min_sales`
    tiers: Vec<Tier>,
}

impl QuarterlyTiered {
    pub fn new(label: impl Into<String>, mut tiers: Vec<Tier>) -> Self {
        tiers.sort_by(|a, b| a.min_sales.total_cmp(&b.min_sales));
        Self { label: label.into(), tiers }
    }

    fn rate_for(&self, sales: f64) -> f64 {
        self.tiers
            .iter()
            .rev()
            .find(|tier| sales >= tier.min_sales)
            .map(|tier| tier.rate)
            .unwrap_or(0.0)
    }
}

impl RebateCalculator for QuarterlyTiered {
    fn label(&self) -> &str {
        &self.label
    }

    fn calculate(&self, ctx: &RebateContext<'_>, customer_id: &str) -> EngineResult<Option<RebateResult>> {
        let sales = ctx.store.quarterly_sales(&ctx.period, customer_id)?;
        let quarters = sales.map(|q| q * self.rate_for(q));
        Ok(Some(RebateResult::quarterly(customer_id, &self.label, quarters)))
    }
}

/// Calculator declared in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculatorDef {
    Rate { name: String, label: String, rate: f64 },
    Tiered { name: String, label: String, tiers: Vec<Tier> },
}

impl CalculatorDef {
    pub fn name(&self) -> &str {
        match self {
            CalculatorDef::Rate { name, .. } | CalculatorDef::Tiered { name, .. } => name,
        }
    }

    fn build(&self) -> Box<dyn RebateCalculator> {
        match self {
            CalculatorDef::Rate { label, rate, .. } => Box::new(QuarterlyRate::new(label.clone(), *rate)),
            CalculatorDef::Tiered { label, tiers, .. } => {
                Box::new(QuarterlyTiered::new(label.clone(), tiers.clone()))
            }
        }
    }
}

/// Calculators by name
#[derive(Default)]
pub struct CalculatorRegistry {
    calculators: HashMap<String, Box<dyn RebateCalculator>>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the static programs and the stock quarterly calculators
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        for program in STATIC_PROGRAMS {
            registry.register(program.name, Box::new(NotImplemented::new(program.label)));
        }

        registry.register("quarterly_1pct", Box::new(QuarterlyRate::new("Quarterly 1%", 0.01)));
        registry.register("quarterly_2pct", Box::new(QuarterlyRate::new("Quarterly 2%", 0.02)));
        registry.register(
            "quarterly_tiered",
            Box::new(QuarterlyTiered::new(
                "Quarterly Volume Tier",
                vec![
                    Tier { min_sales: 10_000.0, rate: 0.01 },
                    Tier { min_sales: 25_000.0, rate: 0.02 },
                    Tier { min_sales: 50_000.0, rate: 0.03 },
                ],
            )),
        );

        registry
    }

    /// Add or replace the calculator registered under `name`
    pub fn register(&mut self, name: impl Into<String>, calculator: Box<dyn RebateCalculator>) {
        let name = name.into();
        if self.calculators.insert(name.clone(), calculator).is_some() {
            debug!("calculator '{}' replaced", name);
        }
    }

    pub fn register_def(&mut self, def: &CalculatorDef) {
        self.register(def.name(), def.build());
    }

    pub fn get(&self, name: &str) -> Option<&dyn RebateCalculator> {
        self.calculators.get(name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.calculators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    /// Every static program must resolve before a run can start
    pub fn validate_static(&self) -> EngineResult<()> {
        let missing: Vec<&str> = STATIC_PROGRAMS
            .iter()
            .filter(|p| !self.contains(p.name))
            .map(|p| p.name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RebateError::FatalSetup(format!(
                "static programs not registered: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Per-customer totals from the dispatched programs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramOutcome {
    pub coop: f64,
    pub other: f64,
    pub quarterly: f64,
    /// One row per program that returned a result
    pub details: Vec<RebateResult>,
}

/// Runs the static and assigned programs for each customer of one run
pub struct CalculatorDispatch<'r> {
    registry: &'r CalculatorRegistry,
    scanner: AssignmentScanner,
}

impl<'r> CalculatorDispatch<'r> {
    pub fn new(registry: &'r CalculatorRegistry) -> Self {
        Self {
            registry,
            scanner: AssignmentScanner::new(),
        }
    }

    /// Dispatch every program for one customer.
    ///
    /// Only cancellation is returned as an error; every other failure is
    /// recorded and contributes zero.
    pub fn run(
        &mut self,
        ctx: &RebateContext<'_>,
        customer_id: &str,
        cancel: &CancelToken,
        summary: &mut ErrorSummary,
    ) -> EngineResult<ProgramOutcome> {
        let mut outcome = ProgramOutcome::default();

        for program in STATIC_PROGRAMS {
            if let Some(result) = self.invoke(program.name, ctx, customer_id, summary) {
                match program.slot {
                    ProgramSlot::Coop => outcome.coop += result.amount,
                    ProgramSlot::Other => outcome.other += result.amount,
                }
                outcome.details.push(result);
            }
        }

        let names = match self.scanner.assignments_for(ctx, customer_id, cancel) {
            Ok(names) => names,
            Err(RebateError::Cancelled) => return Err(RebateError::Cancelled),
            Err(e) => {
                summary.record(customer_id, "quarterly assignments", e);
                Vec::new()
            }
        };

        for name in &names {
            if let Some(result) = self.invoke(name, ctx, customer_id, summary) {
                outcome.quarterly += result.amount;
                outcome.details.push(result);
            }
        }

        Ok(outcome)
    }

    fn invoke(
        &self,
        name: &str,
        ctx: &RebateContext<'_>,
        customer_id: &str,
        summary: &mut ErrorSummary,
    ) -> Option<RebateResult> {
        let calculator = match self.registry.get(name) {
            Some(calculator) => calculator,
            None => {
                summary.record(
                    customer_id,
                    name,
                    RebateError::CalculatorResolution { name: name.to_string() },
                );
                return None;
            }
        };

        match calculator.calculate(ctx, customer_id) {
            Ok(result) => result,
            Err(e) => {
                summary.record(customer_id, calculator.label(), e);
                None
            }
        }
    }
}
