//! Quarterly calculator assignments
//!
//! The assignment feed is read once per run, on the first customer that needs
//! it, and grouped into an immutable customer -> calculator names map. Lookups
//! after that are independent of the order customers arrive in.

use std::collections::HashMap;

use log::debug;

use super::RebateContext;
use crate::cancel::CancelToken;
use crate::error::{EngineResult, RebateError};
use crate::store::AssignmentRow;

#[derive(Debug, Clone)]
enum ScannerState {
    NotLoaded,
    Loaded(HashMap<String, Vec<String>>),
}

/// Lazily loaded assignment lookup, held for one run
#[derive(Debug, Clone)]
pub struct AssignmentScanner {
    state: ScannerState,
}

impl AssignmentScanner {
    pub fn new() -> Self {
        Self {
            state: ScannerState::NotLoaded,
        }
    }

    /// Scanner already holding the given feed rows
    pub fn from_rows(rows: Vec<AssignmentRow>) -> Self {
        Self {
            state: ScannerState::Loaded(group_rows(rows)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ScannerState::Loaded(_))
    }

    /// Calculator names assigned to `customer_id`, in feed order.
    ///
    /// Loads the feed on first use. A failed load leaves the scanner unloaded
    /// so the next customer retries it.
    pub fn assignments_for(
        &mut self,
        ctx: &RebateContext<'_>,
        customer_id: &str,
        cancel: &CancelToken,
    ) -> EngineResult<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(RebateError::Cancelled);
        }

        if let ScannerState::NotLoaded = self.state {
            let rows = ctx.store.quarterly_assignments(&ctx.period)?;
            debug!("loaded {} quarterly assignment rows", rows.len());
            self.state = ScannerState::Loaded(group_rows(rows));
        }

        match &self.state {
            ScannerState::Loaded(map) => Ok(map.get(customer_id).cloned().unwrap_or_default()),
            ScannerState::NotLoaded => Ok(Vec::new()),
        }
    }
}

impl Default for AssignmentScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn group_rows(rows: Vec<AssignmentRow>) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        map.entry(row.customer_id).or_default().push(row.calculator);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use crate::store::testing::FlakyStore;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn store() -> FlakyStore {
        let mut inner = MemoryStore::new(d(2025, 1, 1), d(2025, 12, 31));
        inner
            .assign("C001", "quarterly_1pct")
            .assign("C003", "quarterly_tiered")
            .assign("C001", "quarterly_2pct");
        FlakyStore::new(inner)
    }

    fn period() -> Period {
        Period::new(d(2025, 1, 1), d(2025, 12, 31)).unwrap()
    }

    #[test]
    fn test_loads_once_and_groups_by_customer() {
        let store = store();
        let ctx = RebateContext::new(&store, period(), d(2026, 1, 1));
        let cancel = CancelToken::new();
        let mut scanner = AssignmentScanner::new();
        assert!(!scanner.is_loaded());

        let c003 = scanner.assignments_for(&ctx, "C003", &cancel).unwrap();
        let c001 = scanner.assignments_for(&ctx, "C001", &cancel).unwrap();
        let c002 = scanner.assignments_for(&ctx, "C002", &cancel).unwrap();

        assert_eq!(c003, ["quarterly_tiered"]);
        assert_eq!(c001, ["quarterly_1pct", "quarterly_2pct"]);
        assert!(c002.is_empty());
        assert!(scanner.is_loaded());
        assert_eq!(store.assignment_loads.get(), 1);
    }

    #[test]
    fn test_failed_load_retries_next_time() {
        let store = store().fail("quarterly_assignments");
        let ctx = RebateContext::new(&store, period(), d(2026, 1, 1));
        let cancel = CancelToken::new();
        let mut scanner = AssignmentScanner::new();

        let first = scanner.assignments_for(&ctx, "C001", &cancel);
        assert!(matches!(first, Err(RebateError::TransientQuery(_))));
        assert!(!scanner.is_loaded());

        let _ = scanner.assignments_for(&ctx, "C001", &cancel);
        assert_eq!(store.assignment_loads.get(), 2);
    }

    #[test]
    fn test_cancelled_before_scan() {
        let store = store();
        let ctx = RebateContext::new(&store, period(), d(2026, 1, 1));
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut scanner = AssignmentScanner::new();
        let result = scanner.assignments_for(&ctx, "C001", &cancel);
        assert!(matches!(result, Err(RebateError::Cancelled)));
        assert_eq!(store.assignment_loads.get(), 0);
    }

    #[test]
    fn test_from_rows() {
        let mut scanner = AssignmentScanner::from_rows(vec![AssignmentRow {
            customer_id: "C009".to_string(),
            calculator: "quarterly_2pct".to_string(),
        }]);
        assert!(scanner.is_loaded());

        let store = MemoryStore::new(d(2025, 1, 1), d(2025, 12, 31));
        let ctx = RebateContext::new(&store, period(), d(2026, 1, 1));
        let names = scanner.assignments_for(&ctx, "C009", &CancelToken::new()).unwrap();
        assert_eq!(names, ["quarterly_2pct"]);
    }
}
