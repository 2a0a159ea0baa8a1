//! Run configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.
//!
//! ```json
//! {
//!   "efficiency_program": "EFFICIENCY",
//!   "today": "2026-10-17",
//!   "quarterly_calculators": [
//!     {"kind": "rate", "name": "q_dental", "label": "Dental 3%", "rate": 0.03}
//!   ]
//! }
//! ```

use std::error::Error;
use std::fs::File;
use std::path::Path;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::rebates::CalculatorDef;

/// Default enrollment program name for the efficiency rebate
pub const DEFAULT_EFFICIENCY_PROGRAM: &str = "EFFICIENCY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Program name looked up in the efficiency enrollment table
    #[serde(default = "default_efficiency_program")]
    pub efficiency_program: String,

    /// Date treated as today for prior-year alignment; the local date if unset
    #[serde(default)]
    pub today: Option<NaiveDate>,

    /// Extra quarterly calculators, registered over the built-ins
    #[serde(default)]
    pub quarterly_calculators: Vec<CalculatorDef>,
}

fn default_efficiency_program() -> String {
    DEFAULT_EFFICIENCY_PROGRAM.to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            efficiency_program: default_efficiency_program(),
            today: None,
            quarterly_calculators: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Load a config from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}
