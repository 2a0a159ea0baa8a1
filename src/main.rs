//! Rebate report CLI
//!
//! Runs the rebate engine over a CSV data directory or a SQLite database and
//! writes the customer aggregates and rebate detail rows as CSV.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use log::info;
use serde::Serialize;

use rebate_engine::{
    CancelToken, CustomerAggregate, MemoryStore, RebateDetail, RebateRunner, ReportSink,
    RunConfig, RunStatus, SalesStore, SqliteStore,
};

#[derive(Parser, Debug)]
#[command(name = "rebate-report", about = "Customer profitability rebate report")]
struct Args {
    /// Directory of CSV extracts
    #[arg(long, conflicts_with = "sqlite")]
    data_dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// JSON run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override today's date (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Output file prefix; writes <prefix>_customers.csv and <prefix>_details.csv
    #[arg(long, default_value = "rebate_report")]
    output: String,
}

#[derive(Serialize)]
struct AggregateCsvRow<'a> {
    customer_id: &'a str,
    name: &'a str,
    gross_sales: f64,
    coop_rebate: f64,
    efficiency_rebate: f64,
    quarterly_rebate: f64,
    other_rebate: f64,
    total_rebate: f64,
    cash_discount: f64,
    net_sales: f64,
    cogs: f64,
    margin: f64,
    ar_total: f64,
    ar_past: f64,
    vendor_a: f64,
    vendor_monthly: f64,
    vendor_quarterly: f64,
    vendor_growth: f64,
    vendor_total: f64,
}

#[derive(Serialize, Default)]
struct DetailCsvRow<'a> {
    customer_id: &'a str,
    program: &'a str,
    amount: f64,
    q1: Option<f64>,
    q2: Option<f64>,
    q3: Option<f64>,
    q4: Option<f64>,
    credit_total: Option<f64>,
    rebate_sales: Option<f64>,
    comparison_sales: Option<f64>,
    previous_year_sales: Option<f64>,
    line_value: Option<f64>,
    credit_pct: Option<f64>,
    eligible: Option<bool>,
}

/// Writes rows as they arrive; the first write error is kept and stops output
struct CsvSink {
    customers: csv::Writer<File>,
    details: csv::Writer<File>,
    error: Option<csv::Error>,
}

impl CsvSink {
    fn create(prefix: &str) -> Result<Self> {
        let customers_path = format!("{}_customers.csv", prefix);
        let details_path = format!("{}_details.csv", prefix);
        Ok(Self {
            customers: csv::Writer::from_path(&customers_path)
                .with_context(|| format!("creating {}", customers_path))?,
            details: csv::Writer::from_path(&details_path)
                .with_context(|| format!("creating {}", details_path))?,
            error: None,
        })
    }

    fn write(&mut self, aggregate: &CustomerAggregate, details: &[RebateDetail]) -> csv::Result<()> {
        let vendor = aggregate.vendor_rebate_by_category;
        self.customers.serialize(AggregateCsvRow {
            customer_id: &aggregate.customer_id,
            name: &aggregate.name,
            gross_sales: aggregate.gross_sales,
            coop_rebate: aggregate.coop_rebate,
            efficiency_rebate: aggregate.efficiency_rebate,
            quarterly_rebate: aggregate.quarterly_rebate,
            other_rebate: aggregate.other_rebate,
            total_rebate: aggregate.total_rebate,
            cash_discount: aggregate.cash_discount,
            net_sales: aggregate.net_sales,
            cogs: aggregate.cogs,
            margin: aggregate.margin,
            ar_total: aggregate.ar_total,
            ar_past: aggregate.ar_past,
            vendor_a: vendor[0],
            vendor_monthly: vendor[1],
            vendor_quarterly: vendor[2],
            vendor_growth: vendor[3],
            vendor_total: aggregate.vendor_rebate_total,
        })?;

        for detail in details {
            let row = match detail {
                RebateDetail::Efficiency(e) => DetailCsvRow {
                    customer_id: &e.customer_id,
                    program: rebate_engine::rebates::efficiency::LABEL,
                    amount: e.amount,
                    credit_total: Some(e.inputs.credit_total),
                    rebate_sales: Some(e.inputs.rebate_sales),
                    comparison_sales: Some(e.inputs.comparison_sales),
                    previous_year_sales: Some(e.inputs.previous_year_sales),
                    line_value: Some(e.inputs.line_value),
                    credit_pct: Some(e.inputs.credit_pct),
                    eligible: Some(e.eligible),
                    ..Default::default()
                },
                RebateDetail::Program(r) => {
                    let q = r.quarters;
                    DetailCsvRow {
                        customer_id: &r.customer_id,
                        program: &r.program_label,
                        amount: r.amount,
                        q1: q.map(|q| q[0]),
                        q2: q.map(|q| q[1]),
                        q3: q.map(|q| q[2]),
                        q4: q.map(|q| q[3]),
                        ..Default::default()
                    }
                }
            };
            self.details.serialize(row)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e.into());
        }
        self.customers.flush()?;
        self.details.flush()?;
        Ok(())
    }
}

impl ReportSink for CsvSink {
    fn emit(&mut self, aggregate: CustomerAggregate, details: Vec<RebateDetail>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write(&aggregate, &details) {
            self.error = Some(e);
        }
    }
}

fn open_store(args: &Args) -> Result<Box<dyn SalesStore>> {
    match (&args.data_dir, &args.sqlite) {
        (Some(dir), None) => {
            let store = MemoryStore::load_dir(dir)
                .with_context(|| format!("loading data directory {}", dir.display()))?;
            Ok(Box::new(store))
        }
        (None, Some(path)) => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("opening database {}", path.display()))?;
            Ok(Box::new(store))
        }
        _ => bail!("exactly one of --data-dir or --sqlite is required"),
    }
}

fn run(args: Args) -> Result<RunStatus> {
    let start = Instant::now();

    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)
            .map_err(|e| anyhow!("loading config {}: {}", path.display(), e))?,
        None => RunConfig::default(),
    };
    if args.today.is_some() {
        config.today = args.today;
    }

    let store = open_store(&args)?;
    let runner = RebateRunner::from_config(&config);
    let mut sink = CsvSink::create(&args.output)?;

    let summary = runner.run(store.as_ref(), &mut sink, &CancelToken::new());
    sink.finish()?;

    println!("Rebate run {}", summary.status);
    if let Some(period) = summary.period {
        println!("  Period: {}", period);
    }
    println!("  Customers: {}", summary.customers_emitted);
    if !summary.messages.is_empty() {
        println!("  Messages ({}):", summary.messages.len());
        for message in &summary.messages {
            println!("    {}", message);
        }
    }
    println!("  Output: {}_customers.csv, {}_details.csv", args.output, args.output);

    info!("total time {:?}", start.elapsed());
    Ok(summary.status)
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(RunStatus::Aborted) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
