use crate::chart::{Chart, ChartSpec, Presentation};
use crate::error::DashError;
use crate::fetch::Fetcher;
use crate::indicators::{add_moving_average, DEFAULT_WINDOW};
use crate::normalize::normalize;
use crate::table::{FlatTable, RawTable};
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

///////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Inputs
//
///////////////////////////////////////////////////////////////////////////////////////////////////////

pub const CANDIDATE_SYMBOLS: [&str; 10] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA", "NFLX", "IBM", "INTC",
];

pub const DEFAULT_SELECTION: [&str; 3] = ["AAPL", "MSFT", "GOOGL"];

pub const SELECTION_PROMPT: &str = "Please select at least one stock symbol to view data.";

pub const PREVIEW_ROWS: usize = 5;

pub fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

/// Everything one render cycle depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardInput {
    /// Selection order, without duplicates.
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DashboardInput {
    /// Symbols are trimmed and upper-cased; blanks and repeats are dropped.
    pub fn new<I, S>(symbols: I, start: NaiveDate, end: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        DashboardInput {
            symbols,
            start,
            end,
        }
    }

    pub fn validate(&self) -> Result<(), DashError> {
        if self.start > self.end {
            return Err(DashError::InvalidDateRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub window: usize,
    pub preview_rows: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            window: DEFAULT_WINDOW,
            preview_rows: PREVIEW_ROWS,
        }
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Outputs
//
///////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, PartialEq)]
pub struct Dashboard {
    pub table: FlatTable,
    pub charts: Vec<(String, Chart)>,
    /// Columns that were expected but absent; their series render empty.
    pub missing: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CycleReport {
    SelectionRequired,
    Rendered(Dashboard),
}

/// Normalizes `raw`, attaches one moving average per symbol and lays out the
/// closing price, volume and moving-average charts.
pub fn build_dashboard(
    raw: &RawTable,
    symbols: &[String],
    options: &RenderOptions,
) -> Result<Dashboard, DashError> {
    let mut table = normalize(raw);
    let mut missing = Vec::new();

    for symbol in symbols {
        match add_moving_average(&mut table, symbol, options.window) {
            Ok(()) => {}
            Err(DashError::MissingColumn(column)) => missing.push(column),
            Err(e) => return Err(e),
        }
    }

    let specs = [
        ChartSpec::ClosingPrice,
        ChartSpec::Volume,
        ChartSpec::MovingAverage {
            window: options.window,
        },
    ];
    let charts = specs
        .iter()
        .map(|spec| {
            let (chart, absent) = spec.build(&table, symbols);
            for column in absent {
                if !missing.contains(&column) {
                    missing.push(column);
                }
            }
            (spec.heading(), chart)
        })
        .collect();

    Ok(Dashboard {
        table,
        charts,
        missing,
    })
}

/// Runs one render cycle: validate, fetch, shape, and hand everything to `sink`.
///
/// An empty selection only prompts the user. Fatal errors are shown through
/// `sink` before being returned.
pub async fn render_cycle<F, P>(
    fetcher: &F,
    sink: &mut P,
    input: &DashboardInput,
    options: &RenderOptions,
) -> Result<CycleReport, DashError>
where
    F: Fetcher,
    P: Presentation,
{
    if input.symbols.is_empty() {
        info!("No symbols selected");
        sink.selection_required(SELECTION_PROMPT);
        return Ok(CycleReport::SelectionRequired);
    }

    let time = std::time::Instant::now();
    let result = async {
        input.validate()?;
        if options.window == 0 {
            return Err(DashError::InvalidWindow);
        }
        let raw = fetcher.fetch(&input.symbols, input.start, input.end).await?;
        debug!(
            "Fetched {} rows for {:?} in {} ms",
            raw.index().len(),
            input.symbols,
            time.elapsed().as_millis()
        );
        build_dashboard(&raw, &input.symbols, options)
    }
    .await;

    let dashboard = match result {
        Ok(dashboard) => dashboard,
        Err(e) => {
            error!("Render cycle aborted: {e}");
            sink.failure(&e.to_string());
            return Err(e);
        }
    };

    if !dashboard.missing.is_empty() {
        warn!("Rendering without columns: {:?}", dashboard.missing);
    }

    sink.preview(&dashboard.table, options.preview_rows);
    for (heading, chart) in &dashboard.charts {
        sink.chart(heading, chart);
    }

    debug!("Render cycle finished in {} ms", time.elapsed().as_millis());
    Ok(CycleReport::Rendered(dashboard))
}
