use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use kabu_core::controller::{default_start, RenderOptions, PREVIEW_ROWS};
use kabu_core::indicators::DEFAULT_WINDOW;
use kabu_yahoo::Adjustment;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing
    #[arg(long, global = true, default_value = "INFO", ignore_case = true)]
    pub trace: TraceLevel,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the dashboard once for a set of symbols and a date range.
    Show {
        /// Comma separated ticker symbols; an empty list only prompts for a selection.
        #[arg(long, value_delimiter = ',', default_values_t = vec!["AAPL".to_string(), "MSFT".to_string(), "GOOGL".to_string()])]
        symbols: Vec<String>,

        /// First date of the range (YYYY-MM-DD).
        #[arg(long, default_value_t = default_start())]
        start: NaiveDate,

        /// End of the range, exclusive (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Pick symbols and dates from prompts, re-rendering after every change.
    Interactive {
        #[command(flatten)]
        render: RenderArgs,
    },

    /// List the suggested ticker symbols.
    Symbols,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Moving average window, in trading days.
    #[arg(long, default_value_t = DEFAULT_WINDOW, value_parser = parse_window)]
    pub window: usize,

    /// Rows shown in the raw data preview.
    #[arg(long, default_value_t = PREVIEW_ROWS)]
    pub rows: usize,

    /// Also write the dashboard as an HTML page.
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Keep exchange-reported prices instead of split/dividend adjusted ones.
    #[arg(long)]
    pub raw: bool,
}

impl RenderArgs {
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            window: self.window,
            preview_rows: self.rows,
        }
    }

    pub fn adjustment(&self) -> Adjustment {
        if self.raw {
            Adjustment::Raw
        } else {
            Adjustment::Auto
        }
    }
}

fn parse_window(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("window must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceLevel {
    DEBUG,
    INFO,
    WARN,
    ERROR,
}
