use chrono::NaiveDate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use kabu_core::table::{split_column_name, DATE_COLUMN};
use kabu_core::{Chart, ChartKind, FetchError, Fetcher, FlatTable, Presentation, RawTable};
use std::io::{self, Write};
use std::time::Duration;

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 60;

pub fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Shows a spinner on stderr while the wrapped fetcher is busy.
pub struct ProgressFetcher<F> {
    inner: F,
}

impl<F> ProgressFetcher<F> {
    pub fn new(inner: F) -> Self {
        ProgressFetcher { inner }
    }
}

impl<F: Fetcher + Sync> Fetcher for ProgressFetcher<F> {
    async fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, FetchError> {
        let pb = spinner(format!(
            "Fetching {} symbol(s), {start} to {end} ...",
            symbols.len()
        ));
        let result = self.inner.fetch(symbols, start, end).await;
        pb.finish_and_clear();
        result
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Terminal sink
//
///////////////////////////////////////////////////////////////////////////////////////////////////////

/// Renders the dashboard as coloured text.
///
/// Write errors are kept rather than raised mid-cycle; see [`TerminalSink::finish`].
pub struct TerminalSink<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        TerminalSink::new(io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        TerminalSink { out, error: None }
    }

    pub fn finish(mut self) -> io::Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => self.out.flush(),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl AsRef<str>) {
        if self.error.is_none() {
            if let Err(e) = writeln!(self.out, "{}", text.as_ref()) {
                self.error = Some(e);
            }
        }
    }
}

impl<W: Write> Presentation for TerminalSink<W> {
    fn selection_required(&mut self, message: &str) {
        self.line(format!("{} {}", "!".yellow().bold(), message.yellow()));
    }

    fn failure(&mut self, message: &str) {
        self.line(format!("{} {}", "x".red().bold(), message.red()));
    }

    fn preview(&mut self, table: &FlatTable, rows: usize) {
        self.line("");
        self.line("Raw Data Preview".bold().underline().to_string());
        if table.is_empty() {
            self.line("no rows in range".dimmed().to_string());
            return;
        }

        let mut header = vec![DATE_COLUMN.to_string()];
        header.extend(table.column_names().map(str::to_string));
        let mut grid = vec![header];
        for row in table.head(rows) {
            let mut cells = vec![row.date().to_string()];
            cells.extend(row.values().map(|(name, value)| cell(name, value)));
            grid.push(cells);
        }

        let widths: Vec<usize> = (0..grid[0].len())
            .map(|c| grid.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
            .collect();
        for (i, cells) in grid.iter().enumerate() {
            let text = cells
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:>width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            if i == 0 {
                self.line(text.bold().to_string());
            } else {
                self.line(text);
            }
        }
    }

    fn chart(&mut self, heading: &str, chart: &Chart) {
        self.line("");
        self.line(heading.bold().underline().to_string());
        self.line(format!(
            "{}  ({} vs {})",
            chart.title.cyan(),
            chart.y_title,
            chart.x_title
        ));

        let label_width = chart
            .series
            .iter()
            .map(|s| s.label.chars().count())
            .max()
            .unwrap_or(0)
            .max(5);

        for series in &chart.series {
            let values: Vec<Option<f64>> = series.points.iter().map(|(_, v)| *v).collect();
            let label = format!("{:<label_width$}", series.label);
            if series.is_blank() {
                self.line(format!("{}  {}", label, "no data".dimmed()));
                continue;
            }
            self.line(format!(
                "{}  {}  {}",
                label.green(),
                sparkline(&values, SPARK_WIDTH),
                summary(&values)
            ));
        }

        // stacked charts also show the stack height
        if chart.kind == ChartKind::StackedArea && chart.series.len() > 1 {
            let len = chart.series.iter().map(|s| s.points.len()).max().unwrap_or(0);
            let total: Vec<Option<f64>> = (0..len)
                .map(|i| {
                    let defined: Vec<f64> = chart
                        .series
                        .iter()
                        .filter_map(|s| s.points.get(i).and_then(|(_, v)| *v))
                        .collect();
                    (!defined.is_empty()).then(|| defined.iter().sum())
                })
                .collect();
            let label = format!("{:<label_width$}", "Total");
            self.line(format!(
                "{}  {}  {}",
                label.bold(),
                sparkline(&total, SPARK_WIDTH),
                summary(&total)
            ));
        }
    }
}

fn cell(column: &str, value: Option<f64>) -> String {
    match value {
        None => "NaN".to_string(),
        Some(v) if split_column_name(column).0 == "Volume" => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
    }
}

fn summary(values: &[Option<f64>]) -> String {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    let last = values.iter().rev().flatten().next();
    match (last, defined.iter().copied().reduce(f64::min), defined.iter().copied().reduce(f64::max)) {
        (Some(last), Some(min), Some(max)) => {
            format!("last {last:.2}  min {min:.2}  max {max:.2}")
        }
        _ => String::new(),
    }
}

/// Squeezes `values` into at most `width` buckets, each the mean of its defined values.
pub(crate) fn sparkline(values: &[Option<f64>], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }

    let buckets = width.min(values.len());
    let means: Vec<Option<f64>> = (0..buckets)
        .map(|b| {
            let from = b * values.len() / buckets;
            let to = ((b + 1) * values.len() / buckets).max(from + 1);
            let defined: Vec<f64> = values[from..to].iter().flatten().copied().collect();
            (!defined.is_empty()).then(|| defined.iter().sum::<f64>() / defined.len() as f64)
        })
        .collect();

    let defined = means.iter().flatten().copied();
    let (min, max) = defined.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let span = max - min;

    means
        .iter()
        .map(|mean| match mean {
            None => ' ',
            Some(_) if span <= 0.0 => SPARK[SPARK.len() / 2],
            Some(v) => {
                let level = ((v - min) / span * (SPARK.len() - 1) as f64).round() as usize;
                SPARK[level.min(SPARK.len() - 1)]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kabu_core::{normalize, ChartSpec, ColumnKey};

    fn table() -> FlatTable {
        let d = NaiveDate::from_ymd_opt(2023, 1, 3).unwrap();
        normalize(
            &RawTable::new(vec![d, d.succ_opt().unwrap()])
                .with_column(ColumnKey::composite("Close", "AAPL"), vec![Some(125.07), None])
                .with_column(ColumnKey::composite("Volume", "AAPL"), vec![Some(112117500.0), Some(1.0)]),
        )
    }

    fn rendered(f: impl FnOnce(&mut TerminalSink<Vec<u8>>)) -> String {
        colored::control::set_override(false);
        let mut sink = TerminalSink::new(Vec::new());
        f(&mut sink);
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn sparkline_spans_the_full_range() {
        let values: Vec<Option<f64>> = (0..8).map(|v| Some(v as f64)).collect();
        assert_eq!(sparkline(&values, 8), "▁▂▃▄▅▆▇█");
        assert_eq!(sparkline(&values, 4).chars().count(), 4);
    }

    #[test]
    fn sparkline_leaves_gaps_blank() {
        assert_eq!(sparkline(&[Some(1.0), None, Some(1.0)], 3), "▅ ▅");
        assert_eq!(sparkline(&[], 10), "");
    }

    #[test]
    fn preview_lists_date_and_flat_columns() {
        let out = rendered(|sink| sink.preview(&table(), 5));
        assert!(out.contains("Raw Data Preview"));
        assert!(out.contains("Date"));
        assert!(out.contains("Close_AAPL"));
        assert!(out.contains("2023-01-03"));
        assert!(out.contains("125.07"));
        assert!(out.contains("112117500"));
        assert!(out.contains("NaN"));
    }

    #[test]
    fn charts_mark_empty_series() {
        let symbols = vec!["AAPL".to_string(), "GONE".to_string()];
        let (chart, _) = ChartSpec::Volume.build(&table(), &symbols);
        let out = rendered(|sink| sink.chart("Volume Traded", &chart));

        assert!(out.contains("Daily Volume Traded"));
        assert!(out.contains("GONE   no data"));
        assert!(out.contains("Total"));
    }

    #[test]
    fn messages_are_printed() {
        let out = rendered(|sink| {
            sink.selection_required("pick something");
            sink.failure("it broke");
        });
        assert!(out.contains("pick something"));
        assert!(out.contains("it broke"));
    }
}
