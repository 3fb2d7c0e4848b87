use crate::error::DashError;
use crate::table::{column_name, moving_average_column, Field, FlatTable};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    StackedArea,
}

/// One labelled `(date, value)` series; `None` values are gaps.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl Series {
    pub fn empty(label: impl Into<String>) -> Self {
        Series {
            label: label.into(),
            points: Vec::new(),
        }
    }

    /// Pairs `column` with the table's date axis.
    pub fn from_column(
        table: &FlatTable,
        column: &str,
        label: impl Into<String>,
    ) -> Result<Self, DashError> {
        let values = table
            .column(column)
            .ok_or_else(|| DashError::MissingColumn(column.to_string()))?;
        Ok(Series {
            label: label.into(),
            points: table.dates().iter().copied().zip(values.iter().copied()).collect(),
        })
    }

    pub fn is_blank(&self) -> bool {
        self.points.iter().all(|(_, v)| v.is_none())
    }

    pub fn defined(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().filter_map(|(d, v)| v.map(|v| (*d, v)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub kind: ChartKind,
    pub series: Vec<Series>,
}

/// Which of the dashboard's three charts to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartSpec {
    ClosingPrice,
    Volume,
    MovingAverage { window: usize },
}

impl ChartSpec {
    pub fn column(&self, symbol: &str) -> String {
        match self {
            ChartSpec::ClosingPrice => column_name(Field::Close.as_str(), symbol),
            ChartSpec::Volume => column_name(Field::Volume.as_str(), symbol),
            ChartSpec::MovingAverage { window } => moving_average_column(*window, symbol),
        }
    }

    pub fn label(&self, symbol: &str) -> String {
        match self {
            ChartSpec::MovingAverage { window } => format!("{symbol} {window}-Day MA"),
            _ => symbol.to_string(),
        }
    }

    pub fn heading(&self) -> String {
        match self {
            ChartSpec::ClosingPrice => "Closing Price Trend".to_string(),
            ChartSpec::Volume => "Volume Traded".to_string(),
            ChartSpec::MovingAverage { window } => format!("{window}-Day Moving Average Trend"),
        }
    }

    /// Builds the chart, one series per symbol.
    ///
    /// Symbols whose column is absent get an empty series and are returned
    /// alongside the chart instead of failing the whole chart.
    pub fn build<'a, I>(&self, table: &FlatTable, symbols: I) -> (Chart, Vec<String>)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut missing = Vec::new();
        let series = symbols
            .into_iter()
            .map(|symbol| {
                let column = self.column(symbol);
                Series::from_column(table, &column, self.label(symbol)).unwrap_or_else(|_| {
                    missing.push(column);
                    Series::empty(self.label(symbol))
                })
            })
            .collect();

        let (title, y_title, kind) = match self {
            ChartSpec::ClosingPrice => ("Closing Price Over Time".to_string(), "Price (USD)", ChartKind::Line),
            ChartSpec::Volume => ("Daily Volume Traded".to_string(), "Volume", ChartKind::StackedArea),
            ChartSpec::MovingAverage { window } => {
                (format!("{window}-Day Moving Average"), "Price (USD)", ChartKind::Line)
            }
        };

        let chart = Chart {
            title,
            x_title: "Date".to_string(),
            y_title: y_title.to_string(),
            kind,
            series,
        };
        (chart, missing)
    }
}

/// Rendering sink for a dashboard cycle.
pub trait Presentation {
    /// No symbol is selected; nothing else is rendered this cycle.
    fn selection_required(&mut self, message: &str);

    /// The cycle was aborted.
    fn failure(&mut self, message: &str);

    fn preview(&mut self, table: &FlatTable, rows: usize);

    fn chart(&mut self, heading: &str, chart: &Chart);
}

impl<A: Presentation, B: Presentation> Presentation for (A, B) {
    fn selection_required(&mut self, message: &str) {
        self.0.selection_required(message);
        self.1.selection_required(message);
    }

    fn failure(&mut self, message: &str) {
        self.0.failure(message);
        self.1.failure(message);
    }

    fn preview(&mut self, table: &FlatTable, rows: usize) {
        self.0.preview(table, rows);
        self.1.preview(table, rows);
    }

    fn chart(&mut self, heading: &str, chart: &Chart) {
        self.0.chart(heading, chart);
        self.1.chart(heading, chart);
    }
}

// an absent sink swallows everything
impl<P: Presentation> Presentation for Option<P> {
    fn selection_required(&mut self, message: &str) {
        if let Some(sink) = self {
            sink.selection_required(message);
        }
    }

    fn failure(&mut self, message: &str) {
        if let Some(sink) = self {
            sink.failure(message);
        }
    }

    fn preview(&mut self, table: &FlatTable, rows: usize) {
        if let Some(sink) = self {
            sink.preview(table, rows);
        }
    }

    fn chart(&mut self, heading: &str, chart: &Chart) {
        if let Some(sink) = self {
            sink.chart(heading, chart);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::table::{ColumnKey, RawTable};

    fn table() -> FlatTable {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        normalize(
            &RawTable::new(vec![d, d.succ_opt().unwrap()])
                .with_column(ColumnKey::composite("Close", "AAPL"), vec![Some(1.0), None])
                .with_column(ColumnKey::composite("Volume", "AAPL"), vec![Some(5.0), Some(6.0)]),
        )
    }

    #[test]
    fn series_follow_the_date_axis() {
        let symbols = vec!["AAPL".to_string()];
        let (chart, missing) = ChartSpec::ClosingPrice.build(&table(), &symbols);

        assert!(missing.is_empty());
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.series[0].label, "AAPL");
        assert_eq!(chart.series[0].points.len(), 2);
        assert_eq!(chart.series[0].defined().count(), 1);
    }

    #[test]
    fn absent_symbols_render_as_empty_series() {
        let symbols = vec!["AAPL".to_string(), "GONE".to_string()];
        let (chart, missing) = ChartSpec::Volume.build(&table(), &symbols);

        assert_eq!(chart.kind, ChartKind::StackedArea);
        assert_eq!(missing, vec!["Volume_GONE".to_string()]);
        assert!(chart.series[1].points.is_empty());
        assert!(chart.series[1].is_blank());
        assert!(!chart.series[0].is_blank());
    }

    #[test]
    fn moving_average_labels_carry_the_window() {
        let spec = ChartSpec::MovingAverage { window: 50 };
        assert_eq!(spec.column("TSLA"), "MA50_TSLA");
        assert_eq!(spec.label("TSLA"), "TSLA 50-Day MA");
        let (chart, _) = spec.build(&table(), &vec!["TSLA".to_string()]);
        assert_eq!(chart.title, "50-Day Moving Average");
    }
}
