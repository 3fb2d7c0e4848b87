use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Name of the explicit date column of a [`FlatTable`].
pub const DATE_COLUMN: &str = "Date";

/// Daily trading summary fields, in the order the upstream service lays them out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Field {
    Close,
    High,
    Low,
    Open,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Close,
        Field::High,
        Field::Low,
        Field::Open,
        Field::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Close => "Close",
            Field::High => "High",
            Field::Low => "Low",
            Field::Open => "Open",
            Field::Volume => "Volume",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat column name for a `(field, symbol)` pair: `<Field>_<Symbol>`.
///
/// Leading and trailing underscores are stripped, so an empty symbol keeps
/// the bare field name.
pub fn column_name(field: &str, symbol: &str) -> String {
    format!("{field}_{symbol}").trim_matches('_').to_string()
}

/// Splits a flat column name back into `(field, symbol)` on the first underscore.
pub fn split_column_name(name: &str) -> (&str, Option<&str>) {
    match name.split_once('_') {
        Some((field, symbol)) => (field, Some(symbol)),
        None => (name, None),
    }
}

/// Column holding the trailing moving average of `symbol`'s close, e.g. `MA50_AAPL`.
pub fn moving_average_column(window: usize, symbol: &str) -> String {
    format!("MA{window}_{symbol}")
}

// -------------------------------------------------------------------------------------------------

/// Column identifier of a [`RawTable`]: either a bare field name (single-symbol
/// fetches) or a composite `(field, symbol)` key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Plain(String),
    Composite { field: String, symbol: String },
}

impl ColumnKey {
    pub fn plain(field: impl Into<String>) -> Self {
        ColumnKey::Plain(field.into())
    }

    pub fn composite(field: impl Into<String>, symbol: impl Into<String>) -> Self {
        ColumnKey::Composite {
            field: field.into(),
            symbol: symbol.into(),
        }
    }

    /// Collapses the key into a single underscore-joined name, field first.
    pub fn flat_name(&self) -> String {
        match self {
            ColumnKey::Plain(field) => field.trim_matches('_').to_string(),
            ColumnKey::Composite { field, symbol } => column_name(field, symbol),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawColumn {
    pub key: ColumnKey,
    pub values: Vec<Option<f64>>,
}

/// Date-indexed table as handed over by a market-data fetcher.
///
/// The date axis is the row index, not a column. A `None` cell means the
/// symbol did not trade that day.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTable {
    index: Vec<NaiveDate>,
    columns: Vec<RawColumn>,
}

impl RawTable {
    pub fn new(index: Vec<NaiveDate>) -> Self {
        RawTable {
            index,
            columns: Vec::new(),
        }
    }

    /// Appends a column; `values` is padded with `None` (or truncated) to the index length.
    pub fn push_column(&mut self, key: ColumnKey, mut values: Vec<Option<f64>>) {
        values.resize(self.index.len(), None);
        self.columns.push(RawColumn { key, values });
    }

    pub fn with_column(mut self, key: ColumnKey, values: Vec<Option<f64>>) -> Self {
        self.push_column(key, values);
        self
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlatColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Normalized table: one row per distinct date in ascending order, every
/// other column keyed by a single flat name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FlatTable {
    dates: Vec<NaiveDate>,
    columns: Vec<FlatColumn>,
}

impl FlatTable {
    pub(crate) fn from_parts(dates: Vec<NaiveDate>, columns: Vec<FlatColumn>) -> Self {
        FlatTable { dates, columns }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[FlatColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Inserts `name`, replacing an existing column of the same name in place.
    pub fn set_column(&mut self, name: impl Into<String>, mut values: Vec<Option<f64>>) {
        let name = name.into();
        values.resize(self.dates.len(), None);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(FlatColumn { name, values }),
        }
    }

    pub fn row(&self, idx: usize) -> Option<FlatRow<'_>> {
        (idx < self.dates.len()).then_some(FlatRow { table: self, idx })
    }

    pub fn rows(&self) -> impl Iterator<Item = FlatRow<'_>> {
        (0..self.dates.len()).map(move |idx| FlatRow { table: self, idx })
    }

    pub fn head(&self, n: usize) -> impl Iterator<Item = FlatRow<'_>> {
        self.rows().take(n)
    }
}

/// Borrowed view of one row of a [`FlatTable`].
#[derive(Clone, Copy, Debug)]
pub struct FlatRow<'a> {
    table: &'a FlatTable,
    idx: usize,
}

impl<'a> FlatRow<'a> {
    pub fn date(&self) -> NaiveDate {
        self.table.dates[self.idx]
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.table.column(column).and_then(|values| values[self.idx])
    }

    pub fn values(&self) -> impl Iterator<Item = (&'a str, Option<f64>)> + 'a {
        let idx = self.idx;
        self.table
            .columns
            .iter()
            .map(move |c| (c.name.as_str(), c.values[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_join_field_then_symbol() {
        assert_eq!(column_name("Close", "AAPL"), "Close_AAPL");
        assert_eq!(column_name("Volume", ""), "Volume");
        assert_eq!(ColumnKey::composite("Open", "MSFT").flat_name(), "Open_MSFT");
        assert_eq!(ColumnKey::plain("High").flat_name(), "High");
    }

    #[test]
    fn column_names_split_back_into_pairs() {
        for field in Field::ALL {
            for symbol in ["AAPL", "BRK.B", "GOOGL"] {
                let name = column_name(field.as_str(), symbol);
                assert_eq!(split_column_name(&name), (field.as_str(), Some(symbol)));
            }
        }
        assert_eq!(split_column_name("Close"), ("Close", None));
    }

    #[test]
    fn raw_columns_are_padded_to_the_index() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let raw = RawTable::new(vec![d, d.succ_opt().unwrap()])
            .with_column(ColumnKey::plain("Close"), vec![Some(1.0)]);
        assert_eq!(raw.columns()[0].values, vec![Some(1.0), None]);
    }

    #[test]
    fn set_column_replaces_in_place() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut table = FlatTable::from_parts(
            vec![d],
            vec![FlatColumn {
                name: "Close_AAPL".into(),
                values: vec![Some(1.0)],
            }],
        );
        table.set_column("MA50_AAPL", vec![None]);
        table.set_column("MA50_AAPL", vec![Some(2.0)]);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["Close_AAPL", "MA50_AAPL"]
        );
        let row = table.row(0).unwrap();
        assert_eq!(row.get("MA50_AAPL"), Some(2.0));
        assert_eq!(row.date(), d);
        assert!(table.row(1).is_none());
    }
}
