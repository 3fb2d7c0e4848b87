use crate::table::{FlatColumn, FlatTable, RawTable};
use chrono::NaiveDate;
use tracing::trace;

/// Flattens a fetched table into one row per distinct date, ascending.
///
/// Composite `(field, symbol)` keys collapse into `<Field>_<Symbol>`, plain keys
/// keep their field name. Duplicate dates are merged with the later non-missing
/// value winning, and columns that flatten to the same name are merged the
/// same way. An empty input yields an empty table.
pub fn normalize(raw: &RawTable) -> FlatTable {
    let mut dates: Vec<NaiveDate> = raw.index().to_vec();
    dates.sort_unstable();
    dates.dedup();

    let positions: Vec<usize> = raw
        .index()
        .iter()
        .map(|date| dates.binary_search(date).unwrap_or_else(|pos| pos))
        .collect();

    let mut columns: Vec<FlatColumn> = Vec::with_capacity(raw.columns().len());
    for raw_column in raw.columns() {
        let name = raw_column.key.flat_name();
        let idx = match columns.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                columns.push(FlatColumn {
                    name,
                    values: vec![None; dates.len()],
                });
                columns.len() - 1
            }
        };

        let values = &mut columns[idx].values;
        for (value, &pos) in raw_column.values.iter().zip(positions.iter()) {
            if value.is_some() {
                values[pos] = *value;
            }
        }
    }

    trace!(
        "Normalized {} raw rows into {} dated rows x {} columns",
        raw.index().len(),
        dates.len(),
        columns.len()
    );
    FlatTable::from_parts(dates, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnKey;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn composite_keys_become_field_symbol_names() {
        let raw = RawTable::new(vec![day(1), day(4)])
            .with_column(ColumnKey::composite("Close", "AAPL"), vec![Some(1.0), Some(2.0)])
            .with_column(ColumnKey::composite("Volume", "AAPL"), vec![Some(10.0), Some(20.0)]);

        let table = normalize(&raw);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["Close_AAPL", "Volume_AAPL"]
        );
        assert_eq!(table.dates(), &[day(1), day(4)]);
    }

    #[test]
    fn single_symbol_plain_columns_stay_unqualified() {
        let raw = RawTable::new(vec![day(1)])
            .with_column(ColumnKey::plain("Close"), vec![Some(1.0)])
            .with_column(ColumnKey::composite("Open", ""), vec![Some(0.5)]);

        let table = normalize(&raw);
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["Close", "Open"]);
    }

    #[test]
    fn rows_are_sorted_and_deduplicated() {
        let raw = RawTable::new(vec![day(5), day(2), day(5), day(3)]).with_column(
            ColumnKey::composite("Close", "MSFT"),
            vec![Some(5.0), Some(2.0), None, Some(3.0)],
        );

        let table = normalize(&raw);
        assert_eq!(table.dates(), &[day(2), day(3), day(5)]);
        assert_eq!(
            table.column("Close_MSFT").unwrap(),
            &[Some(2.0), Some(3.0), Some(5.0)]
        );
    }

    #[test]
    fn missing_cells_stay_missing() {
        let raw = RawTable::new(vec![day(1), day(2)])
            .with_column(ColumnKey::composite("Close", "AAPL"), vec![Some(1.0), Some(2.0)])
            .with_column(ColumnKey::composite("Close", "DEAD"), vec![None, None]);

        let table = normalize(&raw);
        assert_eq!(table.column("Close_DEAD").unwrap(), &[None, None]);
        assert_eq!(table.row(1).unwrap().get("Close_AAPL"), Some(2.0));
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let raw = RawTable::new(vec![]).with_column(ColumnKey::composite("Close", "AAPL"), vec![]);
        let table = normalize(&raw);
        assert!(table.is_empty());
        assert_eq!(table.rows().count(), 0);
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let raw = RawTable::new(vec![day(2), day(1)])
            .with_column(ColumnKey::composite("High", "IBM"), vec![Some(3.0), Some(4.0)]);
        assert_eq!(normalize(&raw), normalize(&raw));
    }
}
