use crate::error::DashError;
use crate::table::{column_name, moving_average_column, Field, FlatTable};
use tracing::{trace, warn};

pub const DEFAULT_WINDOW: usize = 50;

/// Trailing simple moving average over exactly `window` samples.
///
/// The first `window - 1` entries are `None`, as is any window that contains a
/// missing sample.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|end| {
            if end + 1 < window {
                return None;
            }
            let slice = &values[end + 1 - window..=end];
            slice
                .iter()
                .copied()
                .sum::<Option<f64>>()
                .map(|sum| sum / window as f64)
        })
        .collect()
}

/// Attaches `MA{window}_{symbol}` computed from `Close_{symbol}`.
///
/// When the close column is absent the average column is still attached,
/// entirely missing, and `DashError::MissingColumn` is returned so the caller
/// can decide whether that matters.
pub fn add_moving_average(
    table: &mut FlatTable,
    symbol: &str,
    window: usize,
) -> Result<(), DashError> {
    if window == 0 {
        return Err(DashError::InvalidWindow);
    }

    let close = column_name(Field::Close.as_str(), symbol);
    let target = moving_average_column(window, symbol);

    let averages = match table.column(&close) {
        Some(values) => rolling_mean(values, window),
        None => {
            warn!("[{symbol}] {close} not found; {target} left empty");
            table.set_column(target, vec![None; table.len()]);
            return Err(DashError::MissingColumn(close));
        }
    };

    trace!(
        "[{symbol}] {target}: {} of {} rows defined",
        averages.iter().flatten().count(),
        averages.len()
    );
    table.set_column(target, averages);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::table::{ColumnKey, RawTable};
    use chrono::{Days, NaiveDate};

    fn table_with(series: &[(&str, Vec<Option<f64>>)]) -> FlatTable {
        let len = series.first().map(|(_, v)| v.len()).unwrap_or(0);
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let dates = (0..len as u64).map(|i| start + Days::new(i)).collect();
        let raw = series.iter().fold(RawTable::new(dates), |raw, (symbol, values)| {
            raw.with_column(ColumnKey::composite("Close", *symbol), values.clone())
        });
        normalize(&raw)
    }

    #[test]
    fn constant_series_averages_to_the_constant() {
        let mut table = table_with(&[("AAPL", vec![Some(100.0); 60])]);
        add_moving_average(&mut table, "AAPL", 50).unwrap();

        let ma = table.column("MA50_AAPL").unwrap();
        assert!(ma[..49].iter().all(Option::is_none));
        assert!(ma[49..].iter().all(|v| *v == Some(100.0)));
    }

    #[test]
    fn window_is_never_shortened() {
        let values: Vec<Option<f64>> = (1..=5).map(|v| Some(v as f64)).collect();
        assert_eq!(
            rolling_mean(&values, 3),
            vec![None, None, Some(2.0), Some(3.0), Some(4.0)]
        );
        assert_eq!(rolling_mean(&values[..2], 3), vec![None, None]);
    }

    #[test]
    fn gaps_poison_only_the_windows_that_contain_them() {
        let values = vec![Some(1.0), None, Some(3.0), Some(5.0), Some(7.0)];
        assert_eq!(
            rolling_mean(&values, 2),
            vec![None, None, None, Some(4.0), Some(6.0)]
        );
    }

    #[test]
    fn symbols_keep_independent_windows() {
        let mut table = table_with(&[
            ("AAPL", (0..4).map(|v| Some(v as f64)).collect()),
            ("MSFT", vec![Some(10.0); 4]),
        ]);
        add_moving_average(&mut table, "AAPL", 2).unwrap();
        add_moving_average(&mut table, "MSFT", 2).unwrap();

        assert_eq!(
            table.column("MA2_AAPL").unwrap(),
            &[None, Some(0.5), Some(1.5), Some(2.5)]
        );
        assert_eq!(
            table.column("MA2_MSFT").unwrap(),
            &[None, Some(10.0), Some(10.0), Some(10.0)]
        );
    }

    #[test]
    fn missing_close_column_is_reported_and_left_empty() {
        let mut table = table_with(&[("AAPL", vec![Some(1.0); 3])]);
        let err = add_moving_average(&mut table, "GONE", 2).unwrap_err();

        assert!(matches!(err, DashError::MissingColumn(ref c) if c == "Close_GONE"));
        assert!(!err.is_fatal());
        assert_eq!(table.column("MA2_GONE").unwrap(), &[None, None, None]);
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut table = table_with(&[("AAPL", vec![Some(1.0)])]);
        assert!(matches!(
            add_moving_average(&mut table, "AAPL", 0),
            Err(DashError::InvalidWindow)
        ));
    }

    #[test]
    fn recomputing_is_idempotent() {
        let mut once = table_with(&[("NVDA", (0..70).map(|v| Some(v as f64 * 1.5)).collect())]);
        add_moving_average(&mut once, "NVDA", DEFAULT_WINDOW).unwrap();
        let mut twice = once.clone();
        add_moving_average(&mut twice, "NVDA", DEFAULT_WINDOW).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.columns().len(), 2);
    }
}
