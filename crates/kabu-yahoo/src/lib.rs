pub mod prices;
pub mod schema;

pub use crate::prices::{Adjustment, History, DEFAULT_BASE_URL};

use chrono::NaiveDate;
use futures::{stream, StreamExt, TryStreamExt};
use kabu_core::{ColumnKey, FetchError, Fetcher, Field, RawTable};
use reqwest::Client;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct YahooConfig {
    pub base_url: String,
    /// Max in-flight requests, one request per ticker.
    pub concurrency: usize,
    pub adjustment: Adjustment,
}

impl Default for YahooConfig {
    fn default() -> Self {
        YahooConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: 4,
            adjustment: Adjustment::Auto,
        }
    }
}

/// [`Fetcher`] backed by the Yahoo! Finance chart endpoint.
#[derive(Clone, Debug)]
pub struct YahooFetcher {
    client: Client,
    config: YahooConfig,
}

impl YahooFetcher {
    pub fn new(client: Client, config: YahooConfig) -> Self {
        YahooFetcher { client, config }
    }

    pub fn config(&self) -> &YahooConfig {
        &self.config
    }
}

impl Fetcher for YahooFetcher {
    async fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, FetchError> {
        // the end date is exclusive, so there is nothing to ask for
        if start >= end {
            debug!("Empty range {start}..{end}; skipping Yahoo Finance");
            return Ok(assemble(symbols.iter().map(|s| (s.clone(), None)).collect()));
        }

        let time = std::time::Instant::now();
        let histories: Vec<(String, Option<History>)> = stream::iter(symbols.iter().cloned())
            .map(|ticker| async move {
                prices::fetch(
                    &self.client,
                    &self.config.base_url,
                    &ticker,
                    start,
                    end,
                    self.config.adjustment,
                )
                .await
                .map(|history| (ticker, history))
            })
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        debug!(
            "{} tickers fetched from Yahoo Finance. Elapsed time: {} ms",
            histories.len(),
            time.elapsed().as_millis()
        );
        Ok(assemble(histories))
    }
}

/// Outer-joins per-ticker histories on date.
///
/// Every ticker contributes a `(Field, TICKER)` column for each field, field
/// major and in the given ticker order, even when it returned no data; those
/// cells are missing.
pub fn assemble(histories: Vec<(String, Option<History>)>) -> RawTable {
    let index: Vec<NaiveDate> = histories
        .iter()
        .filter_map(|(_, h)| h.as_ref())
        .flat_map(|h| h.dates.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let positions: HashMap<NaiveDate, usize> =
        index.iter().enumerate().map(|(pos, d)| (*d, pos)).collect();

    let mut raw = RawTable::new(index);
    for field in Field::ALL {
        for (ticker, history) in &histories {
            let mut values = vec![None; positions.len()];
            match history {
                Some(history) => {
                    for (date, value) in history.dates.iter().zip(history.field(field)) {
                        if let (Some(&pos), Some(value)) = (positions.get(date), value) {
                            values[pos] = Some(*value);
                        }
                    }
                }
                None if field == Field::Close => {
                    warn!("[{ticker}] has no rows in range; its series will be empty")
                }
                None => {}
            }
            raw.push_column(ColumnKey::composite(field.as_str(), ticker.as_str()), values);
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn history(dates: &[u32], close: f64) -> History {
        let n = dates.len();
        History {
            dates: dates.iter().map(|d| day(*d)).collect(),
            open: vec![Some(close); n],
            high: vec![Some(close); n],
            low: vec![Some(close); n],
            close: vec![Some(close); n],
            volume: vec![Some(1000.0); n],
        }
    }

    #[test]
    fn histories_are_outer_joined_on_date() {
        let raw = assemble(vec![
            ("AAPL".into(), Some(history(&[3, 4, 5], 1.0))),
            ("MSFT".into(), Some(history(&[4, 6], 2.0))),
        ]);

        assert_eq!(raw.index(), &[day(3), day(4), day(5), day(6)]);
        assert_eq!(raw.columns().len(), 10);
        assert_eq!(raw.columns()[0].key, ColumnKey::composite("Close", "AAPL"));
        assert_eq!(raw.columns()[1].key, ColumnKey::composite("Close", "MSFT"));
        assert_eq!(raw.columns()[1].values, vec![None, Some(2.0), None, Some(2.0)]);
    }

    #[test]
    fn tickers_without_data_still_get_columns() {
        let raw = assemble(vec![
            ("AAPL".into(), Some(history(&[3], 1.0))),
            ("DEAD".into(), None),
        ]);

        let dead: Vec<_> = raw
            .columns()
            .iter()
            .filter(|c| matches!(&c.key, ColumnKey::Composite { symbol, .. } if symbol == "DEAD"))
            .collect();
        assert_eq!(dead.len(), 5);
        assert!(dead.iter().all(|c| c.values == vec![None]));
    }

    #[test]
    fn nothing_fetched_is_an_empty_table() {
        let raw = assemble(vec![("DEAD".into(), None)]);
        assert!(raw.is_empty());
        assert_eq!(raw.columns().len(), 5);
    }

    /// Answers every request on `listener` with `status` and `body`.
    async fn serve(listener: TcpListener, status: &'static str, body: &'static str) {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf[read..]).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => read += n,
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    }

    async fn fetcher_against(status: &'static str, body: &'static str) -> YahooFetcher {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, status, body));
        YahooFetcher::new(
            Client::builder().no_proxy().build().unwrap(),
            YahooConfig {
                base_url: format!("http://{addr}/v8/finance/chart"),
                ..Default::default()
            },
        )
    }

    const ONE_DAY: &str = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},"timestamp":[1672756200],"indicators":{"quote":[{"open":[1.0],"high":[2.0],"low":[0.5],"close":[1.5],"volume":[10]}],"adjclose":[{"adjclose":[1.5]}]}}],"error":null}}"#;

    #[tokio::test]
    async fn fetches_every_symbol_into_one_table() {
        let fetcher = fetcher_against("200 OK", ONE_DAY).await;
        let symbols = vec!["MSFT".to_string(), "AAPL".to_string()];

        let raw = fetcher.fetch(&symbols, day(1), day(10)).await.unwrap();
        assert_eq!(raw.index(), &[day(3)]);
        assert_eq!(raw.columns().len(), 10);
        assert!(raw.columns().iter().all(|c| c.values[0].is_some()));
        assert_eq!(raw.columns()[0].key, ColumnKey::composite("Close", "MSFT"));
        assert_eq!(raw.columns()[1].key, ColumnKey::composite("Close", "AAPL"));
    }

    #[tokio::test]
    async fn empty_ranges_skip_the_network() {
        let fetcher = YahooFetcher::new(
            Client::new(),
            YahooConfig {
                base_url: "http://127.0.0.1:9/unreachable".to_string(),
                ..Default::default()
            },
        );
        let symbols = vec!["AAPL".to_string()];

        let raw = fetcher.fetch(&symbols, day(5), day(5)).await.unwrap();
        assert!(raw.is_empty());
        assert_eq!(raw.columns().len(), 5);
    }

    #[tokio::test]
    async fn rate_limiting_fails_the_whole_fetch() {
        let fetcher = fetcher_against("429 Too Many Requests", "").await;
        let symbols = vec!["AAPL".to_string()];

        let err = fetcher.fetch(&symbols, day(1), day(10)).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { .. }));
    }
}
