use crate::schema::{PriceCategories, PriceHistory};
use chrono::{DateTime, NaiveDate, NaiveTime};
use kabu_core::{FetchError, Field};
use reqwest::{Client, StatusCode};
use tracing::{error, trace, warn};

///////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Daily prices from Yahoo Finance, per ticker
//
///////////////////////////////////////////////////////////////////////////////////////////////////////

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// How OHLC prices are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Adjustment {
    /// Close is the split/dividend adjusted close; open, high & low are scaled by the same ratio.
    #[default]
    Auto,
    /// Prices exactly as the exchange reported them.
    Raw,
}

/// One ticker's decoded daily series, aligned on `dates`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct History {
    pub dates: Vec<NaiveDate>,
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
}

impl History {
    pub fn field(&self, field: Field) -> &[Option<f64>] {
        match field {
            Field::Close => &self.close,
            Field::High => &self.high,
            Field::Low => &self.low,
            Field::Open => &self.open,
            Field::Volume => &self.volume,
        }
    }

    fn adjust(&mut self, adjclose: &[Option<f64>]) {
        for (idx, adj) in adjclose.iter().enumerate().take(self.close.len()) {
            let (adj, ratio) = match (*adj, self.close[idx]) {
                (Some(adj), Some(close)) if close != 0.0 => (adj, adj / close),
                _ => continue,
            };
            self.close[idx] = Some(adj);
            for series in [&mut self.open, &mut self.high, &mut self.low] {
                if let Some(Some(value)) = series.get_mut(idx) {
                    *value *= ratio;
                }
            }
        }
    }
}

/// `end` is exclusive: `period2` is midnight UTC of the end date.
pub fn url(base: &str, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
    let tckr = ticker.to_uppercase();
    let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
    let period2 = end.and_time(NaiveTime::MIN).and_utc().timestamp();
    format!(
        "{base}/{tckr}?symbol={tckr}&period1={period1}&period2={period2}&interval=1d&includeAdjustedClose=true&events=div|split|capitalGains",
    )
}

pub(crate) async fn fetch(
    client: &Client,
    base: &str,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    adjustment: Adjustment,
) -> Result<Option<History>, FetchError> {
    let url = url(base, ticker, start, end);
    trace!("Fetching price data for [{ticker}] from Yahoo Finance");

    let response = client.get(&url).send().await.map_err(|e| {
        error!("[{ticker}] price fetching error: {e}\nURL: {url}");
        FetchError::Request {
            symbol: ticker.to_string(),
            source: Box::new(e),
        }
    })?;
    let status = response.status();
    let body = response.bytes().await.map_err(|e| {
        error!("[{ticker}] byte transformation error: {e}\nURL: {url}");
        FetchError::Request {
            symbol: ticker.to_string(),
            source: Box::new(e),
        }
    })?;

    decode(ticker, status, &body, adjustment)
}

/// Turns one chart response into a [`History`].
///
/// `Ok(None)` means the ticker has no data in range (unknown, delisted, or
/// simply no sessions), which is not a failure.
pub fn decode(
    ticker: &str,
    status: StatusCode,
    body: &[u8],
    adjustment: Adjustment,
) -> Result<Option<History>, FetchError> {
    match status {
        StatusCode::NOT_FOUND => {
            warn!("[{ticker}] not found upstream; filling with missing values instead");
            return Ok(None);
        }
        StatusCode::TOO_MANY_REQUESTS => {
            return Err(FetchError::RateLimited {
                symbol: ticker.to_string(),
            })
        }
        s if !s.is_success() => {
            return Err(FetchError::Status {
                symbol: ticker.to_string(),
                status: s.as_u16(),
            })
        }
        _ => {}
    }

    // error check the deserialization
    trace!("Deserializing price data for [{ticker}]");
    let de = serde_json::from_slice::<PriceHistory>(body).map_err(|e| {
        error!("[{ticker}] deserialization error: {e}");
        FetchError::Decode {
            symbol: ticker.to_string(),
            reason: e.to_string(),
        }
    })?;

    if let Some(err) = &de.chart.error {
        warn!(
            "[{ticker}] upstream reported {}: {}",
            err.code,
            err.description.as_deref().unwrap_or("no description")
        );
    }

    let base = match de.chart.result.as_deref() {
        Some([base, ..]) if !base.timestamp.is_empty() => base,
        _ => {
            warn!("[{ticker}] contained no price rows; filling with missing values instead");
            return Ok(None);
        }
    };

    let mut history = transform(ticker, base)?;
    if adjustment == Adjustment::Auto {
        match base.indicators.adjclose.first() {
            Some(adj) => history.adjust(&adj.adjclose),
            None => trace!("[{ticker}] no adjusted close supplied; keeping raw prices"),
        }
    }
    trace!("Price data decoded for [{ticker}]: {} rows", history.dates.len());
    Ok(Some(history))
}

fn transform(ticker: &str, base: &PriceCategories) -> Result<History, FetchError> {
    let offset = base.meta.gmtoffset;
    let dates = base
        .timestamp
        .iter()
        .map(|ts| {
            ts.checked_add(offset)
                .and_then(|local| DateTime::from_timestamp(local, 0))
                .map(|dt| dt.date_naive())
                .ok_or_else(|| FetchError::Decode {
                    symbol: ticker.to_string(),
                    reason: format!("invalid timestamp {ts}"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let len = dates.len();
    let quote = base.indicators.quote.first();
    let mut volume: Vec<Option<f64>> = quote
        .map(|q| q.volume.iter().map(|v| v.map(|v| v as f64)).collect())
        .unwrap_or_default();
    volume.resize(len, None);

    Ok(History {
        open: aligned(quote.map(|q| &q.open), len),
        high: aligned(quote.map(|q| &q.high), len),
        low: aligned(quote.map(|q| &q.low), len),
        close: aligned(quote.map(|q| &q.close), len),
        volume,
        dates,
    })
}

fn aligned(values: Option<&Vec<Option<f64>>>, len: usize) -> Vec<Option<f64>> {
    let mut values = values.cloned().unwrap_or_default();
    values.resize(len, None);
    values
}
