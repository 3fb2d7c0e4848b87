use anyhow::{anyhow, Result};
use kabu_yahoo::{Adjustment, YahooConfig, YahooFetcher, DEFAULT_BASE_URL};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub user_agent: String,
    pub yahoo_url: String,
    pub concurrency: usize,
    pub timeout: Duration,
    pub cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| dotenv::var(name).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| {
            var(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            user_agent: text("USER_AGENT", DEFAULT_USER_AGENT),
            yahoo_url: text("KABU_YAHOO_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            concurrency: number(&var, "KABU_CONCURRENCY", num_cpus::get())?.max(1),
            timeout: Duration::from_secs(number(&var, "KABU_TIMEOUT_SECS", 20)?),
            cache_ttl: Duration::from_secs(number(&var, "KABU_CACHE_TTL_SECS", 300)?),
        })
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()?;
        Ok(client)
    }

    pub fn fetcher(&self, adjustment: Adjustment) -> Result<YahooFetcher> {
        Ok(YahooFetcher::new(
            self.http_client()?,
            YahooConfig {
                base_url: self.yahoo_url.clone(),
                concurrency: self.concurrency,
                adjustment,
            },
        ))
    }
}

fn number<F, T>(var: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("environment variable {name}={raw:?} is invalid: {e}")),
        None => Ok(default),
    }
}
