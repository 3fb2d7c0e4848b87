use crate::cli::RenderArgs;
use crate::config::Config;
use crate::report::HtmlReport;
use crate::ui::{ProgressFetcher, TerminalSink};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect};
use kabu_core::controller::{default_start, CANDIDATE_SYMBOLS, DEFAULT_SELECTION};
use kabu_core::{render_cycle, CachedFetcher, CycleReport, DashboardInput};
use tracing::{debug, info, trace};

/// Prompts for inputs, renders, and repeats until the user stops.
///
/// The previous answers seed the next round's prompts; fetched data is reused
/// through the cache while it is fresh.
pub async fn run(config: &Config, render: &RenderArgs) -> Result<()> {
    let fetcher = CachedFetcher::new(
        ProgressFetcher::new(config.fetcher(render.adjustment())?),
        config.cache_ttl,
    );
    let options = render.options();
    let theme = ColorfulTheme::default();

    let mut input = DashboardInput::new(DEFAULT_SELECTION, default_start(), today());
    loop {
        input = prompt(&theme, &input)?;
        trace!("Interactive input recorded: {input:?}");

        let mut sink = (
            TerminalSink::stdout(),
            render.html.as_ref().map(|_| HtmlReport::new()),
        );
        match render_cycle(&fetcher, &mut sink, &input, &options).await {
            Ok(CycleReport::Rendered(dashboard)) => {
                debug!("Rendered {} rows", dashboard.table.len())
            }
            Ok(CycleReport::SelectionRequired) => {}
            // already shown by the sink; only this cycle is lost
            Err(e) => info!("Cycle failed: {e}"),
        }

        let (terminal, html) = sink;
        terminal.finish()?;
        if let (Some(report), Some(path)) = (html, render.html.as_ref()) {
            report.write(path)?;
        }

        let again = Confirm::with_theme(&theme)
            .with_prompt("Change the selection?")
            .default(true)
            .interact()?;
        if !again {
            return Ok(());
        }
    }
}

fn prompt(theme: &ColorfulTheme, previous: &DashboardInput) -> Result<DashboardInput> {
    let defaults: Vec<bool> = CANDIDATE_SYMBOLS
        .iter()
        .map(|s| previous.symbols.iter().any(|p| p == s))
        .collect();
    let chosen = MultiSelect::with_theme(theme)
        .with_prompt("Select Stocks to View")
        .items(&CANDIDATE_SYMBOLS)
        .defaults(&defaults)
        .interact()?;

    let carried: Vec<&str> = previous
        .symbols
        .iter()
        .map(String::as_str)
        .filter(|s| !CANDIDATE_SYMBOLS.contains(s))
        .collect();
    let extra: String = Input::with_theme(theme)
        .with_prompt("Other symbols (comma separated)")
        .with_initial_text(carried.join(","))
        .allow_empty(true)
        .interact_text()?;

    let start = date(theme, "Start Date", previous.start)?;
    let end = date(theme, "End Date", previous.end)?;

    let symbols = chosen
        .into_iter()
        .map(|i| CANDIDATE_SYMBOLS[i].to_string())
        .chain(extra.split(',').map(str::to_string));
    Ok(DashboardInput::new(symbols, start, end))
}

fn date(theme: &ColorfulTheme, prompt: &str, default: NaiveDate) -> Result<NaiveDate> {
    let date = Input::<NaiveDate>::with_theme(theme)
        .with_prompt(prompt)
        .default(default)
        .interact_text()?;
    Ok(date)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
