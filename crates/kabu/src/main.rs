// ==========================================
//  ██╗  ██╗ █████╗ ██████╗ ██╗   ██╗
//  ██║ ██╔╝██╔══██╗██╔══██╗██║   ██║
//  █████╔╝ ███████║██████╔╝██║   ██║
//  ██╔═██╗ ██╔══██║██╔══██╗██║   ██║
//  ██║  ██╗██║  ██║██████╔╝╚██████╔╝
//  ╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝  ╚═════╝
// ==========================================

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands::*, TraceLevel};
use config::Config;
use dotenv::dotenv;
use kabu_core::controller::CANDIDATE_SYMBOLS;
use kabu_core::{render_cycle, CycleReport, DashboardInput};
use report::HtmlReport;
use tracing::{debug, subscriber, trace, Level};
use tracing_subscriber::FmtSubscriber;
use ui::{ProgressFetcher, TerminalSink};

mod cli;
mod config;
mod interactive;
mod report;
mod ui;

fn preprocess(trace_level: Level) -> Result<()> {
    dotenv().ok();
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .with_writer(std::io::stderr)
        .finish();
    subscriber::set_global_default(my_subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.trace {
        TraceLevel::DEBUG => Level::DEBUG,
        TraceLevel::INFO => Level::INFO,
        TraceLevel::WARN => Level::WARN,
        TraceLevel::ERROR => Level::ERROR,
    };

    preprocess(log_level)?;
    trace!("Command line input recorded: {cli:#?}");

    ////////////////////////////////////////////////////////////////////////////////////////////////////

    // cli framework:
    // "> kabu <COMMAND>"
    match &cli.command {
        // "> kabu show --symbols AAPL,MSFT --start 2023-01-01"
        // one render cycle
        Show {
            symbols,
            start,
            end,
            render,
        } => {
            let config = Config::from_env()?;
            debug!("Configuration loaded: {config:?}");

            let end = end.unwrap_or_else(interactive::today);
            let input = DashboardInput::new(symbols, *start, end);
            let fetcher = ProgressFetcher::new(config.fetcher(render.adjustment())?);

            let mut sink = (
                TerminalSink::stdout(),
                render.html.as_ref().map(|_| HtmlReport::new()),
            );
            let outcome = render_cycle(&fetcher, &mut sink, &input, &render.options()).await;

            let (terminal, html) = sink;
            terminal.finish()?;
            if let (Some(report), Some(path)) = (html, render.html.as_ref()) {
                report.write(path)?;
            }

            match outcome? {
                CycleReport::Rendered(dashboard) if !dashboard.missing.is_empty() => {
                    debug!("Rendered with empty series for {:?}", dashboard.missing)
                }
                _ => {}
            }
        }

        // "> kabu interactive"
        // prompt, render, repeat
        Interactive { render } => {
            let config = Config::from_env()?;
            debug!("Configuration loaded: {config:?}");
            interactive::run(&config, render).await?;
        }

        // "> kabu symbols"
        Symbols => {
            for symbol in CANDIDATE_SYMBOLS {
                println!("{symbol}");
            }
        }
    }

    Ok(())
}
