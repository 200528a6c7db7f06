use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use gsc_scorecard::{
    client::{HttpReportingApi, OAuthClient},
    config::Config,
    export::{ExportCache, ExportFormat},
    pipeline::{Report, Selection, run_report},
    processor::{AggregateOp, DateWindow, Metric, SearchType, aggregator::TOP_N},
    session::Session,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser)]
#[command(name = "gsc-scorecard")]
#[command(about = "Top-N Search Console reports from the command line")]
struct Cli {
    /// Client secrets file (TOML)
    #[arg(short, long, env = "GSC_CONFIG")]
    config: Option<PathBuf>,

    /// Logging level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the consent URL that yields an authorization code
    AuthUrl,
    /// Authorize and list the account's properties
    Sites {
        /// Authorization code pasted from the consent page
        #[arg(long, env = "GSC_AUTH_CODE")]
        code: String,
    },
    /// Authorize, query one property and print the top rows
    Report(ReportArgs),
}

#[derive(Args)]
struct ReportArgs {
    /// Authorization code pasted from the consent page
    #[arg(long, env = "GSC_AUTH_CODE")]
    code: String,

    /// Property to query, as listed by `sites`
    #[arg(long)]
    site: String,

    /// Main dimension
    #[arg(long, default_value = "query")]
    dimension: String,

    /// Nested dimension, or "none"
    #[arg(long, default_value = "none")]
    nested_dimension: String,

    /// Second nested dimension, or "none"
    #[arg(long = "nested-dimension-2", default_value = "none")]
    nested_dimension_2: String,

    /// web, news, video, googleNews or image
    #[arg(long, default_value = "web")]
    search_type: String,

    /// last-7-days, last-30-days, last-3-months, last-6-months or last-12-months
    #[arg(long, default_value = "last-30-days")]
    range: String,

    /// Metric to aggregate; repeat for more, the first one drives the sort
    #[arg(long = "metric", default_values_t = vec!["clicks".to_string()])]
    metrics: Vec<String>,

    /// sum or avg
    #[arg(long, default_value = "sum")]
    op: String,

    /// Write the table to this path
    #[arg(long)]
    export: Option<PathBuf>,

    /// Export format: xlsx or csv
    #[arg(long, default_value = "xlsx")]
    export_format: String,
}

fn main() -> anyhow::Result<()> {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref()).context("cannot load configuration")?;
    let timeout = config.api.timeout_secs.map(Duration::from_secs);
    let oauth = OAuthClient::new(&config.installed, timeout)?;

    match cli.command {
        Command::AuthUrl => {
            println!("{}", oauth.authorization_url());
        }
        Command::Sites { code } => {
            let api = HttpReportingApi::new(&config.api)?;
            let session =
                Session::authorize(&oauth, &api, &code).context("authorization failed")?;
            for site in session.site_urls() {
                println!("{site}");
            }
        }
        Command::Report(args) => {
            let api = HttpReportingApi::new(&config.api)?;
            let selection = args.selection()?;
            let export_format = args.export_format.parse::<ExportFormat>()?;
            let session =
                Session::authorize(&oauth, &api, &args.code).context("authorization failed")?;
            info!("Authorization succeeded for {} properties", session.site_urls().len());

            let today = Local::now().date_naive();
            match run_report(&session, &api, &selection, today).context("report failed")? {
                Report::Empty => {
                    warn!("No data available; refine the search criteria");
                }
                Report::Ready { total_rows, table } => {
                    println!(
                        "Fetched {total_rows} rows. Top {TOP_N} by {}:",
                        selection.metrics[0]
                    );
                    println!();
                    print!("{table}");

                    if let Some(path) = &args.export {
                        let cache = ExportCache::new();
                        let bytes = cache
                            .write(&table, export_format, path)
                            .with_context(|| format!("cannot export to {}", path.display()))?;
                        info!("Exported {} bytes of {} to {}", bytes, export_format, path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

impl ReportArgs {
    fn selection(&self) -> anyhow::Result<Selection> {
        let metrics = self
            .metrics
            .iter()
            .map(|m| m.parse::<Metric>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Selection {
            site_url: self.site.clone(),
            search_type: self.search_type.parse::<SearchType>()?,
            date_window: self.range.parse::<DateWindow>()?,
            dimensions: vec![
                self.dimension.clone(),
                self.nested_dimension.clone(),
                self.nested_dimension_2.clone(),
            ],
            metrics,
            op: self.op.parse::<AggregateOp>()?,
        })
    }
}
