use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use skillpulse_lib::commands::cycle::{run_cycle, CycleStage};
use skillpulse_lib::commands::db::{parse_date, SnapshotStore};
use skillpulse_lib::commands::settings::{
    load_effective_settings, EffectiveSettings, NotifyChannel, DEFAULT_SETTINGS_PATH,
};
use skillpulse_lib::commands::sources::{
    Enricher, JsonFileEnricher, JsonFileNotifier, JsonFileScraper, LogNotifier, NoEnrichment,
    Notifier,
};
use skillpulse_lib::Result;
use std::path::PathBuf;

/// SkillPulse - daily skill leaderboard trends.
#[derive(Parser, Debug)]
#[command(name = "skillpulse")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Path to the settings file
    #[arg(short, long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Override the database path from settings
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG wins when set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full daily cycle: select, enrich, analyze, notify, clean up
    Run(RunArgs),

    /// Print the stored board for a date
    Show(DateArg),

    /// Print a skill's rank/installs history
    History {
        name: String,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// List stored dates, newest first
    Dates {
        #[arg(long, default_value_t = 30)]
        limit: usize,
    },

    /// Per-category counts for a date
    Categories(DateArg),

    /// Biggest stored rank movers for a date
    Movers {
        #[command(flatten)]
        date: DateArg,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Delete snapshots and history outside the retention window
    Cleanup {
        /// Override retention days from settings
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON file with today's scraped leaderboard
    #[arg(long)]
    scrape: PathBuf,

    /// JSON file mapping skill name to enrichment details
    #[arg(long)]
    enrich: Option<PathBuf>,

    /// Cycle date (YYYY-MM-DD); defaults to today in UTC
    #[arg(long)]
    date: Option<String>,

    /// Write the trend report here (implies the json channel)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Override the surge threshold fraction
    #[arg(long)]
    surge_threshold: Option<f64>,

    /// Override how many skills are sent for enrichment
    #[arg(long)]
    top_n: Option<usize>,
}

#[derive(Args, Debug)]
struct DateArg {
    /// Date (YYYY-MM-DD); defaults to the latest stored date
    #[arg(long)]
    date: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.global.log_level.as_str()),
    )
    .init();

    if let Err(e) = execute(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<()> {
    let mut settings = load_effective_settings(&cli.global.settings)?;
    if let Some(db) = cli.global.db {
        settings.db_path = db;
    }
    let store = SnapshotStore::open(&settings.db_path)?;

    match cli.command {
        Command::Run(args) => run(&store, settings, args),
        Command::Show(arg) => match resolve_date(&store, arg.date.as_deref())? {
            Some(date) => print_json(&store.get_by_date(date)?),
            None => print_json(&Vec::<()>::new()),
        },
        Command::History { name, days } => print_json(&store.get_history(&name, days)?),
        Command::Dates { limit } => print_json(&store.get_available_dates(limit)?),
        Command::Categories(arg) => match resolve_date(&store, arg.date.as_deref())? {
            Some(date) => print_json(&store.get_category_stats(date)?),
            None => print_json(&Vec::<()>::new()),
        },
        Command::Movers { date, limit } => match resolve_date(&store, date.date.as_deref())? {
            Some(date) => print_json(&store.get_top_movers(date, limit)?),
            None => print_json(&Vec::<()>::new()),
        },
        Command::Cleanup { days } => {
            let removed = store.cleanup(days.unwrap_or(settings.retention_days))?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
    }
}

fn run(store: &SnapshotStore, mut settings: EffectiveSettings, args: RunArgs) -> Result<()> {
    if let Some(threshold) = args.surge_threshold {
        settings.surge_threshold = threshold;
    }
    if let Some(top_n) = args.top_n {
        settings.top_n_details = top_n;
    }
    if let Some(report) = args.report {
        settings.report_path = report;
        settings.notify_channel = NotifyChannel::Json;
    }
    let today = match args.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => chrono::Utc::now().date_naive(),
    };

    let scraper = JsonFileScraper::new(args.scrape);
    let enricher: Box<dyn Enricher> = match args.enrich {
        Some(path) => Box::new(JsonFileEnricher::new(path)),
        None => Box::new(NoEnrichment),
    };
    let notifier: Box<dyn Notifier> = match settings.notify_channel {
        NotifyChannel::Json => Box::new(JsonFileNotifier::new(settings.report_path.clone())),
        NotifyChannel::Log => Box::new(LogNotifier),
    };

    log::info!("skillpulse cycle for {today} (db: {})", settings.db_path.display());
    let report = run_cycle(
        store,
        &settings,
        &scraper,
        enricher.as_ref(),
        notifier.as_ref(),
        today,
        |stage: CycleStage| log::debug!("stage: {stage:?}"),
    )?;

    log::info!(
        "cycle complete: {} scraped, {} candidates, {} enriched",
        report.scraped,
        report.candidates,
        report.enriched
    );
    if !report.is_clean() {
        log::warn!("cycle finished with warnings: {:?}", report.cleanup);
    }
    print_json(&report.trends.summary())
}

fn resolve_date(store: &SnapshotStore, raw: Option<&str>) -> Result<Option<chrono::NaiveDate>> {
    match raw {
        Some(raw) => Ok(Some(parse_date(raw)?)),
        None => store.get_latest_date(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
