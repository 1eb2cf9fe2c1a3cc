use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{info, LevelFilter};

use docket_harvester_lib::{
    logger, run_worker, CrawlSummary, Crawler, CsvSink, DailyDocketCrawler, HarvesterConfig, HttpTransport, ResumeCheckpoint,
    RetryingTransport, SearchCategory, WorkCoordinator, WorkerIdentity,
};

#[derive(Parser, Debug)]
#[command(name = "docket_harvester", version, about = "Harvests court docket listings page by page")]
struct Cli {
    /// JSON config file; defaults apply when it does not exist
    #[arg(long, default_value = "harvester.json")]
    config: PathBuf,

    /// Overrides the coordinator database path from the config
    #[arg(long)]
    coordinator: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Standalone crawl resuming from the checkpoint file
    Crawl {
        /// Categories to crawl, all when omitted
        #[arg(long = "category")]
        categories: Vec<SearchCategory>,
        #[arg(long, default_value = "dockets.csv")]
        output: PathBuf,
        /// Stop each category after this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Crawl today's daily docket court by court
    Daily {
        /// Court codes to crawl, all offered courts when omitted
        #[arg(long = "court")]
        courts: Vec<String>,
        #[arg(long, default_value = "daily_docket.csv")]
        output: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Create the page ledger for coordinated workers
    Init {
        #[arg(long)]
        category: SearchCategory,
        #[arg(long)]
        pages: u32,
    },
    /// Print ledger progress and worker statistics
    Status {
        #[arg(long)]
        category: Option<SearchCategory>,
    },
    /// Run one coordinated worker until its queue drains
    Worker {
        #[arg(long)]
        category: SearchCategory,
        /// Worker id; generated from the hostname when omitted
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "dockets.csv")]
        output: PathBuf,
    },
    /// Discard the standalone checkpoint after confirmation
    ResetCheckpoint,
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

fn print_summary(summary: &CrawlSummary) {
    println!("Pages processed:      {}", summary.pages);
    println!("Records stored:       {}", summary.stored);
    println!("Sealed records:       {}", summary.sealed);
    println!("Skipped records:      {}", summary.skipped);
    println!("Degraded extractions: {}", summary.extraction_errors);
    println!("Storage failures:     {}", summary.sink_errors);
    if summary.failed_categories > 0 {
        println!("Failed categories:    {}", summary.failed_categories);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logger::init(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info });

    let mut config = HarvesterConfig::load(&cli.config)?;
    if let Some(path) = cli.coordinator {
        config.coordinator_path = path;
    }

    match cli.command {
        Command::Crawl { categories, output, limit } => {
            if limit.is_some() {
                config.record_limit = limit;
            }
            let categories = if categories.is_empty() { SearchCategory::ALL.to_vec() } else { categories };
            info!("Starting docket crawl for {:?}", categories);

            let site = config.site()?;
            let transport = RetryingTransport::new(HttpTransport::new(&config)?, config.transport_retry_policy());
            let mut checkpoint = ResumeCheckpoint::load(&config.checkpoint_path, config.checkpoint_flush_every);
            let sink = CsvSink::open(&output)?;

            let summary = Crawler::new(&transport, &site, &config, &mut checkpoint, sink).run(&categories);
            info!("Crawl finished.");
            print_summary(&summary);
        }
        Command::Daily { courts, output, limit } => {
            if limit.is_some() {
                config.record_limit = limit;
            }
            let site = config.site()?;
            let transport = RetryingTransport::new(HttpTransport::new(&config)?, config.transport_retry_policy());
            let mut checkpoint = ResumeCheckpoint::load(&config.checkpoint_path, config.checkpoint_flush_every);
            let sink = CsvSink::open(&output)?;

            let summary = DailyDocketCrawler::new(&transport, &site, &config, &mut checkpoint, sink).run(&courts)?;
            println!("Courts completed:     {}", summary.courts_completed);
            println!("Courts skipped:       {}", summary.courts_skipped);
            println!("Courts failed:        {}", summary.courts_failed);
            print_summary(&summary.records);
        }
        Command::Init { category, pages } => {
            let coordinator = WorkCoordinator::new(&config.coordinator_path)?;
            if !coordinator.initialize_pages(category, pages)? {
                println!("Pages already initialized for {}", category);
            }
        }
        Command::Status { category } => {
            let coordinator = WorkCoordinator::new(&config.coordinator_path)?;
            coordinator.mark_dead_workers()?;
            if let Some(category) = category {
                let progress = coordinator.get_progress(category)?;
                println!("\n{} Progress:", category.as_str().to_uppercase());
                println!("  Total pages: {}", progress.total);
                println!("  Completed: {} ({:.1}%)", progress.completed, progress.percent_complete());
                println!("  Assigned: {}", progress.assigned);
                println!("  Pending: {}", progress.pending);
                println!("  Failed: {}", progress.failed);
            }

            println!("\nWorker Statistics:");
            for worker in coordinator.get_worker_stats()? {
                let heartbeat = worker
                    .last_heartbeat
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "  {} ({}): {} pages, last seen {}, {}",
                    worker.worker_id, worker.hostname, worker.pages_completed, heartbeat, worker.status
                );
            }
        }
        Command::Worker { category, id, output } => {
            let host = hostname();
            let identity = match id {
                Some(id) => WorkerIdentity::new(id, host),
                None => WorkerIdentity::generate(&host),
            };

            let coordinator = WorkCoordinator::new(&config.coordinator_path)?;
            let site = config.site()?;
            let transport = RetryingTransport::new(HttpTransport::new(&config)?, config.transport_retry_policy());
            let sink = CsvSink::open(&output)?;

            let summary = run_worker(&coordinator, &transport, &site, &config, sink, &identity, category)?;
            println!(
                "Worker {} completed! Processed {} pages ({} failed, {} lost to other workers)",
                identity.worker_id, summary.pages_completed, summary.pages_failed, summary.leases_lost
            );
            print_summary(&summary.records);
        }
        Command::ResetCheckpoint => {
            let mut checkpoint = ResumeCheckpoint::load(&config.checkpoint_path, config.checkpoint_flush_every);
            let stdin = io::stdin();
            if checkpoint.reset(stdin.lock(), io::stdout())? {
                println!("Checkpoint reset");
            }
        }
    }

    Ok(())
}
