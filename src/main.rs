mod catalog;
mod config;
mod error;
mod export;
mod models;
mod runner;
mod scrapers;

use anyhow::{Context, Result};
use catalog::RegionCatalog;
use clap::Parser;
use config::{Cli, CollectArgs, Command};
use export::ResultSink;
use models::{ListingRecord, RunSummary};
use runner::RegionRunner;
use scrapers::{ResponseParser, ScrollCollector, SiteProfile};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let catalog = match RegionCatalog::load(&cli.catalog).await {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if catalog.is_empty() {
        warn!("Region catalog {} is empty", cli.catalog);
    }

    match cli.command {
        Command::Regions { search } => list_regions(&catalog, search.as_deref()),
        Command::Collect(args) => collect(&catalog, &args).await,
    }
}

fn list_regions(catalog: &RegionCatalog, search: Option<&str>) -> Result<()> {
    let regions: Vec<_> = match search {
        Some(term) => catalog.search(term),
        None => catalog.regions().iter().collect(),
    };

    for region in &regions {
        println!("[{}] {}", region.id, region.name);
    }
    info!("{} of {} regions", regions.len(), catalog.len());
    Ok(())
}

async fn collect(catalog: &RegionCatalog, args: &CollectArgs) -> Result<()> {
    let targets = match catalog.resolve(&args.region) {
        Ok(targets) => targets,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    info!("🖥️  Club Scout - map search collector");
    info!("==========================================");
    info!("Regions to process: {}", targets.len());
    info!("");

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, finishing current region...");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let profile = SiteProfile::default();
    let collector = ScrollCollector::new(
        ResponseParser::new(profile.clone(), args.parse_options()),
        profile,
        args.collect_settings(),
    );
    let runner = RegionRunner::new(args.launcher(), collector, cancel)
        .with_region_pause(args.region_pause());

    let outcomes = runner.run_all(&targets).await;
    let summary = RunSummary::from_outcomes(&outcomes);
    let clubs: Vec<ListingRecord> = outcomes.into_iter().flat_map(|o| o.clubs).collect();

    let label = match targets.as_slice() {
        [single] => single.name.clone(),
        _ => catalog::GLOBAL.to_string(),
    };
    let sink = ResultSink::new(&args.output_dir);
    sink.write(&label, &clubs, &summary)
        .await
        .with_context(|| format!("Failed to export results to {}", sink.output_dir().display()))?;

    log_summary(&summary);
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    info!("");
    info!("✅ Run finished");
    info!(
        "   Regions: {} ({} ok, {} failed)",
        summary.total_regions, summary.successful_regions, summary.failed_regions
    );
    info!("   Clubs: {}", summary.total_clubs);
    info!("   Network responses: {}", summary.network_requests);

    let top = summary.top_regions(5);
    if !top.is_empty() {
        info!("🏆 Top regions:");
        for (i, region) in top.iter().enumerate() {
            info!("   {}. {} - {} clubs", i + 1, region.region, region.clubs_sum);
        }
    }

    for failed in summary.regions.iter().filter(|r| !r.is_success()) {
        warn!(
            "   {} failed: {}",
            failed.region,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }
}
