mod arc;
mod audit;
mod cli;
mod config;
mod coordinator;
mod engine;
mod error;
mod report;
mod state_machine;
mod throttle;
mod ui;

#[cfg(test)]
mod fake_api;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use arc::{ArcClient, ErrorKind};
use audit::{Auditor, ContentType};
use cli::{Cli, Command, PurgeArgs};
use config::{AppConfig, Credentials};
use coordinator::{RunCoordinator, RunOptions};
use engine::TransitionEngine;
use error::AppError;
use state_machine::ContentItem;
use throttle::Governor;
use ui::{RunProgress, Spinner};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }

    match cli.command {
        Command::Audit {
            sites,
            years,
            reports_dir,
        } => run_audit(&config, sites, years, reports_dir).await,
        Command::AuditVideos {
            sites,
            cutoff,
            output,
        } => run_audit_videos(&config, sites, cutoff, output).await,
        Command::Purge(args) => run_purge(&config, args).await,
        Command::Verify { csv, site, sample } => run_verify(&config, &csv, &site, sample).await,
    }
}

// Logs go to stderr so the progress bar and summary own stdout.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "arc_notes=debug"
    } else {
        "arc_notes=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn connect(config: &AppConfig) -> Result<(ArcClient, Governor)> {
    let creds = Credentials::from_env()?;
    let client = match &config.api_base_url {
        Some(url) => ArcClient::with_base_url(creds.access_token, url.clone())?,
        None => ArcClient::new(creds.access_token, &creds.org_id)?,
    }
    .with_timeouts(config.draft_timeout(), config.search_timeout());

    let governor = Governor::new(config.retry_policy(), config.min_request_interval());
    debug!(
        org = %creds.org_id,
        max_retries = governor.policy().max_retries,
        min_interval_ms = config.min_request_interval_ms,
        "client ready"
    );
    Ok((client, governor))
}

async fn run_audit(
    config: &AppConfig,
    sites: Vec<String>,
    years: Option<String>,
    reports_dir: Option<PathBuf>,
) -> Result<()> {
    let sites = sites_to_audit(config, sites)?;
    let years = years.unwrap_or_else(|| config.years.clone());
    let specs = audit::parse_years(&years)?;
    if specs.is_empty() {
        bail!("no years to audit: pass --years or set YEARS_TO_AUDIT");
    }
    let reports_dir = reports_dir.unwrap_or_else(|| config.reports_dir.clone());

    let (client, governor) = connect(config)?;
    let auditor = Auditor::new(&client, &governor, config.page_size, config.max_result_window);

    for site in &sites {
        let years = match auditor.resolve_years(site, &specs).await {
            Ok(years) => years,
            Err(err) if err.kind() == ErrorKind::Authentication => return Err(err.into()),
            Err(err) => {
                error!(site = %site, error = %err, "could not resolve years, skipping site");
                continue;
            }
        };
        info!(site = %site, ?years, "site audit started");

        for year in years {
            let spinner = Spinner::start(format!("{site} {year}: searching"));
            match auditor.search(site, year).await {
                Ok(items) => {
                    let written = report::write_audit_report(&reports_dir, site, year, &items)
                        .with_context(|| format!("failed to write report for {site} {year}"))?;
                    match written {
                        Some(path) => spinner.success(&format!(
                            "{site} {year}: {} stories → {}",
                            items.len(),
                            path.display()
                        )),
                        None => spinner.warn(&format!("{site} {year}: no stories, nothing written")),
                    }
                }
                Err(err) if err.is_authentication() => {
                    spinner.warn(&format!("{site} {year}: {err}"));
                    return Err(err.into());
                }
                Err(err) => {
                    spinner.warn(&format!("{site} {year}: {err}"));
                    error!(site = %site, year, error = %err, "audit failed, continuing");
                }
            }
        }
    }
    Ok(())
}

async fn run_audit_videos(
    config: &AppConfig,
    sites: Vec<String>,
    cutoff: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let sites = sites_to_audit(config, sites)?;
    let raw = cutoff.unwrap_or_else(|| config.delete_cutoff_date.clone());
    let cutoff = audit::parse_publish_date(&raw)
        .ok_or_else(|| AppError::Config(format!("invalid cutoff date: {raw}")))?;
    let output = output.unwrap_or_else(|| config.reports_dir.join(report::VIDEO_REPORT_FILE));

    let (client, governor) = connect(config)?;
    let auditor = Auditor::new(&client, &governor, config.page_size, config.max_result_window)
        .with_content_type(ContentType::Video);

    let mut videos = Vec::new();
    for site in &sites {
        let spinner = Spinner::start(format!("{site}: searching videos"));
        match auditor.search_until(site, cutoff).await {
            Ok(items) => {
                spinner.success(&format!("{site}: {} videos", items.len()));
                videos.extend(items);
            }
            Err(err) if err.is_authentication() => {
                spinner.warn(&format!("{site}: {err}"));
                return Err(err.into());
            }
            Err(err) => {
                spinner.warn(&format!("{site}: {err}"));
                error!(site = %site, error = %err, "video audit failed, skipping site");
            }
        }
    }

    if videos.is_empty() {
        warn!("no videos found up to the cutoff, nothing written");
        return Ok(());
    }
    report::write_video_csv(&output, &videos)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(path = %output.display(), videos = videos.len(), "video report written");
    Ok(())
}

fn sites_to_audit(config: &AppConfig, sites: Vec<String>) -> Result<Vec<String>> {
    let sites = if sites.is_empty() {
        config.websites.clone()
    } else {
        sites
    };
    if sites.is_empty() {
        bail!("no sites to audit: pass --site or set WEBSITE_NAMES");
    }
    Ok(sites)
}

fn load_items(args: &PurgeArgs) -> Result<Vec<ContentItem>, AppError> {
    let items = if let Some(path) = &args.csv {
        report::read_csv(path)?
    } else if let Some(dir) = &args.csv_dir {
        report::read_csv_dir(dir)?
    } else if let Some(path) = &args.ids_file {
        report::read_ids_file(path)?
    } else {
        return Err(AppError::NoItems);
    };
    let items = report::dedupe(items);
    if items.is_empty() {
        return Err(AppError::NoItems);
    }
    Ok(items)
}

async fn run_purge(config: &AppConfig, args: PurgeArgs) -> Result<()> {
    let (client, governor) = connect(config)?;
    let items = load_items(&args)?;
    let options = RunOptions {
        limit: args.limit,
        concurrency: args.concurrency.unwrap_or(config.concurrency),
    };
    let total = match options.limit {
        0 => items.len(),
        n => n.min(items.len()),
    };
    info!(
        items = items.len(),
        to_process = total,
        delete = args.delete,
        concurrency = options.concurrency,
        "purge starting"
    );

    let engine = TransitionEngine::new(&client, &governor, args.delete);
    let coordinator = RunCoordinator::new(engine, options);
    let progress = RunProgress::start(total as u64, args.delete);
    let summary = coordinator
        .run_with_observer(items, |report| progress.item_done(report))
        .await;
    progress.finish();

    report::write_outcomes_csv(&args.output, &summary.records)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(path = %args.output.display(), records = summary.records.len(), "outcomes written");
    if let Some(path) = &args.summary_json {
        report::write_summary_json(path, &summary)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    ui::print_summary(&summary);
    if let Some(reason) = &summary.halted {
        bail!("run halted: {reason}");
    }
    Ok(())
}

async fn run_verify(config: &AppConfig, csv: &Path, site: &str, sample: usize) -> Result<()> {
    let items = report::read_csv(csv)?;
    if items.is_empty() {
        warn!(file = %csv.display(), "report has no stories");
        return Ok(());
    }
    let (client, governor) = connect(config)?;
    let auditor = Auditor::new(&client, &governor, config.page_size, config.max_result_window);

    for item in items.iter().take(sample) {
        match auditor.lookup(site, &item.id).await {
            Ok(story) => ui::print_lookup(&item.id, story.as_ref()),
            Err(err) if err.kind() == ErrorKind::Authentication => return Err(err.into()),
            Err(err) => warn!(story = %item.id, error = %err, "lookup failed"),
        }
    }
    Ok(())
}
