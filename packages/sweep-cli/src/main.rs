// Operator entry point: every subcommand is one maintenance pass over the
// configured site.

mod config;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cms_client::CmsClient;
use sweep_core::{
    default_inventory_path, purge_photos, run_batch, scan_to_file, sweep_sections, videos_report,
    BatchReport, CmsPhotos, CmsScan, Decirculate, DeleteCanonical, DeleteGalleries,
    DeletePromoImages, RecordAction, Throttle,
};

use config::Config;

/// Kinds of content a scan snapshots.
const SCAN_KINDS: &[&str] = &["story", "gallery", "video"];

#[derive(Parser)]
#[command(
    name = "sweep",
    version,
    about = "Scan a site's CMS content inventory and sweep it: decirculate, delete, report"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot the site's stories, galleries and videos into an inventory file
    Scan,
    /// Remove this site's circulation entry from records it does not canonically own
    Descirculate,
    /// Delete the stories this site canonically owns
    DeleteCanonical,
    /// Delete every gallery in the inventory
    DeleteGalleries,
    /// Delete the promo images referenced by the inventory
    DeleteImages,
    /// Page through the site's photo library and delete it
    DeletePhotos {
        /// Actually delete. Without this flag the run only writes a dry-run log.
        #[arg(long)]
        execute: bool,
    },
    /// Delete every section of the site, children before ancestors
    DeleteSections {
        /// Skip the safety countdown before the first delete
        #[arg(long)]
        yes: bool,
    },
    /// Delete the site itself; rejected while sections or content remain
    DeleteSite,
    /// Write a simplified report of the videos related to this site
    VideosReport,
    /// Fetch one photo's full metadata
    GetPhoto { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sweep_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(website = %config.website_id, "configuration loaded");
    let client = CmsClient::new(config.base_url.clone(), config.access_token.clone());
    let throttle = Throttle::default();

    match cli.command {
        Commands::Scan => {
            let source = CmsScan::new(client, config.website_id.clone(), SCAN_KINDS);
            let summary = scan_to_file(&source, &config.report_dir, &throttle).await?;
            if summary.complete {
                println!("{} {} records scanned", "✅".green(), summary.total);
            } else {
                println!(
                    "{} scan stopped early, {} records kept",
                    "⚠️".yellow(),
                    summary.total
                );
            }
            println!("📦 Inventory: {}", summary.path.display());
        }
        Commands::Descirculate => {
            let action = Decirculate::new(&client, config.website_id.clone());
            let report = batch(&config, &action, "descirculated", &throttle).await?;
            print_batch_summary("Decirculation", &report);
        }
        Commands::DeleteCanonical => {
            let action = DeleteCanonical::new(&client, config.website_id.clone());
            let report = batch(&config, &action, "deleted-canonical", &throttle).await?;
            print_batch_summary("Canonical deletion", &report);
        }
        Commands::DeleteGalleries => {
            let action = DeleteGalleries::new(&client);
            let report = batch(&config, &action, "deleted-galleries", &throttle).await?;
            print_batch_summary("Gallery deletion", &report);
        }
        Commands::DeleteImages => {
            let action = DeletePromoImages::new(&client);
            let report = batch(&config, &action, "deleted-images", &throttle).await?;
            print_batch_summary("Promo image deletion", &report);
        }
        Commands::DeletePhotos { execute } => {
            let source = CmsPhotos::new(client, config.website_id.clone());
            let summary = purge_photos(&source, &config.report_dir, execute, &throttle).await?;
            if summary.dry_run {
                println!(
                    "{} dry-run: {} photos would be deleted",
                    "🔍".cyan(),
                    summary.processed
                );
            } else {
                println!(
                    "{} {} photos deleted, {} failed",
                    "✅".green(),
                    summary.deleted,
                    summary.failed
                );
            }
            println!("📄 Log: {}", summary.log_path.display());
        }
        Commands::DeleteSections { yes } => {
            let countdown = if yes {
                None
            } else {
                println!(
                    "{}",
                    format!(
                        "⚠️  About to permanently delete ALL sections of {}. \
                         Starting in 10s, press Ctrl+C to abort.",
                        config.website_id
                    )
                    .red()
                    .bold()
                );
                Some(Duration::from_secs(10))
            };
            let report = sweep_sections(
                &client,
                &config.website_id,
                &config.report_dir,
                &throttle,
                countdown,
            )
            .await?;
            print_batch_summary("Section deletion", &report);
        }
        Commands::DeleteSite => {
            match sweep_core::delete_site(&client, &config.website_id).await {
                Ok(()) => println!("{} Site {} deleted", "✅".green(), config.website_id),
                Err(err) => {
                    println!(
                        "{}",
                        "ℹ️  Likely causes: sections, content or redirects still exist on the site"
                            .yellow()
                    );
                    return Err(err).context("site deletion rejected");
                }
            }
        }
        Commands::VideosReport => {
            let inventory = default_inventory_path(&config.report_dir);
            match videos_report(&inventory, &config.website_id, &config.report_dir)? {
                Some(report) => {
                    println!("{} {} videos found", "✅".green(), report.count);
                    println!("📄 Report: {}", report.path.display());
                }
                None => println!("ℹ️  No videos related to {}", config.website_id),
            }
        }
        Commands::GetPhoto { id } => {
            let photo = client.get_photo(&id).await?;
            println!("{}", serde_json::to_string_pretty(&photo)?);
        }
    }

    Ok(())
}

async fn batch(
    config: &Config,
    action: &dyn RecordAction,
    log_prefix: &str,
    throttle: &Throttle,
) -> Result<BatchReport> {
    let inventory = default_inventory_path(&config.report_dir);
    run_batch(&inventory, action, &config.report_dir, log_prefix, throttle)
        .await
        .with_context(|| format!("batch '{log_prefix}' failed"))
}

fn print_batch_summary(label: &str, report: &BatchReport) {
    println!();
    println!("{} {} finished", "✅".green(), label);
    println!("   processed:  {}", report.processed);
    println!("   {} {}", "succeeded:".green(), report.succeeded);
    println!("   {} {}", "failed:   ".red(), report.failed);
    if report.duplicated > 0 {
        println!("   duplicated: {}", report.duplicated);
    }
    println!("📄 Log: {}", report.log_path.display());
}
