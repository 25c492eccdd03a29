use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use minisites::{cleanup::prune_uploads, db::DBService, seed::seed, upload::LocalFsUploader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Maintenance tasks for the minisites database")]
struct Args {
    #[arg(long, default_value = "./minisites.sqlite")]
    sqlite_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply the pending migrations
    Migrate,
    /// Insert or refresh the sample travel data
    Seed,
    /// Delete uploaded files no row refers to anymore
    PruneUploads {
        #[arg(long, default_value = "./static/uploads")]
        upload_dir: String,

        /// Files modified more recently than this are kept
        #[arg(long, default_value_t = 60)]
        min_age_minutes: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tokio::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&args.sqlite_path)
        .await
        .with_context(|| format!("cannot open database file {}", args.sqlite_path))?;

    let db = DBService::new(&args.sqlite_path)
        .await
        .context("cannot connect to the database")?;
    db.migrate().await.context("cannot apply migrations")?;

    match args.command {
        Command::Migrate => {
            tracing::info!("Database at {} is up to date", args.sqlite_path);
        }
        Command::Seed => {
            let report = seed(&db).await.context("cannot seed the database")?;
            println!(
                "{} regions, {} products, {} landmarks, {} terrains",
                report.regions, report.products, report.landmarks, report.terrains
            );
        }
        Command::PruneUploads {
            upload_dir,
            min_age_minutes,
        } => {
            let uploads = LocalFsUploader::new(&upload_dir);
            let min_age = Duration::from_secs(min_age_minutes.saturating_mul(60));
            let pruned = prune_uploads(&db, &uploads, min_age)
                .await
                .with_context(|| format!("cannot prune {upload_dir}"))?;
            for file in &pruned {
                println!("deleted {}", file.public_path());
            }
        }
    }

    db.close().await;
    Ok(())
}
