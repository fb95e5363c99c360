//! CLI entry point for folio-gc: one-shot orphaned media collection.
//!
//! Runs a single reconcile pass against the stores named in the config
//! file and prints the report as JSON on stdout.

use clap::Parser;
use std::path::PathBuf;

use folio::reconcile::Reconciler;

#[derive(Parser)]
#[command(name = "folio-gc", about = "Remove media objects no document references")]
struct Cli {
    #[arg(long, default_value = "folio.example.yaml")]
    config: PathBuf,
    /// Report what would be removed without removing anything.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Override `reconcile.grace_seconds`.
    #[arg(long)]
    grace_seconds: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let rc = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(rc);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = folio::config::load_config(&cli.config)?;
    folio::init_tracing(&config.logging);

    let metadata = folio::metadata::open(&config.metadata)?;
    let media = folio::storage::open(&config.storage).await?;
    let grace = cli.grace_seconds.unwrap_or(config.reconcile.grace_seconds);

    let report = Reconciler::new(metadata, media, grace)
        .run_once(cli.dry_run)
        .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if cli.dry_run && !report.removed.is_empty() {
        eprintln!(
            "dry run: {} object(s) would be removed",
            report.removed.len()
        );
    }
    Ok(())
}
