use anyhow::Context as _;
use clap::Args;
use tracing::info;

use cafesync_core::pipeline::run_refresh;

use super::Context;

#[derive(Args, Debug)]
pub struct RefreshArgs {}

pub async fn run(_args: RefreshArgs, ctx: &Context) -> anyhow::Result<()> {
    info!("Media URL refresh started");
    let source = ctx.source()?;
    let store = ctx.store();
    let progress = ctx.progress();

    let outcome = run_refresh(&source, &store, progress.as_ref(), chrono::Local::now())
        .await
        .context("Media URL refresh failed")?;
    let report = &outcome.report;

    println!("Media URL refresh complete");
    println!();
    if outcome.from_cache {
        println!("  (fetch failed, used cached posts snapshot)");
    }
    println!("  Updated:           {}", report.updated);
    println!("  Unchanged:         {}", report.unchanged);
    println!("  Not found:         {}", report.not_found);
    if report.missing_id > 0 {
        println!("  Missing id:        {}", report.missing_id);
    }
    println!("  Total:             {}", report.total());
    if let Some(backup) = &outcome.backup {
        println!("  Backup:            {}", backup.display());
    }
    info!(
        updated = report.updated,
        not_found = report.not_found,
        "Media URL refresh finished"
    );
    Ok(())
}
