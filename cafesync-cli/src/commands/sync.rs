use anyhow::Context as _;
use clap::Args;
use tracing::info;

use cafesync_core::pipeline::{FetchOutcome, fetch_or_cached, plan_sync, run_sync};
use cafesync_core::sync::{SyncReport, Synchronizer};

use super::Context;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Process at most N new posts this run
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only report how many posts would be processed
    #[arg(long)]
    pub dry_run: bool,

    /// Use the cached posts snapshot instead of fetching
    #[arg(long)]
    pub offline: bool,
}

pub async fn run(args: SyncArgs, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.store();

    // Resolve both stages before any fetch or write so a missing key fails early.
    let stages = if args.dry_run {
        None
    } else {
        Some((ctx.extractor()?, ctx.geocoder()))
    };

    let fetched = if args.offline {
        FetchOutcome {
            records: store.load_posts().context("Cannot load posts snapshot")?,
            from_cache: true,
        }
    } else {
        let source = ctx.source()?;
        let fetched = fetch_or_cached(&source, &store)
            .await
            .context("Fetch failed")?;
        if !fetched.from_cache && !args.dry_run {
            store
                .save_posts(&fetched.records)
                .context("Cannot save posts snapshot")?;
        }
        fetched
    };
    if fetched.from_cache {
        info!(count = fetched.records.len(), "Working from cached snapshot");
    }

    let Some((extractor, geocoder)) = stages else {
        let report = plan_sync(&fetched.records, &store).context("Cannot load store set")?;
        print_plan(&report);
        return Ok(());
    };

    let progress = ctx.progress();
    let synchronizer =
        Synchronizer::new(&extractor, &geocoder, progress.as_ref()).with_limit(args.limit);

    let report = run_sync(&fetched.records, &store, &synchronizer)
        .await
        .context("Sync failed")?;
    print_report(&report);
    Ok(())
}

fn print_plan(report: &SyncReport) {
    println!("Dry run: nothing was extracted, geocoded or written");
    println!();
    println!("  Fetched posts:     {}", report.fetched);
    println!("  Stored cafés:      {}", report.existing);
    println!("  Skipped ids:       {}", report.previously_skipped);
    println!("  Would process:     {}", report.candidates);
}

fn print_report(report: &SyncReport) {
    println!("Sync complete");
    println!();
    println!("  Fetched posts:     {}", report.fetched);
    println!("  New candidates:    {}", report.candidates);
    println!("  Processed:         {}", report.processed);
    println!("  Added:             {}", report.added);
    println!("  Skipped:           {}", report.newly_skipped);
    for (reason, count) in &report.skip_reasons {
        println!("    {reason:<20} {count:>6}");
    }
    if report.deferred > 0 {
        println!("  Deferred:          {} (limit reached)", report.deferred);
    }
    println!("  Stores total:      {}", report.existing + report.added);
    println!("  Duration:          {:.2?}", report.duration);

    let llm = &report.llm;
    if llm.total_requests > 0 || llm.failed_requests > 0 {
        println!();
        println!(
            "  LLM: {} requests ({} failed, {} malformed), {} in / {} out tokens, ~${:.4}",
            llm.total_requests,
            llm.failed_requests,
            llm.malformed_responses,
            llm.total_input_tokens,
            llm.total_output_tokens,
            llm.estimated_cost_usd
        );
    }
}
