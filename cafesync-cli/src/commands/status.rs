use anyhow::Context as _;
use clap::Args;

use cafesync_core::pipeline::status;

use super::Context;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Exit with an error if an id is both stored and skipped
    #[arg(long)]
    pub check: bool,
}

pub fn run(args: StatusArgs, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.store();
    let report = status(&store).context("Cannot read data files")?;

    println!("cafesync status for {}", ctx.config.paths.data_dir.display());
    println!();
    match report.posts {
        Some(posts) => println!("  Posts (snapshot):  {posts}"),
        None => println!("  Posts (snapshot):  none fetched yet"),
    }
    println!("  Stored cafés:      {}", report.stores);
    println!("  Skipped ids:       {}", report.skipped);
    println!("  Pending:           {}", report.pending);

    if report.is_consistent() {
        println!("  Consistency:       ok");
    } else {
        println!(
            "  Consistency:       {} ids both stored and skipped",
            report.overlap.len()
        );
        for id in &report.overlap {
            println!("    - {id}");
        }
        if args.check {
            anyhow::bail!("{} ids are both stored and skipped", report.overlap.len());
        }
    }
    Ok(())
}
