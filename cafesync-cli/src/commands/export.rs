use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;

use cafesync_core::pipeline::run_export;

use super::Context;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory (default: the data directory)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// File name stem; writes <stem>_all.csv and <stem>_with_coords.csv
    #[arg(long)]
    pub stem: Option<String>,
}

pub fn run(args: ExportArgs, ctx: &Context) -> anyhow::Result<()> {
    let paths = &ctx.config.paths;
    let dir = args.out_dir.unwrap_or_else(|| paths.data_dir.clone());
    let stem = args.stem.unwrap_or_else(|| paths.export_stem.clone());

    let report = run_export(&ctx.store(), &dir, &stem).context("CSV export failed")?;

    println!("Exported {} stores", report.total);
    println!();
    println!("  All:               {}", report.all_path.display());
    println!(
        "  With coordinates:  {} ({} rows)",
        report.with_coords_path.display(),
        report.with_coords
    );
    println!("  Success rate:      {:.1}%", report.success_rate());
    Ok(())
}
