use anyhow::Context as _;
use clap::Args;

use cafesync_core::pipeline::fetch_snapshot;

use super::Context;

#[derive(Args, Debug)]
pub struct FetchArgs {}

pub async fn run(_args: FetchArgs, ctx: &Context) -> anyhow::Result<()> {
    let source = ctx.source()?;
    let store = ctx.store();
    let count = fetch_snapshot(&source, &store)
        .await
        .context("Fetch failed")?;

    println!("Fetched {count} posts into {}", store.posts_path().display());
    Ok(())
}
