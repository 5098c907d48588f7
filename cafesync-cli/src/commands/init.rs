use anyhow::Context as _;
use clap::Args;

use cafesync_core::config::CafeConfig;
use cafesync_core::types::SkipSet;

use super::Context;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, ctx: &Context) -> anyhow::Result<()> {
    if ctx.config_path.exists() && !args.force {
        println!(
            "{} already exists, leaving it alone (use --force to overwrite)",
            ctx.config_path.display()
        );
    } else {
        let text = CafeConfig::default()
            .to_toml()
            .context("Cannot render default config")?;
        std::fs::write(&ctx.config_path, text)
            .with_context(|| format!("Cannot write config: {}", ctx.config_path.display()))?;
        println!("Wrote {}", ctx.config_path.display());
    }

    // Empty data files so the first sync has something to diff against.
    let store = ctx.store();
    if !store.stores_path().exists() {
        store
            .save_stores(&[])
            .context("Cannot create store file")?;
        println!("Created {}", store.stores_path().display());
    }
    if !store.skipped_path().exists() {
        store
            .save_skipped(&SkipSet::new())
            .context("Cannot create skip file")?;
        println!("Created {}", store.skipped_path().display());
    }

    println!();
    println!(
        "Set {} and {} (or a .env file) before running `cafesync sync`.",
        ctx.config.source.access_token_env, ctx.config.llm.api_key_env
    );
    Ok(())
}
