use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use drover_engine::{ExecContext, ProcessLauncher, run_plan};

/// Walk a declarative test plan against a scriptable browser target.
#[derive(Parser, Debug)]
#[command(name = "drover", version)]
struct Args {
    /// Path to the target browser executable.
    #[arg(short, long, value_name = "PATH")]
    target: PathBuf,

    /// Path to the plan document (YAML, or JSON by extension).
    #[arg(short, long, value_name = "PATH")]
    plan: PathBuf,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let plan = drover_engine::load_plan(&args.plan)?;
    info!(group = %plan.group, title = %plan.title, steps = plan.steps.len(), "loaded test plan");

    let mut ctx = ExecContext::new(&args.target);
    run_plan(&plan, &mut ctx, &ProcessLauncher).with_context(|| format!("plan '{}' failed", plan.title))?;

    info!(title = %plan.title, "test plan passed");
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
