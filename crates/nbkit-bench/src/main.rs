//! nbkit benchmark runner.
//!
//! Run one entry of a benchmark matrix:
//! ```sh
//! nbkit-bench -m bench.toml --info
//! nbkit-bench -m bench.toml 3 --py 3.6 --tag v0.3.1
//! ```

use std::io;

use anyhow::Context;
use clap::Parser;

use nbkit_bench::{load_matrix, BenchCli};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = BenchCli::parse();

    let runner = load_matrix(&cli.matrix)
        .and_then(|m| m.into_runner())
        .with_context(|| format!("loading {}", cli.matrix.display()))?;
    log::debug!(
        "{} command(s) registered from {}",
        runner.registry().len(),
        cli.matrix.display()
    );

    let code = runner.execute(&cli.exec, &mut io::stdout())?;
    std::process::exit(code);
}
