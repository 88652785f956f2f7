use anyhow::Context;

use nbkit_cli::{dispatch, logging, Outcome};
use nbkit_core::{Console, GroupTopology, Registry};

fn main() -> anyhow::Result<()> {
    let topology = GroupTopology::from_env();
    logging::init(&topology);

    let mut registry = Registry::with_builtins();
    let mut console = Console::stdio(topology.role());

    let outcome = dispatch(std::env::args_os(), &mut registry, &topology, &mut console)
        .with_context(|| format!("rank {} of {} failed", topology.rank, topology.size))?;
    match outcome {
        Outcome::Exit(code) => std::process::exit(code),
        Outcome::Completed { output } => {
            log::info!("results saved to {}", output);
            Ok(())
        }
    }
}
