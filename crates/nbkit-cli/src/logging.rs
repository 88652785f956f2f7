//! Log records prefixed with the rank and node that produced them.

use std::io::Write;

use env_logger::Env;
use nbkit_core::GroupTopology;

/// `rank R on HOST:` prefix identifying the emitting process.
pub fn record_prefix(topology: &GroupTopology) -> String {
    format!("rank {} on {}:", topology.rank, topology.processor_name)
}

/// Install the global logger. The default filter is `info`; `RUST_LOG`
/// overrides it.
pub fn init(topology: &GroupTopology) {
    let prefix = record_prefix(topology);
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            writeln!(
                buf,
                "{} {} {:<15} {:<8} {}",
                prefix,
                buf.timestamp(),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_prefix() {
        let topology = GroupTopology {
            rank: 3,
            size: 4,
            processor_name: "nid00042".into(),
        };
        assert_eq!(record_prefix(&topology), "rank 3 on nid00042:");
        assert_eq!(record_prefix(&GroupTopology::single()), "rank 0 on localhost:");
    }
}
