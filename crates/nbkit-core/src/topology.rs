//! Process-group topology and rank-gated console output.
//!
//! Every member of a distributed job runs the same binary with the same
//! arguments. The launcher (Open MPI, MPICH/PMI, Slurm) tells each process
//! its rank through the environment; rank 0 is the **primary** and is the
//! only process allowed to produce user-facing output. All other ranks are
//! **suppressed**: they walk through identical control flow but every write
//! to the [`Console`] is discarded.
//!
//! The role is decided once at start-up and passed explicitly to whoever
//! needs to print, rather than being consulted from ambient global state.

use std::io::{self, Write};

/// Environment variables carrying the rank, in lookup order.
const RANK_VARS: &[&str] = &[
    "OMPI_COMM_WORLD_RANK",
    "PMI_RANK",
    "PMIX_RANK",
    "MV2_COMM_WORLD_RANK",
    "SLURM_PROCID",
];

/// Environment variables carrying the group size, in lookup order.
const SIZE_VARS: &[&str] = &[
    "OMPI_COMM_WORLD_SIZE",
    "PMI_SIZE",
    "MV2_COMM_WORLD_SIZE",
    "SLURM_NTASKS",
];

const HOST_VARS: &[&str] = &["HOSTNAME", "SLURMD_NODENAME", "HOST"];

/// Output role of this process within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Rank 0: prints help, listings and diagnostics.
    Primary,
    /// Any other rank: identical control flow, no user-facing output.
    Suppressed,
}

impl Role {
    pub fn is_primary(self) -> bool {
        matches!(self, Role::Primary)
    }
}

/// Rank, size and processor name of the current process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTopology {
    /// Rank of the local process (0-based).
    pub rank: usize,
    /// Total number of processes in the group.
    pub size: usize,
    /// Name of the node this process runs on.
    pub processor_name: String,
}

impl Default for GroupTopology {
    fn default() -> Self {
        Self::single()
    }
}

impl GroupTopology {
    /// A one-process group, used when no launcher is detected.
    pub fn single() -> Self {
        Self {
            rank: 0,
            size: 1,
            processor_name: "localhost".into(),
        }
    }

    /// Detect the topology from the launcher's environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Detect the topology through an arbitrary variable lookup.
    ///
    /// Unparseable values are ignored. A rank that is not smaller than the
    /// detected size widens the size to `rank + 1`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_usize = |vars: &[&str]| {
            vars.iter()
                .filter_map(|v| lookup(v))
                .find_map(|s| s.trim().parse::<usize>().ok())
        };

        let rank = first_usize(RANK_VARS).unwrap_or(0);
        let size = first_usize(SIZE_VARS).unwrap_or(1).max(rank + 1);
        let processor_name = HOST_VARS
            .iter()
            .filter_map(|v| lookup(v))
            .find(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "localhost".into());

        Self {
            rank,
            size,
            processor_name,
        }
    }

    /// Output role derived from the rank.
    pub fn role(&self) -> Role {
        if self.rank == 0 {
            Role::Primary
        } else {
            Role::Suppressed
        }
    }
}

/// User-facing output sink gated on a [`Role`].
///
/// Writes on a suppressed rank succeed without producing any bytes.
pub struct Console<'a> {
    role: Role,
    out: Box<dyn Write + 'a>,
    err: Box<dyn Write + 'a>,
}

impl<'a> Console<'a> {
    pub fn new(role: Role, out: Box<dyn Write + 'a>, err: Box<dyn Write + 'a>) -> Self {
        Self { role, out, err }
    }

    /// Console bound to the process's stdout and stderr.
    pub fn stdio(role: Role) -> Console<'static> {
        Console::new(role, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Print a line to standard output (primary only).
    pub fn println(&mut self, text: &str) -> io::Result<()> {
        if !self.role.is_primary() {
            return Ok(());
        }
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }

    /// Print raw text to standard error (primary only).
    pub fn eprint(&mut self, text: &str) -> io::Result<()> {
        if !self.role.is_primary() {
            return Ok(());
        }
        write!(self.err, "{}", text)?;
        self.err.flush()
    }
}
