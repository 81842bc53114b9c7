use core::fmt;

/// Placement of a component for distributed execution: an MPI-style rank and a
/// thread within that rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Partition {
    pub rank: u32,
    pub thread: u32,
}

impl Partition {
    pub fn new(rank: u32, thread: u32) -> Self {
        Self { rank, thread }
    }

    /// Rank only, thread 0.
    pub fn rank(rank: u32) -> Self {
        Self { rank, thread: 0 }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rank, self.thread)
    }
}
