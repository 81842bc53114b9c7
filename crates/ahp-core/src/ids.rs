use core::fmt;
use core::num::NonZeroU32;

use crate::error::{AhpError, AhpResult};

/// Position of a device, component or link in its owning table.
///
/// Stored off by one so that `Option<Id>` stays four bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Id of the entry at `index`; `None` past the last representable entry.
    pub fn from_index(index: u32) -> Option<Self> {
        index.checked_add(1).and_then(NonZeroU32::new).map(Self)
    }

    /// Id of a table position; `None` when the table has outgrown `u32`.
    pub fn from_usize(index: usize) -> Option<Self> {
        u32::try_from(index).ok().and_then(Self::from_index)
    }

    /// Id of position `index` in `table`, or an invariant error past `u32`.
    pub fn checked(index: usize, table: &str) -> AhpResult<Self> {
        Self::from_usize(index)
            .ok_or_else(|| AhpError::invariant(format!("{table} table overflows at {index} entries")))
    }

    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    /// `index()` widened for slice access.
    pub fn slot(self) -> usize {
        self.index() as usize
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Device within one `DeviceGraph` scope.
pub type DeviceId = Id;
/// Component within a `FlatGraph`.
pub type FlatId = Id;
pub type LinkId = Id;
