//! Port declarations and references.

use core::fmt;

/// How many links a port accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortCapacity {
    /// Exactly one link; the port carries no slot number.
    Single,
    /// Numbered slots, one link each. `limit: None` is unbounded.
    Multi { limit: Option<u32> },
}

/// A named connection point declared on a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortSpec {
    pub name: String,
    /// Ports with a declared type only link to ports of the same type.
    pub port_type: Option<String>,
    pub capacity: PortCapacity,
    /// Unlinked required ports are reported separately by validation.
    pub required: bool,
    /// Slot rendering: `#` is replaced by the slot number and appended to the name.
    pub format: String,
}

pub const DEFAULT_SLOT_FORMAT: &str = ".p#";

impl PortSpec {
    fn with_capacity(name: impl Into<String>, capacity: PortCapacity) -> Self {
        Self {
            name: name.into(),
            port_type: None,
            capacity,
            required: false,
            format: DEFAULT_SLOT_FORMAT.to_string(),
        }
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self::with_capacity(name, PortCapacity::Single)
    }

    pub fn multi(name: impl Into<String>) -> Self {
        Self::with_capacity(name, PortCapacity::Multi { limit: None })
    }

    pub fn bounded(name: impl Into<String>, limit: u32) -> Self {
        Self::with_capacity(name, PortCapacity::Multi { limit: Some(limit) })
    }

    pub fn typed(mut self, port_type: impl Into<String>) -> Self {
        self.port_type = Some(port_type.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn is_single(&self) -> bool {
        matches!(self.capacity, PortCapacity::Single)
    }

    pub fn limit(&self) -> Option<u32> {
        match self.capacity {
            PortCapacity::Single => Some(1),
            PortCapacity::Multi { limit } => limit,
        }
    }

    /// The host-facing name of a slot on this port.
    ///
    /// `data` with format `.p#` and slot 3 renders as `data.p3`; a format of `(#)`
    /// renders `data(3)`.
    pub fn slot_name(&self, slot: Option<u32>) -> String {
        match slot {
            None => self.name.clone(),
            Some(n) => match self.format.split_once('#') {
                Some((pre, post)) => format!("{}{pre}{n}{post}", self.name),
                None => format!("{}{}{n}", self.name, self.format),
            },
        }
    }
}

/// A port (and slot, for multi ports) on some device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub name: String,
    pub slot: Option<u32>,
}

impl PortRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: None,
        }
    }

    pub fn slot(name: impl Into<String>, slot: u32) -> Self {
        Self {
            name: name.into(),
            slot: Some(slot),
        }
    }
}

impl From<&str> for PortRef {
    fn from(name: &str) -> Self {
        PortRef::new(name)
    }
}

impl From<String> for PortRef {
    fn from(name: String) -> Self {
        PortRef::new(name)
    }
}

impl From<(&str, u32)> for PortRef {
    fn from((name, slot): (&str, u32)) -> Self {
        PortRef::slot(name, slot)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            None => write!(f, "{}", self.name),
            Some(n) => write!(f, "{}[{n}]", self.name),
        }
    }
}
