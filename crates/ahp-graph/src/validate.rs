//! Non-fatal structural checks.

use std::collections::VecDeque;
use std::fmt;

use crate::port::PortSpec;

/// Something worth reporting that does not stop a pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphWarning {
    /// An optional port with nothing attached.
    UnlinkedPort { path: String, port: String },
    /// A port declared as required with nothing attached.
    UnlinkedRequiredPort { path: String, port: String },
    /// No path of links from any entry point reaches this device.
    Unreachable { path: String },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::UnlinkedPort { path, port } => {
                write!(f, "Port {port} on {path} is not linked")
            }
            GraphWarning::UnlinkedRequiredPort { path, port } => {
                write!(f, "Required port {port} on {path} is not linked")
            }
            GraphWarning::Unreachable { path } => {
                write!(f, "Device {path} is unreachable from every entry point")
            }
        }
    }
}

/// Ports with no link, in device then declaration order.
pub(crate) fn unlinked_ports<'a>(
    devices: impl Iterator<Item = (usize, &'a str, &'a [PortSpec])>,
    is_linked: impl Fn(usize, &str) -> bool,
) -> Vec<GraphWarning> {
    let mut warnings = Vec::new();
    for (i, path, ports) in devices {
        for port in ports {
            if is_linked(i, &port.name) {
                continue;
            }
            let required = port.required;
            let (path, port) = (path.to_string(), port.name.clone());
            warnings.push(if required {
                GraphWarning::UnlinkedRequiredPort { path, port }
            } else {
                GraphWarning::UnlinkedPort { path, port }
            });
        }
    }
    warnings
}

/// Indices of nodes not reachable from `entries`, treating every edge as undirected.
pub(crate) fn unreachable(
    count: usize,
    entries: impl Iterator<Item = usize>,
    edges: impl Iterator<Item = (usize, usize)>,
) -> Vec<usize> {
    let mut adjacency = vec![Vec::new(); count];
    for (a, b) in edges {
        if a < count && b < count {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
    }

    let mut seen = vec![false; count];
    let mut queue = VecDeque::new();
    for e in entries {
        if e < count && !seen[e] {
            seen[e] = true;
            queue.push_back(e);
        }
    }
    while let Some(n) = queue.pop_front() {
        for &m in &adjacency[n] {
            if !seen[m] {
                seen[m] = true;
                queue.push_back(m);
            }
        }
    }

    (0..count).filter(|&i| !seen[i]).collect()
}
