//! ahp-graph: attributed hierarchical port graphs and their lowering.
//!
//! Provides:
//! - The device model (Port, Device, Component/Assembly)
//! - `DeviceGraph`, one level of hierarchy with fail-fast validation
//! - The flattener, which expands assemblies into a `FlatGraph` of components
//!
//! # Example
//!
//! ```
//! use ahp_graph::{Device, DeviceGraph, PortSpec, flatten};
//!
//! let leaf = |name: &str| {
//!     Device::component(name, "Leaf")
//!         .with_port(PortSpec::single("in"))
//!         .with_port(PortSpec::single("out"))
//! };
//!
//! let mut root = DeviceGraph::new();
//! root.add_device(Device::assembly("Pair0", "Pair", move |_| {
//!     let mut g = DeviceGraph::new();
//!     g.add_device(leaf("Left"))?;
//!     g.add_device(leaf("Right"))?;
//!     g.link("Left", "out", "Right", "in")?;
//!     Ok(g)
//! })).unwrap();
//!
//! let flat = flatten(&root).unwrap();
//! assert!(flat.find("Pair0.Left").is_some());
//! assert_eq!(flat.links().len(), 1);
//! ```

pub mod device;
pub mod flat;
pub mod flatten;
pub mod graph;
pub mod port;
pub mod validate;

// Re-exports for ergonomics
pub use device::{Assembly, BuilderFn, Device, DeviceKind, SubComponent};
pub use flat::{
    FlatComponent, FlatEndpoint, FlatGraph, FlatLink, HierarchyItem, HierarchyNode,
    PartitionState,
};
pub use flatten::{Flattener, flatten, flatten_rank};
pub use graph::{DeviceGraph, Forward, Link, LinkAttrs, LinkDirection, LinkEnd};
pub use port::{DEFAULT_SLOT_FORMAT, PortCapacity, PortRef, PortSpec};
pub use validate::GraphWarning;
