//! Host adapters for a flattened device graph.
//!
//! Three outputs are supported:
//! - [`dot`]: graphviz text, flat or one file per assembly category
//! - [`model`]: the structured host model (JSON or YAML), optionally filtered to one rank
//! - [`host`]: construction calls replayed against an in-process [`HostApi`]
//!
//! ```
//! use ahp_emit::{ModelOptions, StructuredFormat, build_model, render_model};
//! use ahp_graph::{Device, DeviceGraph, PortSpec, flatten};
//!
//! let mut g = DeviceGraph::new();
//! g.add_device(Device::component("ping", "pingpong.Ping").with_port(PortSpec::single("out")))
//!     .unwrap();
//! g.add_device(Device::component("pong", "pingpong.Pong").with_port(PortSpec::single("in")))
//!     .unwrap();
//! g.link("ping", "out", "pong", "in").unwrap();
//!
//! let flat = flatten(&g).unwrap();
//! let model = build_model(&flat, &ModelOptions::default(), None).unwrap();
//! assert_eq!(model.links[0].name, "ping.out__1ps__pong.in");
//! let json = render_model(&model, StructuredFormat::Json).unwrap();
//! assert!(json.contains("\"pingpong.Ping\""));
//! ```

pub mod digest;
pub mod dot;
pub mod error;
pub mod host;
pub mod mode;
pub mod model;

pub use digest::digest;
pub use dot::{DotFile, DotOptions, HIGHLIGHT_STYLE, STYLESHEET_FILE, flat_dot, hierarchy_dot};
pub use error::{EmitError, EmitResult};
pub use host::{BuildSummary, HostApi, HostCall, HostEndpoint, RecordingHost, build_in_process, replay};
pub use mode::{EmitMode, StructuredFormat};
pub use model::{
    ComponentRecord, HostModel, LinkEndRecord, LinkRecord, ModelOptions, Params,
    SubComponentRecord, build_model, rank_file_name, render_model,
};
