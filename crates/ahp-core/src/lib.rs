//! ahp-core: shared foundation for attributed hierarchical port graphs.
//!
//! Contains:
//! - ids (compact indices for devices and links)
//! - error (the structural error taxonomy shared by every pass)
//! - name (hierarchical, dot-separated device names)
//! - value (opaque attribute values carried by devices)
//! - partition (rank/thread placement)

pub mod error;
pub mod ids;
pub mod name;
pub mod partition;
pub mod value;

pub use error::{AhpError, AhpResult};
pub use ids::*;
pub use name::{NamePrefix, SEPARATOR, qualify};
pub use partition::Partition;
pub use value::{AttrValue, Attributes, canonical_form};
