use thiserror::Error;

use crate::name::qualify;

pub type AhpResult<T> = Result<T, AhpError>;

/// Structural errors raised while building, lowering, partitioning or emitting a graph.
///
/// Every variant names the offending device by its hierarchical path. Errors raised
/// inside an assembly's builder only know the local name; the flattener calls
/// [`AhpError::within`] on the way out so the caller sees the full path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AhpError {
    #[error("Duplicate device name: {path}")]
    DuplicateName { path: String },

    #[error("Unknown device: {path}")]
    UnknownDevice { path: String },

    #[error("Unknown port {port} on {path}")]
    UnknownPort { path: String, port: String },

    #[error("Port capacity exceeded on {path}.{port}: {reason}")]
    PortCapacity {
        path: String,
        port: String,
        reason: String,
    },

    #[error("Port type mismatch: {a} ({a_type}) <-> {b} ({b_type})")]
    PortTypeMismatch {
        a: String,
        a_type: String,
        b: String,
        b_type: String,
    },

    #[error("Unresolved port {port} on assembly {path}: {reason}")]
    UnresolvedPort {
        path: String,
        port: String,
        reason: String,
    },

    #[error("Port {port} of assembly {path} is forwarded more than once")]
    DuplicateForward { path: String, port: String },

    #[error("Cyclic assembly at {path}: {identity} is already being expanded")]
    CyclicAssembly { path: String, identity: String },

    #[error("Device {path} has a model and also a 'model' attribute")]
    ConflictingModel { path: String },

    #[error("Invalid subcomponent {path}: {reason}")]
    InvalidSubComponent { path: String, reason: String },

    #[error("Partition rank {rank} of {path} is outside 0..{rank_count}")]
    PartitionOutOfRange {
        path: String,
        rank: u32,
        rank_count: u32,
    },

    #[error("No partition for device: {path}")]
    PartitionRequired { path: String },

    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error("Builder for assembly {path} failed: {reason}")]
    Builder { path: String, reason: String },

    #[error("Internal invariant violated: {what}")]
    InternalInvariant { what: String },
}

impl AhpError {
    /// Re-root the device path(s) of this error under `prefix`.
    pub fn within(self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        let q = |path: String| qualify(prefix, &path);
        match self {
            AhpError::DuplicateName { path } => AhpError::DuplicateName { path: q(path) },
            AhpError::UnknownDevice { path } => AhpError::UnknownDevice { path: q(path) },
            AhpError::UnknownPort { path, port } => AhpError::UnknownPort {
                path: q(path),
                port,
            },
            AhpError::PortCapacity { path, port, reason } => AhpError::PortCapacity {
                path: q(path),
                port,
                reason,
            },
            AhpError::PortTypeMismatch {
                a,
                a_type,
                b,
                b_type,
            } => AhpError::PortTypeMismatch {
                a: q(a),
                a_type,
                b: q(b),
                b_type,
            },
            AhpError::UnresolvedPort { path, port, reason } => AhpError::UnresolvedPort {
                path: q(path),
                port,
                reason,
            },
            AhpError::DuplicateForward { path, port } => AhpError::DuplicateForward {
                path: q(path),
                port,
            },
            AhpError::CyclicAssembly { path, identity } => AhpError::CyclicAssembly {
                path: q(path),
                identity,
            },
            AhpError::ConflictingModel { path } => AhpError::ConflictingModel { path: q(path) },
            AhpError::InvalidSubComponent { path, reason } => AhpError::InvalidSubComponent {
                path: q(path),
                reason,
            },
            AhpError::PartitionOutOfRange {
                path,
                rank,
                rank_count,
            } => AhpError::PartitionOutOfRange {
                path: q(path),
                rank,
                rank_count,
            },
            AhpError::PartitionRequired { path } => AhpError::PartitionRequired { path: q(path) },
            AhpError::Builder { path, reason } => AhpError::Builder {
                path: q(path),
                reason,
            },
            other @ (AhpError::InvalidConfig { .. } | AhpError::InternalInvariant { .. }) => {
                other
            }
        }
    }

    /// Shorthand for an internal invariant violation.
    pub fn invariant(what: impl Into<String>) -> Self {
        AhpError::InternalInvariant { what: what.into() }
    }
}
