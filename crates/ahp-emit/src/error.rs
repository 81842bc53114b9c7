use ahp_core::AhpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error(transparent)]
    Graph(#[from] AhpError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("rank {rank} requested but {reason}")]
    RankFilter { rank: u32, reason: String },

    #[error("host rejected {what}: {reason}")]
    Host { what: String, reason: String },
}

pub type EmitResult<T> = Result<T, EmitError>;
