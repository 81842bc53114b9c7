//! Configuration validation logic.

use ahp_emit::EmitMode;
use ahp_partition::StrategyKind;

use crate::schema::{LATEST_VERSION, PipelineConfig};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported feature: {feature} - {reason}")]
    Unsupported { feature: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_config(config: &PipelineConfig) -> Result<(), ValidationError> {
    if config.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: config.version,
        });
    }
    if config.rank_count == 0 {
        return Err(invalid("rank_count", 0, "must be positive"));
    }
    if config.threads_per_rank == Some(0) {
        return Err(invalid("threads_per_rank", 0, "must be positive"));
    }
    if let Some(f) = config.split_factor {
        if !f.is_finite() || f < 1.0 {
            return Err(invalid("split_factor", f, "must be a finite value >= 1"));
        }
    }
    if config.default_latency.trim().is_empty() {
        return Err(invalid("default_latency", "", "must not be empty"));
    }

    if config.partial_expand && config.rank.is_none() {
        return Err(ValidationError::Unsupported {
            feature: "partial_expand".to_string(),
            reason: "needs a rank to expand for".to_string(),
        });
    }

    if let Some(rank) = config.rank {
        if rank >= config.rank_count {
            return Err(invalid("rank", rank, "must be below rank_count"));
        }
        if config.strategy == StrategyKind::Deferred {
            return Err(ValidationError::Unsupported {
                feature: "rank".to_string(),
                reason: "per-rank output needs the hierarchy-aware strategy".to_string(),
            });
        }
        if config.emit_mode == EmitMode::Text {
            return Err(ValidationError::Unsupported {
                feature: "rank".to_string(),
                reason: "text output always draws the whole graph".to_string(),
            });
        }
    }

    Ok(())
}
