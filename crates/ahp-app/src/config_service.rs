//! Configuration loading and command-line overrides.

use std::path::Path;

use ahp_emit::{EmitMode, StructuredFormat};
use ahp_partition::StrategyKind;
use ahp_project::{PipelineConfig, validate_config};

use crate::error::AppResult;

/// Values given on the command line. Each one set replaces the file's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub strategy: Option<StrategyKind>,
    pub rank_count: Option<u32>,
    pub threads_per_rank: Option<u32>,
    pub emit_mode: Option<EmitMode>,
    pub structured_format: Option<StructuredFormat>,
    pub rank: Option<u32>,
    pub partial_expand: Option<bool>,
    pub ports: Option<bool>,
    pub flat: Option<bool>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(s) = self.strategy {
            config.strategy = s;
        }
        if let Some(n) = self.rank_count {
            config.rank_count = n;
        }
        if let Some(t) = self.threads_per_rank {
            config.threads_per_rank = Some(t);
        }
        if let Some(m) = self.emit_mode {
            config.emit_mode = m;
        }
        if let Some(f) = self.structured_format {
            config.structured_format = f;
        }
        if let Some(r) = self.rank {
            config.rank = Some(r);
        }
        if let Some(p) = self.partial_expand {
            config.partial_expand = p;
        }
        if let Some(p) = self.ports {
            config.dot.ports = p;
        }
        if let Some(flat) = self.flat {
            config.dot.hierarchy = !flat;
        }
    }
}

/// Read the configuration file if one is given, apply overrides and validate
/// the result.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> AppResult<PipelineConfig> {
    let mut config = match path {
        Some(path) => ahp_project::load(path)?,
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut config);
    validate_config(&config)?;
    Ok(config)
}
