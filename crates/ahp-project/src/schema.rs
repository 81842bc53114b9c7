//! Pipeline configuration schema.

use std::collections::BTreeMap;

use ahp_emit::{DotOptions, EmitMode, ModelOptions, StructuredFormat};
use ahp_partition::{PartitionConfig, StrategyKind};
use serde::{Deserialize, Serialize};

pub const LATEST_VERSION: u32 = 1;

/// Everything between a built hierarchy and the files handed to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "latest_version")]
    pub version: u32,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default = "one")]
    pub rank_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads_per_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_factor: Option<f64>,
    #[serde(default)]
    pub emit_mode: EmitMode,
    #[serde(default)]
    pub structured_format: StructuredFormat,
    /// Emit only this rank's view; all ranks when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Expand only the assemblies `rank` owns or links to. Every top-level device
    /// must then carry a pinned partition.
    #[serde(default, skip_serializing_if = "is_false")]
    pub partial_expand: bool,
    #[serde(default)]
    pub dot: DotOptions,
    #[serde(default = "default_latency")]
    pub default_latency: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub program_options: BTreeMap<String, String>,
}

fn latest_version() -> u32 {
    LATEST_VERSION
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn one() -> u32 {
    1
}

fn default_latency() -> String {
    ModelOptions::default().default_latency
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: LATEST_VERSION,
            strategy: StrategyKind::default(),
            rank_count: 1,
            threads_per_rank: None,
            split_factor: None,
            emit_mode: EmitMode::default(),
            structured_format: StructuredFormat::default(),
            rank: None,
            partial_expand: false,
            dot: DotOptions::default(),
            default_latency: default_latency(),
            program_options: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn partition_config(&self) -> PartitionConfig {
        PartitionConfig {
            strategy: self.strategy,
            rank_count: self.rank_count,
            threads_per_rank: self.threads_per_rank,
            split_factor: self.split_factor,
        }
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            program_options: self.program_options.clone(),
            default_latency: self.default_latency.clone(),
        }
    }
}
