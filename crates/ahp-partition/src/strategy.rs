//! Strategy selection.

use ahp_core::{AhpError, AhpResult};
use ahp_graph::FlatGraph;
use serde::{Deserialize, Serialize};

use crate::deferred::Deferred;
use crate::hierarchy::HierarchyAware;
use crate::report::PartitionReport;

/// Which partitioner runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    HierarchyAware,
    Deferred,
}

impl std::str::FromStr for StrategyKind {
    type Err = AhpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hierarchy-aware" | "hierarchy" => Ok(StrategyKind::HierarchyAware),
            "deferred" | "host" => Ok(StrategyKind::Deferred),
            other => Err(AhpError::InvalidConfig {
                what: format!("unknown partition strategy '{other}'"),
            }),
        }
    }
}

/// Partitioning options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    pub rank_count: u32,
    /// Cap on threads per rank; subtrees beyond it share threads round-robin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads_per_rank: Option<u32>,
    /// Split a subtree into its children when it holds more than
    /// `split_factor * ceil(total / rank_count)` components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_factor: Option<f64>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::HierarchyAware,
            rank_count: 1,
            threads_per_rank: None,
            split_factor: None,
        }
    }
}

/// A placement pass over a flat graph.
pub trait Partitioner {
    fn partition(&self, graph: &mut FlatGraph) -> AhpResult<PartitionReport>;
}

/// Run the configured strategy.
pub fn partition(graph: &mut FlatGraph, config: &PartitionConfig) -> AhpResult<PartitionReport> {
    match config.strategy {
        StrategyKind::HierarchyAware => HierarchyAware::new(config.rank_count)?
            .with_threads_per_rank(config.threads_per_rank)?
            .with_split_factor(config.split_factor)?
            .partition(graph),
        StrategyKind::Deferred => Deferred.partition(graph),
    }
}
