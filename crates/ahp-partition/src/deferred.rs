use ahp_core::AhpResult;
use ahp_graph::FlatGraph;
use tracing::info;

use crate::report::PartitionReport;
use crate::strategy::{Partitioner, StrategyKind};

/// Leaves placement to the host's own partitioner; emitted output carries no
/// partition fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deferred;

impl Partitioner for Deferred {
    fn partition(&self, graph: &mut FlatGraph) -> AhpResult<PartitionReport> {
        graph.defer_to_host();
        info!(components = graph.len(), "partitioning deferred to host");
        Ok(PartitionReport {
            strategy: StrategyKind::Deferred,
            rank_count: 0,
            ranks_used: 0,
            per_rank: Vec::new(),
            cross_rank_links: 0,
        })
    }
}
