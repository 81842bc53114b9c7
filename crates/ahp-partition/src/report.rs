use ahp_graph::FlatGraph;

use crate::strategy::StrategyKind;

/// Summary of a partitioning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    pub strategy: StrategyKind,
    pub rank_count: u32,
    /// Ranks holding at least one component.
    pub ranks_used: u32,
    /// Component count per rank, indexed by rank. Empty when deferred.
    pub per_rank: Vec<usize>,
    /// Links whose endpoints sit on different ranks.
    pub cross_rank_links: usize,
}

impl PartitionReport {
    pub(crate) fn from_graph(graph: &FlatGraph, strategy: StrategyKind, rank_count: u32) -> Self {
        let mut per_rank = vec![0usize; rank_count as usize];
        for comp in graph.components() {
            if let Some(p) = comp.partition {
                if let Some(slot) = per_rank.get_mut(p.rank as usize) {
                    *slot += 1;
                }
            }
        }
        let rank_of = |id: ahp_core::FlatId| {
            graph
                .component(id)
                .and_then(|c| c.partition)
                .map(|p| p.rank)
        };
        let cross_rank_links = graph
            .links()
            .iter()
            .filter(|l| match (rank_of(l.a.component), rank_of(l.b.component)) {
                (Some(a), Some(b)) => a != b,
                _ => false,
            })
            .count();
        Self {
            strategy,
            rank_count,
            ranks_used: per_rank.iter().filter(|&&n| n > 0).count() as u32,
            per_rank,
            cross_rank_links,
        }
    }
}
