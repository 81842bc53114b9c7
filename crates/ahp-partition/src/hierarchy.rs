//! Hierarchy-aware placement.
//!
//! Units of placement are subtrees of the containment hierarchy, taken from the top
//! level in declaration order. Each unit goes whole to the currently least-loaded
//! rank (lowest rank on ties), so its internal links never cross ranks. Within a
//! rank every unit gets its own thread.

use std::collections::HashSet;

use ahp_core::{AhpError, AhpResult, FlatId, Partition};
use ahp_graph::{FlatGraph, HierarchyItem, HierarchyNode};
use tracing::info;

use crate::report::PartitionReport;
use crate::strategy::{Partitioner, StrategyKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HierarchyAware {
    rank_count: u32,
    threads_per_rank: Option<u32>,
    split_factor: Option<f64>,
}

/// Components that move together, and the subtree they came from.
#[derive(Debug)]
struct Unit<'a> {
    components: Vec<FlatId>,
    node: Option<&'a HierarchyNode>,
}

impl HierarchyAware {
    pub fn new(rank_count: u32) -> AhpResult<Self> {
        if rank_count == 0 {
            return Err(AhpError::InvalidConfig {
                what: "rank count must be positive".into(),
            });
        }
        Ok(Self {
            rank_count,
            threads_per_rank: None,
            split_factor: None,
        })
    }

    pub fn with_threads_per_rank(mut self, threads: Option<u32>) -> AhpResult<Self> {
        if threads == Some(0) {
            return Err(AhpError::InvalidConfig {
                what: "threads per rank must be positive".into(),
            });
        }
        self.threads_per_rank = threads;
        Ok(self)
    }

    pub fn with_split_factor(mut self, factor: Option<f64>) -> AhpResult<Self> {
        if let Some(f) = factor {
            if !f.is_finite() || f < 1.0 {
                return Err(AhpError::InvalidConfig {
                    what: format!("split factor must be a finite value >= 1, got {f}"),
                });
            }
        }
        self.split_factor = factor;
        Ok(self)
    }

    pub fn rank_count(&self) -> u32 {
        self.rank_count
    }

    /// Cut the hierarchy into placement units.
    fn units<'a>(&self, graph: &'a FlatGraph, pinned: &HashSet<FlatId>) -> Vec<Unit<'a>> {
        let free = graph.len() - pinned.len();
        let threshold = self.split_factor.map(|f| {
            let share = free.div_ceil(self.rank_count as usize).max(1);
            (share as f64 * f).floor() as usize
        });

        let mut units = Vec::new();
        collect(&graph.hierarchy().items, pinned, threshold, &mut units);

        // A lone top-level subtree is a wrapper, not a placement decision.
        while self.rank_count > 1 && units.len() == 1 {
            let Some(node) = units[0].node else {
                break;
            };
            let mut inner = Vec::new();
            collect(&node.items, pinned, threshold, &mut inner);
            units = inner;
        }
        units
    }
}

fn collect<'a>(
    items: &'a [HierarchyItem],
    pinned: &HashSet<FlatId>,
    threshold: Option<usize>,
    out: &mut Vec<Unit<'a>>,
) {
    for item in items {
        match item {
            HierarchyItem::Component(id) => {
                if !pinned.contains(id) {
                    out.push(Unit {
                        components: vec![*id],
                        node: None,
                    });
                }
            }
            HierarchyItem::Assembly(node) => {
                let components: Vec<FlatId> = node
                    .components()
                    .into_iter()
                    .filter(|id| !pinned.contains(id))
                    .collect();
                if components.is_empty() {
                    continue;
                }
                match threshold {
                    Some(t) if components.len() > t => collect(&node.items, pinned, threshold, out),
                    _ => out.push(Unit {
                        components,
                        node: Some(node),
                    }),
                }
            }
        }
    }
}

impl Partitioner for HierarchyAware {
    fn partition(&self, graph: &mut FlatGraph) -> AhpResult<PartitionReport> {
        let ranks = self.rank_count as usize;
        let mut loads = vec![0usize; ranks];
        let mut pinned = HashSet::new();
        let mut placements: Vec<(FlatId, Partition)> = Vec::with_capacity(graph.len());

        for (i, comp) in graph.components().iter().enumerate() {
            if let Some(p) = comp.pinned {
                if p.rank >= self.rank_count {
                    return Err(AhpError::PartitionOutOfRange {
                        path: comp.name.clone(),
                        rank: p.rank,
                        rank_count: self.rank_count,
                    });
                }
                let id = FlatId::checked(i, "component")?;
                pinned.insert(id);
                loads[p.rank as usize] += 1;
                placements.push((id, p));
            }
        }

        let units = self.units(graph, &pinned);
        let unit_count = units.len();
        let mut units_on_rank = vec![0u32; ranks];
        for unit in &units {
            let rank = least_loaded(&loads);
            loads[rank] += unit.components.len();
            let ordinal = units_on_rank[rank];
            units_on_rank[rank] += 1;
            let thread = match self.threads_per_rank {
                Some(cap) => ordinal % cap,
                None => ordinal,
            };
            let partition = Partition::new(rank as u32, thread);
            placements.extend(unit.components.iter().map(|&id| (id, partition)));
        }

        for (id, p) in placements {
            graph.assign(id, p)?;
        }
        graph.finish_assignment(self.rank_count)?;

        let report =
            PartitionReport::from_graph(graph, StrategyKind::HierarchyAware, self.rank_count);
        info!(
            ranks = self.rank_count,
            ranks_used = report.ranks_used,
            units = unit_count,
            cross_rank_links = report.cross_rank_links,
            "hierarchy-aware partitioning complete"
        );
        Ok(report)
    }
}

/// Index of the smallest load; the lowest index wins ties.
fn least_loaded(loads: &[usize]) -> usize {
    let mut best = 0;
    for (i, &load) in loads.iter().enumerate() {
        if load < loads[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_loaded_prefers_lowest_rank() {
        assert_eq!(least_loaded(&[0, 0, 0]), 0);
        assert_eq!(least_loaded(&[2, 1, 1]), 1);
        assert_eq!(least_loaded(&[3]), 0);
    }

    #[test]
    fn rejects_bad_options() {
        assert!(HierarchyAware::new(0).is_err());
        let p = HierarchyAware::new(2).unwrap();
        assert!(p.with_threads_per_rank(Some(0)).is_err());
        assert!(p.with_split_factor(Some(0.5)).is_err());
        assert!(p.with_split_factor(Some(f64::NAN)).is_err());
        assert_eq!(p.rank_count(), 2);
    }
}
