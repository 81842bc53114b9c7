//! Integration tests for partitioning strategies.

use ahp_core::{AhpError, Partition};
use ahp_graph::{Device, DeviceGraph, FlatGraph, PartitionState, PortSpec, flatten};
use ahp_partition::{PartitionConfig, StrategyKind, partition};

fn leaf(name: &str) -> Device {
    Device::component(name, "Leaf")
        .with_port(PortSpec::single("in"))
        .with_port(PortSpec::single("out"))
}

fn chain(name: &str, width: i64) -> Device {
    Device::assembly(name, "Chain", |attrs| {
        let width = attrs.get("width").and_then(|v| v.as_int()).unwrap_or(0);
        let mut g = DeviceGraph::new();
        for i in 0..width {
            g.add_device(leaf(&format!("n{i}")))?;
            if i > 0 {
                g.link(&format!("n{}", i - 1), "out", &format!("n{i}"), "in")?;
            }
        }
        Ok(g)
    })
    .with_attr("width", width)
}

fn pairs(count: usize) -> FlatGraph {
    let mut root = DeviceGraph::new();
    for i in 0..count {
        root.add_device(chain(&format!("Pair{i}"), 2)).unwrap();
    }
    flatten(&root).unwrap()
}

fn config(rank_count: u32) -> PartitionConfig {
    PartitionConfig {
        rank_count,
        ..PartitionConfig::default()
    }
}

fn placement(graph: &FlatGraph, name: &str) -> Partition {
    let id = graph.find(name).unwrap();
    graph.component(id).unwrap().partition.unwrap()
}

#[test]
fn subtrees_stay_together() {
    let mut g = pairs(2);
    let report = partition(&mut g, &config(2)).unwrap();
    assert_eq!(placement(&g, "Pair0.n0"), Partition::new(0, 0));
    assert_eq!(placement(&g, "Pair0.n1"), Partition::new(0, 0));
    assert_eq!(placement(&g, "Pair1.n0"), Partition::new(1, 0));
    assert_eq!(report.cross_rank_links, 0);
    assert_eq!(report.per_rank, vec![2, 2]);
    assert_eq!(g.partition_state(), PartitionState::Assigned { rank_count: 2 });
}

#[test]
fn extra_ranks_stay_idle() {
    let mut g = pairs(2);
    let report = partition(&mut g, &config(8)).unwrap();
    assert_eq!(report.ranks_used, 2);
    assert!(g.components().iter().all(|c| c.partition.unwrap().rank < 8));
}

#[test]
fn threads_follow_subtrees_within_a_rank() {
    let mut g = pairs(3);
    partition(&mut g, &config(1)).unwrap();
    assert_eq!(placement(&g, "Pair0.n1"), Partition::new(0, 0));
    assert_eq!(placement(&g, "Pair1.n0"), Partition::new(0, 1));
    assert_eq!(placement(&g, "Pair2.n0"), Partition::new(0, 2));

    let mut capped = pairs(3);
    let cfg = PartitionConfig {
        threads_per_rank: Some(2),
        ..config(1)
    };
    partition(&mut capped, &cfg).unwrap();
    assert_eq!(placement(&capped, "Pair2.n0"), Partition::new(0, 0));
}

#[test]
fn lone_wrapper_is_looked_through() {
    let mut root = DeviceGraph::new();
    root.add_device(Device::assembly("System", "System", |_| {
        let mut g = DeviceGraph::new();
        for i in 0..4 {
            g.add_device(chain(&format!("P{i}"), 2))?;
        }
        Ok(g)
    }))
    .unwrap();
    let mut g = flatten(&root).unwrap();
    let report = partition(&mut g, &config(2)).unwrap();
    assert_eq!(report.per_rank, vec![4, 4]);
    assert_eq!(placement(&g, "System.P0.n0").rank, 0);
    assert_eq!(placement(&g, "System.P1.n0").rank, 1);
    assert_eq!(placement(&g, "System.P2.n0").rank, 0);
    assert_eq!(placement(&g, "System.P3.n0").rank, 1);
}

#[test]
fn split_factor_breaks_up_heavy_subtrees() {
    let build = || {
        let mut root = DeviceGraph::new();
        root.add_device(Device::assembly("Big", "Big", |_| {
            let mut g = DeviceGraph::new();
            g.add_device(chain("a", 3))?;
            g.add_device(chain("b", 3))?;
            Ok(g)
        }))
        .unwrap();
        root.add_device(leaf("s1")).unwrap();
        root.add_device(leaf("s2")).unwrap();
        flatten(&root).unwrap()
    };

    let mut whole = build();
    let report = partition(&mut whole, &config(2)).unwrap();
    assert_eq!(report.per_rank, vec![6, 2]);

    let mut split = build();
    let cfg = PartitionConfig {
        split_factor: Some(1.0),
        ..config(2)
    };
    let report = partition(&mut split, &cfg).unwrap();
    assert_eq!(report.per_rank, vec![4, 4]);
    assert_eq!(placement(&split, "Big.a.n2").rank, 0);
    assert_eq!(placement(&split, "Big.b.n0").rank, 1);
}

#[test]
fn pinned_partitions_are_kept_and_checked() {
    let mut root = DeviceGraph::new();
    root.add_device(chain("free", 2)).unwrap();
    root.add_device(leaf("pinned").with_partition(Partition::new(1, 3)))
        .unwrap();
    let mut g = flatten(&root).unwrap();
    partition(&mut g, &config(2)).unwrap();
    assert_eq!(placement(&g, "pinned"), Partition::new(1, 3));
    assert_eq!(placement(&g, "free.n0").rank, 0);

    let mut g = flatten(&root).unwrap();
    assert!(matches!(
        partition(&mut g, &config(1)),
        Err(AhpError::PartitionOutOfRange { rank: 1, rank_count: 1, .. })
    ));
}

#[test]
fn deferred_assigns_nothing() {
    let mut g = pairs(2);
    let cfg = PartitionConfig {
        strategy: StrategyKind::Deferred,
        ..config(4)
    };
    let report = partition(&mut g, &cfg).unwrap();
    assert_eq!(report.strategy, StrategyKind::Deferred);
    assert_eq!(g.partition_state(), PartitionState::HostDeferred);
    assert!(g.components().iter().all(|c| c.partition.is_none()));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn build(widths: &[i64]) -> FlatGraph {
        let mut root = DeviceGraph::new();
        for (i, w) in widths.iter().enumerate() {
            if i % 3 == 2 {
                root.add_device(leaf(&format!("solo{i}"))).unwrap();
            } else {
                root.add_device(chain(&format!("c{i}"), *w)).unwrap();
            }
        }
        flatten(&root).unwrap()
    }

    proptest! {
        #[test]
        fn every_component_is_placed_in_range(
            widths in prop::collection::vec(1_i64..6, 1..8),
            ranks in 1_u32..6,
            split in prop::option::of(1.0_f64..3.0),
        ) {
            let mut g = build(&widths);
            let cfg = PartitionConfig { split_factor: split, ..config(ranks) };
            let report = partition(&mut g, &cfg).unwrap();
            for comp in g.components() {
                let p = comp.partition.unwrap();
                prop_assert!(p.rank < ranks);
            }
            prop_assert!(report.ranks_used <= ranks);
            prop_assert_eq!(report.per_rank.iter().sum::<usize>(), g.len());
        }

        #[test]
        fn placement_is_deterministic(
            widths in prop::collection::vec(1_i64..6, 1..8),
            ranks in 1_u32..6,
        ) {
            let mut first = build(&widths);
            let mut second = build(&widths);
            partition(&mut first, &config(ranks)).unwrap();
            partition(&mut second, &config(ranks)).unwrap();
            let a: Vec<_> = first.components().iter().map(|c| c.partition).collect();
            let b: Vec<_> = second.components().iter().map(|c| c.partition).collect();
            prop_assert_eq!(a, b);
        }
    }
}
