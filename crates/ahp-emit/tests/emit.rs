//! End-to-end emission over small hierarchies.

use ahp_core::Partition;
use ahp_emit::{
    DotOptions, EmitError, HostCall, ModelOptions, RecordingHost, StructuredFormat,
    build_in_process, build_model, digest, flat_dot, hierarchy_dot, render_model,
};
use ahp_graph::{Device, DeviceGraph, FlatGraph, LinkAttrs, PortSpec, flatten};
use ahp_partition::{PartitionConfig, StrategyKind, partition};

fn leaf(name: &str) -> Device {
    Device::component(name, "demo.Leaf")
        .with_port(PortSpec::single("in"))
        .with_port(PortSpec::single("out"))
}

fn pair(name: &str) -> Device {
    Device::assembly(name, "Pair", |_| {
        let mut g = DeviceGraph::new();
        g.add_device(leaf("Left"))?;
        g.add_device(leaf("Right"))?;
        g.link("Left", "out", "Right", "in")?;
        g.forward("west", "Left", "in")?;
        g.forward("east", "Right", "out")?;
        Ok(g)
    })
    .with_port(PortSpec::single("west"))
    .with_port(PortSpec::single("east"))
}

fn two_pairs() -> DeviceGraph {
    let mut g = DeviceGraph::new().with_attr("verbose", 1);
    g.add_device(pair("Pair0")).unwrap();
    g.add_device(pair("Pair1")).unwrap();
    g.add_link("Pair0", "east", "Pair1", "west", LinkAttrs::latency("10ns"))
        .unwrap();
    g
}

fn placed(strategy: StrategyKind, rank_count: u32) -> FlatGraph {
    let mut flat = flatten(&two_pairs()).unwrap();
    let cfg = PartitionConfig {
        strategy,
        rank_count,
        ..PartitionConfig::default()
    };
    partition(&mut flat, &cfg).unwrap();
    flat
}

#[test]
fn whole_model_lists_everything_in_order() {
    let flat = flatten(&two_pairs()).unwrap();
    let model = build_model(&flat, &ModelOptions::default(), None).unwrap();

    let names: Vec<_> = model.components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Pair0.Left", "Pair0.Right", "Pair1.Left", "Pair1.Right"]);
    assert!(model.program_options.is_empty());
    assert_eq!(model.global_params["verbose"]["verbose"], "1");
    assert_eq!(model.components[0].params_global_sets, ["verbose"]);

    let links: Vec<_> = model.links.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(
        links,
        [
            "Pair0.Left.out__1ps__Pair0.Right.in",
            "Pair1.Left.out__1ps__Pair1.Right.in",
            "Pair0.Right.out__10ns__Pair1.Left.in",
        ]
    );
    assert_eq!(model.links[2].left.latency, "10ns");
    assert_eq!(model.components[1].links.len(), 2);
    assert!(model.components.iter().all(|c| c.partition.is_none()));
}

#[test]
fn partitioned_model_selects_the_self_partitioner() {
    let flat = placed(StrategyKind::HierarchyAware, 2);
    let model = build_model(&flat, &ModelOptions::default(), None).unwrap();
    assert_eq!(model.program_options["partitioner"], "sst.self");
    assert_eq!(model.components[0].partition, Some(Partition::new(0, 0)));
    assert_eq!(model.components[3].partition, Some(Partition::new(1, 0)));

    let single = placed(StrategyKind::HierarchyAware, 1);
    let model = build_model(&single, &ModelOptions::default(), None).unwrap();
    assert!(!model.program_options.contains_key("partitioner"));
}

#[test]
fn rank_view_keeps_neighbours_and_touching_links() {
    let flat = placed(StrategyKind::HierarchyAware, 2);
    let model = build_model(&flat, &ModelOptions::default(), Some(0)).unwrap();

    let names: Vec<_> = model.components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Pair0.Left", "Pair0.Right", "Pair1.Left"]);
    assert_eq!(model.links.len(), 2);
    let remote = &model.components[2];
    assert_eq!(remote.partition.map(|p| p.rank), Some(1));
    assert_eq!(remote.links, ["Pair0.Right.out__10ns__Pair1.Left.in"]);
}

#[test]
fn rank_view_needs_an_assignment() {
    let deferred = placed(StrategyKind::Deferred, 2);
    assert!(matches!(
        build_model(&deferred, &ModelOptions::default(), Some(0)),
        Err(EmitError::RankFilter { rank: 0, .. })
    ));
    let flat = placed(StrategyKind::HierarchyAware, 2);
    assert!(matches!(
        build_model(&flat, &ModelOptions::default(), Some(2)),
        Err(EmitError::RankFilter { rank: 2, .. })
    ));
}

#[test]
fn deferred_output_has_no_partition_fields() {
    let flat = placed(StrategyKind::Deferred, 4);
    let model = build_model(&flat, &ModelOptions::default(), None).unwrap();
    let json = render_model(&model, StructuredFormat::Json).unwrap();
    assert!(!json.contains("partition"));
}

#[test]
fn structured_output_is_byte_identical_across_runs() {
    let render = || {
        let flat = placed(StrategyKind::HierarchyAware, 2);
        let model = build_model(&flat, &ModelOptions::default(), Some(1)).unwrap();
        render_model(&model, StructuredFormat::Json).unwrap()
    };
    assert_eq!(render(), render());
    assert_eq!(
        digest(&placed(StrategyKind::HierarchyAware, 2)).unwrap(),
        digest(&placed(StrategyKind::HierarchyAware, 2)).unwrap()
    );
}

#[test]
fn yaml_output_reads_back() {
    let flat = placed(StrategyKind::HierarchyAware, 2);
    let model = build_model(&flat, &ModelOptions::default(), None).unwrap();
    let text = render_model(&model, StructuredFormat::Yaml).unwrap();
    let back: ahp_emit::HostModel = serde_yaml::from_str(&text).unwrap();
    assert_eq!(back, model);
}

#[test]
fn multi_port_slots_and_subcomponents_are_emitted() {
    let mut g = DeviceGraph::new();
    let nic = Device::component("nic", "demo.Nic")
        .with_model("fast")
        .with_subcomponent("queue", Some(0), Device::component("q", "demo.Queue"))
        .unwrap();
    let router = Device::component("router", "demo.Router")
        .with_port(PortSpec::multi("port"))
        .with_subcomponent("nic", None, nic)
        .unwrap();
    g.add_device(router).unwrap();
    g.add_device(leaf("a")).unwrap();
    g.add_device(leaf("b")).unwrap();
    g.link("router", "port", "a", "in").unwrap();
    g.link("router", "port", "b", "in").unwrap();

    let flat = flatten(&g).unwrap();
    let model = build_model(&flat, &ModelOptions::default(), None).unwrap();
    assert_eq!(model.links[0].left.port, "port.p0");
    assert_eq!(model.links[1].left.port, "port.p1");

    let sub = &model.components[0].subcomponents[0];
    assert_eq!(sub.slot_name, "nic");
    assert_eq!(sub.slot_number, None);
    assert_eq!(sub.params["model"], "fast");
    assert_eq!(sub.subcomponents[0].type_name, "demo.Queue");
    assert_eq!(sub.subcomponents[0].slot_number, Some(0));
}

#[test]
fn in_process_build_follows_insertion_order() {
    let flat = placed(StrategyKind::HierarchyAware, 2);
    let mut host = RecordingHost::new();
    let summary = build_in_process(&flat, &ModelOptions::default(), None, &mut host).unwrap();
    assert_eq!(summary.components, 4);
    assert_eq!(summary.links, 3);

    assert_eq!(
        host.calls[0],
        HostCall::ProgramOption {
            key: "partitioner".into(),
            value: "sst.self".into()
        }
    );
    let created: Vec<_> = host
        .calls
        .iter()
        .filter_map(|c| match c {
            HostCall::Instantiate { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(created, ["Pair0.Left", "Pair0.Right", "Pair1.Left", "Pair1.Right"]);
    let Some(HostCall::Connect { a, b, latency, .. }) = host.calls.last() else {
        panic!("last call should connect a link");
    };
    assert_eq!(a, &("Pair0.Right".to_string(), "out".to_string()));
    assert_eq!(b, &("Pair1.Left".to_string(), "in".to_string()));
    assert_eq!(latency, "10ns");
    assert!(host.transcript().contains("component 'Pair0.Left' of class 'demo.Leaf' on 0:0"));
}

#[test]
fn flat_dot_draws_every_component_and_link() {
    let flat = flatten(&two_pairs()).unwrap();
    let file = flat_dot(&flat, "pairs", DotOptions::default()).unwrap();
    assert_eq!(file.file_name(), "pairs.dot");
    assert!(
        file.text
            .contains("\"Pair1.Right\" [label=\"Pair1.Right\\ndemo.Leaf\\nin, out\"];")
    );
    assert!(file.text.contains("\"Pair0.Right\" -- \"Pair1.Left\";"));
    assert_eq!(file.text.matches(" -- ").count(), 3);

    let with_ports = flat_dot(
        &flat,
        "pairs",
        DotOptions {
            ports: true,
            hierarchy: false,
        },
    )
    .unwrap();
    assert!(with_ports.text.contains("\"Pair0.Right\":\"out\" -- \"Pair1.Left\":\"in\";"));
}

#[test]
fn dot_labels_carry_type_typed_ports_and_attributes() {
    let mut g = DeviceGraph::new();
    g.add_device(
        Device::component("ping", "pingpong.Ping")
            .with_attr("repeats", 10_i64)
            .with_port(PortSpec::single("out").typed("String")),
    )
    .unwrap();
    g.add_device(Device::component("pong", "pingpong.Pong").with_port(PortSpec::single("in")))
        .unwrap();
    g.link("ping", "out", "pong", "in").unwrap();
    let flat = flatten(&g).unwrap();

    let record = flat_dot(
        &flat,
        "pp",
        DotOptions {
            ports: true,
            hierarchy: false,
        },
    )
    .unwrap();
    assert!(record.text.contains(
        "\"ping\" [label=\"ping\\npingpong.Ping|{<out> out:String}|repeats=10\"];"
    ));
    assert!(record.text.contains("\"pong\" [label=\"pong\\npingpong.Pong|{<in> in}\"];"));
    assert!(record.text.contains("\"ping\":\"out\" -- \"pong\":\"in\";"));

    let plain = flat_dot(&flat, "pp", DotOptions::default()).unwrap();
    assert!(
        plain
            .text
            .contains("\"ping\" [label=\"ping\\npingpong.Ping\\nout:String\\nrepeats=10\"];")
    );
}

#[test]
fn hierarchy_dot_writes_one_file_per_category() {
    let files = hierarchy_dot(&two_pairs(), "top", DotOptions::default()).unwrap();
    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["top", "Pair"]);

    let top = &files[0].text;
    assert!(top.contains("href=\"Pair.svg\""));
    assert!(top.contains("\"Pair0\" -- \"Pair1\";"));

    let inner = &files[1].text;
    assert!(inner.contains("subgraph \"cluster_Pair\""));
    assert!(inner.contains("\"Pair:west\" [label=\"west\", shape=\"diamond\""));
    assert!(inner.contains("\"Left\" -- \"Pair:west\";"));
}

#[test]
fn parallel_links_collapse_in_dot() {
    let mut g = DeviceGraph::new();
    g.add_device(Device::component("a", "T").with_port(PortSpec::multi("p")))
        .unwrap();
    g.add_device(Device::component("b", "T").with_port(PortSpec::multi("p")))
        .unwrap();
    for _ in 0..3 {
        g.link("a", "p", "b", "p").unwrap();
    }
    let files = hierarchy_dot(&g, "g", DotOptions::default()).unwrap();
    assert!(files[0].text.contains("\"a\" -- \"b\" [label=\"3\"];"));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn chain(pairs: usize) -> DeviceGraph {
        let mut g = DeviceGraph::new();
        for i in 0..pairs {
            g.add_device(pair(&format!("Pair{i}"))).unwrap();
        }
        for i in 1..pairs {
            g.link(&format!("Pair{}", i - 1), "east", &format!("Pair{i}"), "west")
                .unwrap();
        }
        g
    }

    proptest! {
        #[test]
        fn rank_views_own_every_component_once(pairs in 1usize..6, rank_count in 1u32..5) {
            let mut flat = flatten(&chain(pairs)).unwrap();
            let cfg = PartitionConfig {
                rank_count,
                ..PartitionConfig::default()
            };
            partition(&mut flat, &cfg).unwrap();

            let mut owned = 0;
            let mut links = 0;
            for rank in 0..rank_count {
                let model = build_model(&flat, &ModelOptions::default(), Some(rank)).unwrap();
                owned += model
                    .components
                    .iter()
                    .filter(|c| c.partition.map(|p| p.rank) == Some(rank))
                    .count();
                links += model.links.len();
            }
            prop_assert_eq!(owned, pairs * 2);
            // Cross-rank links show up in both views.
            prop_assert!(links >= flat.links().len());
        }
    }
}
