//! Lowering a hierarchical graph into a flat graph of components.
//!
//! The walk is depth-first in declaration order. Within each scope every device is
//! handled before any link, so by the time a link is resolved every assembly it
//! touches has been expanded and knows where its exposed ports lead.
//!
//! A rank-scoped walk ([`Flattener::for_rank`]) expands only what one rank needs:
//! assemblies placed on the rank, and of every other assembly just the exposed
//! ports that links from the rank reach. Placement of an unexpanded assembly is its
//! own pinned partition, so every top-level device must be pinned.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use ahp_core::{AhpError, AhpResult, FlatId, NamePrefix, Partition, qualify};
use tracing::{debug, info};

use crate::device::{Device, DeviceKind};
use crate::flat::{FlatComponent, FlatEndpoint, FlatGraph, FlatLink, HierarchyItem, HierarchyNode};
use crate::graph::{DeviceGraph, LinkEnd};
use crate::port::PortRef;

/// What a device of the current scope became in the flat graph.
enum Resolved {
    Component(FlatId),
    /// Exposed port (and slot) to the interior component port it leads to.
    Assembly(HashMap<PortRef, FlatEndpoint>),
    /// Not needed by a rank-scoped walk.
    Skipped,
}

/// Exposed ports of an assembly the walk has to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Demand {
    All,
    Ports(HashSet<PortRef>),
}

impl Demand {
    fn wants(&self, port: &PortRef) -> bool {
        match self {
            Demand::All => true,
            Demand::Ports(ports) => ports.contains(port),
        }
    }

    fn add(&mut self, port: PortRef) {
        if let Demand::Ports(ports) = self {
            ports.insert(port);
        }
    }
}

/// One lowering pass. All state is owned by the pass, so independent passes may
/// run concurrently.
#[derive(Debug, Default)]
pub struct Flattener {
    prefix: NamePrefix,
    /// Builders and identities of the assemblies on the current expansion path.
    expanding: HashSet<(TypeId, String)>,
    /// Expand only what this rank needs.
    rank: Option<u32>,
    out: FlatGraph,
}

/// Flatten `root`. The input graph is left untouched; on error nothing is produced.
pub fn flatten(root: &DeviceGraph) -> AhpResult<FlatGraph> {
    Flattener::new().run(root)
}

/// Flatten only the part of `root` that `rank` owns or links to.
pub fn flatten_rank(root: &DeviceGraph, rank: u32) -> AhpResult<FlatGraph> {
    Flattener::for_rank(rank).run(root)
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_rank(rank: u32) -> Self {
        Self {
            rank: Some(rank),
            ..Self::default()
        }
    }

    pub fn run(mut self, root: &DeviceGraph) -> AhpResult<FlatGraph> {
        self.out = FlatGraph::with_attributes(root.attributes().clone());
        let (items, _) = self.expand_scope(root, None, &Demand::All)?;
        self.out.set_hierarchy(HierarchyNode {
            name: String::new(),
            type_name: String::new(),
            items,
        });
        if let Some(rank) = self.rank {
            let before = self.out.len();
            self.out.retain_rank(rank)?;
            debug!(rank, dropped = before - self.out.len(), "pruned components off the rank");
        }
        self.out.check_links()?;
        info!(
            components = self.out.len(),
            links = self.out.links().len(),
            rank = ?self.rank,
            "flattened device graph"
        );
        Ok(self.out)
    }

    /// Rank a device sits on for a rank-scoped walk.
    fn placement(&self, device: &Device, inherited: Option<Partition>) -> AhpResult<u32> {
        device
            .partition
            .or(inherited)
            .map(|p| p.rank)
            .ok_or_else(|| AhpError::PartitionRequired {
                path: self.prefix.qualify(&device.name),
            })
    }

    /// Decide which devices of `graph` to visit, and what each assembly must export.
    fn plan(
        &self,
        graph: &DeviceGraph,
        inherited: Option<Partition>,
        demand: &Demand,
    ) -> AhpResult<(Vec<Option<Demand>>, Vec<bool>)> {
        let Some(rank) = self.rank else {
            return Ok((vec![Some(Demand::All); graph.len()], vec![true; graph.len()]));
        };

        let mut local = Vec::with_capacity(graph.len());
        let mut plan = Vec::with_capacity(graph.len());
        for device in graph.devices() {
            let here = self.placement(device, inherited)? == rank;
            local.push(here);
            let visit = here || (*demand == Demand::All && !device.is_assembly());
            plan.push(visit.then_some(Demand::All));
        }

        let want = |plan: &mut Vec<Option<Demand>>, end: &LinkEnd| {
            if let Some(entry) = plan.get_mut(end.device.slot()) {
                entry
                    .get_or_insert_with(|| Demand::Ports(HashSet::new()))
                    .add(end.port.clone());
            }
        };
        for fwd in graph.forwards() {
            if demand.wants(&fwd.exposed) {
                want(&mut plan, &fwd.target);
            }
        }
        for link in graph.links() {
            let a = local.get(link.a.device.slot()).copied().unwrap_or(false);
            let b = local.get(link.b.device.slot()).copied().unwrap_or(false);
            if a {
                want(&mut plan, &link.b);
            }
            if b {
                want(&mut plan, &link.a);
            }
        }

        let touches = graph
            .links()
            .iter()
            .map(|l| {
                local.get(l.a.device.slot()).copied().unwrap_or(false)
                    || local.get(l.b.device.slot()).copied().unwrap_or(false)
            })
            .collect();
        Ok((plan, touches))
    }

    fn expand_scope(
        &mut self,
        graph: &DeviceGraph,
        inherited: Option<Partition>,
        demand: &Demand,
    ) -> AhpResult<(Vec<HierarchyItem>, Vec<Resolved>)> {
        let (plan, link_needed) = self.plan(graph, inherited, demand)?;
        let mut items = Vec::with_capacity(graph.len());
        let mut resolved = Vec::with_capacity(graph.len());

        for (device, wanted) in graph.devices().iter().zip(plan) {
            let Some(wanted) = wanted else {
                resolved.push(Resolved::Skipped);
                continue;
            };
            let pinned = device.partition.or(inherited);
            match &device.kind {
                DeviceKind::Component => {
                    let id = self.out.insert_component(FlatComponent {
                        name: self.prefix.qualify(&device.name),
                        type_name: device.type_name.clone(),
                        model: device.model.clone(),
                        attributes: device.attributes.clone(),
                        ports: device.ports.clone(),
                        subcomponents: device.subcomponents.clone(),
                        pinned,
                        partition: None,
                    })?;
                    items.push(HierarchyItem::Component(id));
                    resolved.push(Resolved::Component(id));
                }
                DeviceKind::Assembly(assembly) => {
                    let path = self.prefix.qualify(&device.name);
                    let identity = device.identity();
                    let key = (assembly.builder_type(), identity.clone());
                    if !self.expanding.insert(key.clone()) {
                        return Err(AhpError::CyclicAssembly { path, identity });
                    }
                    let interior = assembly
                        .expand(&device.attributes)
                        .map_err(|e| e.within(&path))?;
                    debug!(assembly = %path, devices = interior.len(), "expanding assembly");

                    self.prefix.push(&device.name);
                    let nested = self.expand_scope(interior, pinned, &wanted);
                    self.prefix.pop();
                    self.expanding.remove(&key);

                    let (sub_items, sub_resolved) = nested?;
                    let exports = self.exports(device, interior, &sub_resolved, &path, &wanted)?;
                    items.push(HierarchyItem::Assembly(HierarchyNode {
                        name: path,
                        type_name: device.type_name.clone(),
                        items: sub_items,
                    }));
                    resolved.push(Resolved::Assembly(exports));
                }
            }
        }

        let scope = self.prefix.as_str().to_string();
        for (link, needed) in graph.links().iter().zip(link_needed) {
            if !needed {
                continue;
            }
            let a = resolve(graph, &resolved, &link.a, &scope)?;
            let b = resolve(graph, &resolved, &link.b, &scope)?;
            self.out.push_link(FlatLink {
                a,
                b,
                latency: link.latency.clone(),
                direction: link.direction,
            });
        }

        Ok((items, resolved))
    }

    /// Map each wanted exposed port of `device` to the component port its builder
    /// bound it to.
    fn exports(
        &self,
        device: &Device,
        interior: &DeviceGraph,
        resolved: &[Resolved],
        path: &str,
        wanted: &Demand,
    ) -> AhpResult<HashMap<PortRef, FlatEndpoint>> {
        let mut exports = HashMap::with_capacity(interior.forwards().len());
        for fwd in interior.forwards().iter().filter(|f| wanted.wants(&f.exposed)) {
            let spec = device
                .port(&fwd.exposed.name)
                .ok_or_else(|| AhpError::UnknownPort {
                    path: path.to_string(),
                    port: fwd.exposed.name.clone(),
                })?;
            match (spec.is_single(), fwd.exposed.slot, spec.limit()) {
                (true, Some(_), _) => {
                    return Err(AhpError::UnresolvedPort {
                        path: path.to_string(),
                        port: fwd.exposed.to_string(),
                        reason: "single port forwarded with a slot number".into(),
                    });
                }
                (false, None, _) => {
                    return Err(AhpError::UnresolvedPort {
                        path: path.to_string(),
                        port: fwd.exposed.to_string(),
                        reason: "multi port forwarded without a slot number".into(),
                    });
                }
                (false, Some(slot), Some(limit)) if slot >= limit => {
                    return Err(AhpError::PortCapacity {
                        path: path.to_string(),
                        port: fwd.exposed.name.clone(),
                        reason: format!("slot {slot} exceeds limit {limit}"),
                    });
                }
                _ => {}
            }
            let target = resolve(interior, resolved, &fwd.target, path)?;
            exports.insert(fwd.exposed.clone(), target);
        }

        if *wanted == Demand::All {
            for spec in device.ports.iter().filter(|p| p.is_single()) {
                if !exports.contains_key(&PortRef::new(spec.name.clone())) {
                    return Err(AhpError::UnresolvedPort {
                        path: path.to_string(),
                        port: spec.name.clone(),
                        reason: "no interior forwarding target".into(),
                    });
                }
            }
        }
        Ok(exports)
    }
}

/// Resolve a link end of `graph` (whose devices are `resolved`) to a component port.
fn resolve(
    graph: &DeviceGraph,
    resolved: &[Resolved],
    end: &LinkEnd,
    scope: &str,
) -> AhpResult<FlatEndpoint> {
    let target = resolved.get(end.device.slot()).ok_or_else(|| {
        AhpError::invariant(format!(
            "link end {} in scope '{scope}' has no device",
            end.device
        ))
    })?;
    let name = || {
        graph
            .device(end.device)
            .map_or_else(|| end.device.to_string(), |d| d.name.clone())
    };
    match target {
        Resolved::Component(id) => Ok(FlatEndpoint {
            component: *id,
            port: end.port.clone(),
        }),
        Resolved::Assembly(exports) => {
            exports
                .get(&end.port)
                .cloned()
                .ok_or_else(|| AhpError::UnresolvedPort {
                    path: qualify(scope, &name()),
                    port: end.port.to_string(),
                    reason: "no interior forwarding target".into(),
                })
        }
        Resolved::Skipped => Err(AhpError::invariant(format!(
            "link end {}.{} was skipped by a rank-scoped walk",
            qualify(scope, &name()),
            end.port
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortSpec;

    fn leaf(name: &str) -> Device {
        Device::component(name, "Leaf")
            .with_port(PortSpec::single("in"))
            .with_port(PortSpec::single("out"))
    }

    #[test]
    fn components_only_graph_keeps_names() {
        let mut g = DeviceGraph::new();
        g.add_device(leaf("a")).unwrap();
        g.add_device(leaf("b")).unwrap();
        g.link("a", "out", "b", "in").unwrap();
        let flat = flatten(&g).unwrap();
        let names: Vec<_> = flat.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(flat.links().len(), 1);
    }

    #[test]
    fn assembly_without_forward_for_single_port() {
        let mut g = DeviceGraph::new();
        g.add_device(
            Device::assembly("box", "Box", |_| {
                let mut inner = DeviceGraph::new();
                inner.add_device(leaf("x"))?;
                Ok(inner)
            })
            .with_port(PortSpec::single("P")),
        )
        .unwrap();
        let err = flatten(&g).unwrap_err();
        assert_eq!(
            err,
            AhpError::UnresolvedPort {
                path: "box".into(),
                port: "P".into(),
                reason: "no interior forwarding target".into(),
            }
        );
    }

    #[test]
    fn builder_errors_carry_full_path() {
        let mut g = DeviceGraph::new();
        g.add_device(Device::assembly("outer", "Outer", |_| {
            let mut inner = DeviceGraph::new();
            inner.add_device(Device::assembly("mid", "Mid", |_| {
                let mut g = DeviceGraph::new();
                g.add_device(leaf("x"))?;
                g.add_device(leaf("x"))?;
                Ok(g)
            }))?;
            Ok(inner)
        }))
        .unwrap();
        assert_eq!(
            flatten(&g).unwrap_err(),
            AhpError::DuplicateName {
                path: "outer.mid.x".into()
            }
        );
    }

    #[test]
    fn pinned_partition_is_inherited() {
        let mut g = DeviceGraph::new();
        g.add_device(
            Device::assembly("box", "Box", |_| {
                let mut inner = DeviceGraph::new();
                inner.add_device(leaf("x"))?;
                inner.add_device(leaf("y").with_partition(Partition::new(1, 1)))?;
                Ok(inner)
            })
            .with_partition(Partition::rank(2)),
        )
        .unwrap();
        let flat = flatten(&g).unwrap();
        assert_eq!(flat.components()[0].pinned, Some(Partition::rank(2)));
        assert_eq!(flat.components()[1].pinned, Some(Partition::new(1, 1)));
        assert!(flat.components().iter().all(|c| c.partition.is_none()));
    }
}
