//! The flattener's output: components only, fully qualified names.

use std::collections::{BTreeMap, HashMap, HashSet};

use ahp_core::{AhpError, AhpResult, Attributes, FlatId, Partition};

use crate::device::SubComponent;
use crate::graph::LinkDirection;
use crate::port::{PortRef, PortSpec};
use crate::validate::{self, GraphWarning};

/// A leaf of the lowered graph.
#[derive(Debug, Clone)]
pub struct FlatComponent {
    /// Hierarchical path, e.g. `Pair0.Left`.
    pub name: String,
    pub type_name: String,
    pub model: Option<String>,
    pub attributes: Attributes,
    pub ports: Vec<PortSpec>,
    pub subcomponents: Vec<SubComponent>,
    /// Placement requested by the user (directly or through an enclosing assembly).
    pub pinned: Option<Partition>,
    /// Placement decided by the partitioner.
    pub partition: Option<Partition>,
}

impl FlatComponent {
    pub fn port(&self, name: &str) -> Option<&PortSpec> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn category(&self) -> String {
        match &self.model {
            Some(model) => format!("{}_{}", self.type_name, model),
            None => self.type_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlatEndpoint {
    pub component: FlatId,
    pub port: PortRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatLink {
    pub a: FlatEndpoint,
    pub b: FlatEndpoint,
    pub latency: Option<String>,
    pub direction: LinkDirection,
}

/// Entry of the recorded containment tree, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyItem {
    Component(FlatId),
    Assembly(HierarchyNode),
}

/// An expanded assembly (or the root graph, with an empty name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyNode {
    pub name: String,
    pub type_name: String,
    pub items: Vec<HierarchyItem>,
}

impl HierarchyNode {
    /// Components of this subtree in declaration order.
    pub fn components(&self) -> Vec<FlatId> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<FlatId>) {
        for item in &self.items {
            match item {
                HierarchyItem::Component(id) => out.push(*id),
                HierarchyItem::Assembly(node) => node.collect(out),
            }
        }
    }

    pub fn component_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                HierarchyItem::Component(_) => 1,
                HierarchyItem::Assembly(node) => node.component_count(),
            })
            .sum()
    }
}

/// Whether (and by whom) components have been placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionState {
    #[default]
    Unassigned,
    /// Every component has a partition with `rank < rank_count`.
    Assigned { rank_count: u32 },
    /// Placement is left to the host; partitions are absent.
    HostDeferred,
}

/// A graph of components only, every link resolved to component ports.
#[derive(Debug, Clone, Default)]
pub struct FlatGraph {
    attributes: Attributes,
    components: Vec<FlatComponent>,
    by_name: HashMap<String, FlatId>,
    links: Vec<FlatLink>,
    hierarchy: HierarchyNode,
    state: PartitionState,
    rank_scope: Option<u32>,
}

impl FlatGraph {
    pub(crate) fn with_attributes(attributes: Attributes) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    pub(crate) fn insert_component(&mut self, component: FlatComponent) -> AhpResult<FlatId> {
        if self.by_name.contains_key(&component.name) {
            return Err(AhpError::DuplicateName {
                path: component.name,
            });
        }
        let id = FlatId::checked(self.components.len(), "component")?;
        self.by_name.insert(component.name.clone(), id);
        self.components.push(component);
        Ok(id)
    }

    pub(crate) fn push_link(&mut self, link: FlatLink) {
        self.links.push(link);
    }

    pub(crate) fn set_hierarchy(&mut self, hierarchy: HierarchyNode) {
        self.hierarchy = hierarchy;
    }

    /// Keep the components pinned to `rank`, every component linked to one of them,
    /// and the links touching the rank. Survivors are renumbered in order.
    pub(crate) fn retain_rank(&mut self, rank: u32) -> AhpResult<()> {
        let local: Vec<bool> = self
            .components
            .iter()
            .map(|c| c.pinned.is_some_and(|p| p.rank == rank))
            .collect();
        let is_local = |end: &FlatEndpoint| local.get(end.component.slot()).copied().unwrap_or(false);

        let mut keep = local.clone();
        let links: Vec<FlatLink> = std::mem::take(&mut self.links)
            .into_iter()
            .filter(|l| is_local(&l.a) || is_local(&l.b))
            .collect();
        for link in &links {
            for end in [&link.a, &link.b] {
                if let Some(k) = keep.get_mut(end.component.slot()) {
                    *k = true;
                }
            }
        }

        let mut remap: Vec<Option<FlatId>> = Vec::with_capacity(keep.len());
        let mut components = Vec::new();
        for (comp, kept) in std::mem::take(&mut self.components).into_iter().zip(&keep) {
            if *kept {
                remap.push(Some(FlatId::checked(components.len(), "component")?));
                components.push(comp);
            } else {
                remap.push(None);
            }
        }
        let moved = |id: FlatId| {
            remap.get(id.slot()).copied().flatten().ok_or_else(|| {
                AhpError::invariant(format!("component {id} dropped while still linked"))
            })
        };

        let mut relinked = Vec::with_capacity(links.len());
        for mut link in links {
            link.a.component = moved(link.a.component)?;
            link.b.component = moved(link.b.component)?;
            relinked.push(link);
        }

        self.by_name = components
            .iter()
            .zip(remap.iter().flatten())
            .map(|(c, id)| (c.name.clone(), *id))
            .collect();
        self.components = components;
        self.links = relinked;
        let items = std::mem::take(&mut self.hierarchy.items);
        self.hierarchy.items = retain_items(items, &remap);
        self.rank_scope = Some(rank);
        Ok(())
    }

    /// Rank the graph was flattened for, when only that rank's part was expanded.
    pub fn rank_scope(&self) -> Option<u32> {
        self.rank_scope
    }

    /// Global parameters inherited from the root graph.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn components(&self) -> &[FlatComponent] {
        &self.components
    }

    pub fn component(&self, id: FlatId) -> Option<&FlatComponent> {
        self.components.get(id.slot())
    }

    pub fn find(&self, name: &str) -> Option<FlatId> {
        self.by_name.get(name).copied()
    }

    pub fn links(&self) -> &[FlatLink] {
        &self.links
    }

    pub fn hierarchy(&self) -> &HierarchyNode {
        &self.hierarchy
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn partition_state(&self) -> PartitionState {
        self.state
    }

    /// Resolve a link endpoint to its component.
    pub fn endpoint(&self, end: &FlatEndpoint) -> AhpResult<&FlatComponent> {
        self.component(end.component).ok_or_else(|| {
            AhpError::invariant(format!(
                "link endpoint {} references missing component {}",
                end.port, end.component
            ))
        })
    }

    /// Host-facing port name of an endpoint (`data.p3`).
    pub fn port_name(&self, end: &FlatEndpoint) -> AhpResult<String> {
        let comp = self.endpoint(end)?;
        let spec = comp.port(&end.port.name).ok_or_else(|| {
            AhpError::invariant(format!(
                "link endpoint {}.{} references an undeclared port",
                comp.name, end.port
            ))
        })?;
        Ok(spec.slot_name(end.port.slot))
    }

    /// Place one component. The state is not changed until [`FlatGraph::finish_assignment`].
    pub fn assign(&mut self, id: FlatId, partition: Partition) -> AhpResult<()> {
        let comp = self
            .components
            .get_mut(id.slot())
            .ok_or_else(|| AhpError::invariant(format!("no component {id} to place")))?;
        comp.partition = Some(partition);
        Ok(())
    }

    /// Mark placement complete after checking every component is placed within range.
    pub fn finish_assignment(&mut self, rank_count: u32) -> AhpResult<()> {
        for comp in &self.components {
            match comp.partition {
                None => {
                    return Err(AhpError::PartitionRequired {
                        path: comp.name.clone(),
                    });
                }
                Some(p) if p.rank >= rank_count => {
                    return Err(AhpError::PartitionOutOfRange {
                        path: comp.name.clone(),
                        rank: p.rank,
                        rank_count,
                    });
                }
                Some(_) => {}
            }
        }
        self.state = PartitionState::Assigned { rank_count };
        Ok(())
    }

    /// Drop every placement and leave partitioning to the host.
    pub fn defer_to_host(&mut self) {
        for comp in &mut self.components {
            comp.partition = None;
        }
        self.state = PartitionState::HostDeferred;
    }

    /// Device counts keyed by category (`type_model`).
    pub fn count_devices(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.components {
            *counts.entry(c.category()).or_insert(0) += 1;
        }
        counts
    }

    /// Unlinked ports on the lowered graph. Logged as warnings.
    pub fn validate(&self) -> Vec<GraphWarning> {
        let linked: HashSet<(usize, &str)> = self
            .links
            .iter()
            .flat_map(|l| [&l.a, &l.b])
            .map(|e| (e.component.slot(), e.port.name.as_str()))
            .collect();
        let warnings = validate::unlinked_ports(
            self.components
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.name.as_str(), c.ports.as_slice())),
            |i, port| linked.contains(&(i, port)),
        );
        for w in &warnings {
            tracing::warn!("{w}");
        }
        warnings
    }

    /// Check that every link endpoint names an existing component and declared port.
    pub fn check_links(&self) -> AhpResult<()> {
        for link in &self.links {
            self.port_name(&link.a)?;
            self.port_name(&link.b)?;
        }
        Ok(())
    }
}

fn retain_items(items: Vec<HierarchyItem>, remap: &[Option<FlatId>]) -> Vec<HierarchyItem> {
    items
        .into_iter()
        .filter_map(|item| match item {
            HierarchyItem::Component(id) => remap
                .get(id.slot())
                .copied()
                .flatten()
                .map(HierarchyItem::Component),
            HierarchyItem::Assembly(mut node) => {
                node.items = retain_items(node.items, remap);
                (!node.items.is_empty()).then_some(HierarchyItem::Assembly(node))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(name: &str) -> FlatComponent {
        FlatComponent {
            name: name.into(),
            type_name: "Leaf".into(),
            model: None,
            attributes: Attributes::new(),
            ports: vec![PortSpec::single("in")],
            subcomponents: vec![],
            pinned: None,
            partition: None,
        }
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut g = FlatGraph::default();
        g.insert_component(comp("a.b")).unwrap();
        let err = g.insert_component(comp("a.b")).unwrap_err();
        assert_eq!(err, AhpError::DuplicateName { path: "a.b".into() });
    }

    #[test]
    fn finish_assignment_requires_every_component() {
        let mut g = FlatGraph::default();
        let a = g.insert_component(comp("a")).unwrap();
        g.insert_component(comp("b")).unwrap();
        g.assign(a, Partition::rank(0)).unwrap();
        assert!(matches!(
            g.finish_assignment(1),
            Err(AhpError::PartitionRequired { .. })
        ));
        assert_eq!(g.partition_state(), PartitionState::Unassigned);
    }

    #[test]
    fn dangling_endpoint_is_an_invariant_violation() {
        let mut g = FlatGraph::default();
        let a = g.insert_component(comp("a")).unwrap();
        g.push_link(FlatLink {
            a: FlatEndpoint {
                component: a,
                port: PortRef::new("in"),
            },
            b: FlatEndpoint {
                component: FlatId::from_index(9).unwrap(),
                port: PortRef::new("in"),
            },
            latency: None,
            direction: LinkDirection::Bidirectional,
        });
        assert!(matches!(
            g.check_links(),
            Err(AhpError::InternalInvariant { .. })
        ));
    }

    #[test]
    fn defer_clears_partitions() {
        let mut g = FlatGraph::default();
        let a = g.insert_component(comp("a")).unwrap();
        g.assign(a, Partition::new(0, 1)).unwrap();
        g.finish_assignment(1).unwrap();
        g.defer_to_host();
        assert_eq!(g.partition_state(), PartitionState::HostDeferred);
        assert!(g.components()[0].partition.is_none());
    }
}
