//! One level of hierarchy: devices, links and forwarded ports.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ahp_core::{AhpError, AhpResult, AttrValue, Attributes, DeviceId, LinkId};
use tracing::warn;

use crate::device::Device;
use crate::port::{PortRef, PortSpec};
use crate::validate::{self, GraphWarning};

/// Link direction. Links are bidirectional unless declared otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkDirection {
    #[default]
    Bidirectional,
    /// From the first endpoint to the second.
    Forward,
}

/// Optional link attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkAttrs {
    /// Latency with a time unit, e.g. `10ns`.
    pub latency: Option<String>,
    pub direction: LinkDirection,
}

impl LinkAttrs {
    pub fn latency(latency: impl Into<String>) -> Self {
        Self {
            latency: Some(latency.into()),
            ..Self::default()
        }
    }

    pub fn directed(mut self) -> Self {
        self.direction = LinkDirection::Forward;
        self
    }
}

/// One end of a link, resolved against its graph. Multi-port slots are always set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkEnd {
    pub device: DeviceId,
    pub port: PortRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub a: LinkEnd,
    pub b: LinkEnd,
    pub latency: Option<String>,
    pub direction: LinkDirection,
}

/// Binding of one exposed port of the enclosing assembly to an interior port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    pub exposed: PortRef,
    pub target: LinkEnd,
}

/// A mutable container for one level of hierarchy.
///
/// Every mutation validates immediately and fails fast; a graph that was built
/// without errors is structurally sound at its own level.
#[derive(Debug, Clone, Default)]
pub struct DeviceGraph {
    attributes: Attributes,
    devices: Vec<Device>,
    by_name: HashMap<String, DeviceId>,
    links: Vec<Link>,
    forwards: Vec<Forward>,
    entry_points: Vec<DeviceId>,
    /// Occupied slots per (device, port); single ports use slot 0.
    occupied: HashMap<(DeviceId, String), BTreeSet<u32>>,
}

impl DeviceGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Global parameter shared by every component. Only meaningful on the root graph.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Add a device; its name must be new at this level.
    pub fn add_device(&mut self, device: Device) -> AhpResult<DeviceId> {
        if device.name.is_empty() {
            return Err(AhpError::InvalidConfig {
                what: format!("device of type {} has an empty name", device.type_name),
            });
        }
        if self.by_name.contains_key(&device.name) {
            return Err(AhpError::DuplicateName {
                path: device.name.clone(),
            });
        }
        device.check_model()?;
        let mut seen = BTreeSet::new();
        for port in &device.ports {
            if !seen.insert(port.name.as_str()) {
                return Err(AhpError::DuplicateName {
                    path: format!("{}.{}", device.name, port.name),
                });
            }
        }
        let id = DeviceId::checked(self.devices.len(), "device")?;
        self.by_name.insert(device.name.clone(), id);
        self.devices.push(device);
        Ok(id)
    }

    /// Link `dev_a.port_a` to `dev_b.port_b`.
    ///
    /// A multi-port reference without a slot takes the next free slot.
    pub fn add_link(
        &mut self,
        dev_a: &str,
        port_a: impl Into<PortRef>,
        dev_b: &str,
        port_b: impl Into<PortRef>,
        attrs: LinkAttrs,
    ) -> AhpResult<LinkId> {
        let (ida, ref_a, spec_a) = self.lookup(dev_a, port_a.into())?;
        let (idb, ref_b, spec_b) = self.lookup(dev_b, port_b.into())?;

        if let (Some(ta), Some(tb)) = (&spec_a.port_type, &spec_b.port_type) {
            if ta != tb {
                return Err(AhpError::PortTypeMismatch {
                    a: format!("{dev_a}.{ref_a}"),
                    a_type: ta.clone(),
                    b: format!("{dev_b}.{ref_b}"),
                    b_type: tb.clone(),
                });
            }
        }

        let id = LinkId::checked(self.links.len(), "link")?;
        let a = self.reserve(ida, &spec_a, ref_a)?;
        let b = match self.reserve(idb, &spec_b, ref_b) {
            Ok(end) => end,
            Err(err) => {
                self.release(&a);
                return Err(err);
            }
        };

        self.links.push(Link {
            a,
            b,
            latency: attrs.latency,
            direction: attrs.direction,
        });
        Ok(id)
    }

    /// `add_link` with default attributes.
    pub fn link(
        &mut self,
        dev_a: &str,
        port_a: impl Into<PortRef>,
        dev_b: &str,
        port_b: impl Into<PortRef>,
    ) -> AhpResult<LinkId> {
        self.add_link(dev_a, port_a, dev_b, port_b, LinkAttrs::default())
    }

    /// Declare that the enclosing assembly's port `exposed` is implemented by
    /// `device.port` of this graph.
    pub fn forward(
        &mut self,
        exposed: impl Into<PortRef>,
        device: &str,
        port: impl Into<PortRef>,
    ) -> AhpResult<()> {
        let exposed = exposed.into();
        if self.forwards.iter().any(|f| f.exposed == exposed) {
            return Err(AhpError::DuplicateForward {
                path: String::new(),
                port: exposed.to_string(),
            });
        }
        let port = port.into();
        let Some(&id) = self.by_name.get(device) else {
            return Err(AhpError::UnresolvedPort {
                path: String::new(),
                port: exposed.to_string(),
                reason: format!("forwards to unknown device {device}"),
            });
        };
        let Some(spec) = self.devices[id.slot()].port(&port.name).cloned() else {
            return Err(AhpError::UnresolvedPort {
                path: String::new(),
                port: exposed.to_string(),
                reason: format!("forwards to undeclared port {device}.{}", port.name),
            });
        };
        let target = self.reserve(id, &spec, port)?;
        self.forwards.push(Forward { exposed, target });
        Ok(())
    }

    /// Declare a device from which every other device should be reachable.
    pub fn mark_entry(&mut self, device: &str) -> AhpResult<()> {
        let id = self.id_of(device).ok_or_else(|| AhpError::UnknownDevice {
            path: device.to_string(),
        })?;
        if !self.entry_points.contains(&id) {
            self.entry_points.push(id);
        }
        Ok(())
    }

    /// Report unlinked ports and devices unreachable from the entry points.
    ///
    /// Warnings are also logged; none of them is fatal.
    pub fn validate(&self) -> Vec<GraphWarning> {
        let mut warnings = validate::unlinked_ports(
            self.devices
                .iter()
                .enumerate()
                .map(|(i, d)| (i, d.name.as_str(), d.ports.as_slice())),
            |i, port| DeviceId::from_usize(i).is_some_and(|id| self.is_linked(id, port)),
        );
        if !self.entry_points.is_empty() {
            let edges = self.links.iter().map(|l| (l.a.device.slot(), l.b.device.slot()));
            let entries = self.entry_points.iter().map(|e| e.slot());
            for i in validate::unreachable(self.devices.len(), entries, edges) {
                warnings.push(GraphWarning::Unreachable {
                    path: self.devices[i].name.clone(),
                });
            }
        }
        for w in &warnings {
            warn!("{w}");
        }
        warnings
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.slot())
    }

    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.id_of(name).and_then(|id| self.device(id))
    }

    pub fn id_of(&self, name: &str) -> Option<DeviceId> {
        self.by_name.get(name).copied()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn forwards(&self) -> &[Forward] {
        &self.forwards
    }

    pub fn entry_points(&self) -> &[DeviceId] {
        &self.entry_points
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device counts keyed by category (`type_model`).
    pub fn count_devices(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.devices {
            *counts.entry(d.category()).or_insert(0) += 1;
        }
        counts
    }

    /// Whether any link or forward uses `port` on `device`.
    pub fn is_linked(&self, device: DeviceId, port: &str) -> bool {
        self.occupied
            .get(&(device, port.to_string()))
            .is_some_and(|slots| !slots.is_empty())
    }

    fn lookup(&self, device: &str, port: PortRef) -> AhpResult<(DeviceId, PortRef, PortSpec)> {
        let id = self.id_of(device).ok_or_else(|| AhpError::UnknownDevice {
            path: device.to_string(),
        })?;
        let spec = self.devices[id.slot()]
            .port(&port.name)
            .cloned()
            .ok_or_else(|| AhpError::UnknownPort {
                path: device.to_string(),
                port: port.name.clone(),
            })?;
        Ok((id, port, spec))
    }

    /// Claim a slot on a port, enforcing its capacity.
    fn reserve(&mut self, device: DeviceId, spec: &PortSpec, port: PortRef) -> AhpResult<LinkEnd> {
        let path = self.devices[device.slot()].name.clone();
        let used = self
            .occupied
            .entry((device, spec.name.clone()))
            .or_default();

        if spec.is_single() {
            if let Some(slot) = port.slot {
                warn!(device = %path, port = %spec.name, slot, "single port given a slot number; ignoring it");
            }
            if !used.is_empty() {
                return Err(AhpError::PortCapacity {
                    path,
                    port: spec.name.clone(),
                    reason: "single port already linked".into(),
                });
            }
            used.insert(0);
            return Ok(LinkEnd {
                device,
                port: PortRef::new(spec.name.clone()),
            });
        }

        let slot = match port.slot {
            Some(n) => n,
            None => used.last().map_or(0, |m| m + 1),
        };
        if let Some(limit) = spec.limit() {
            if slot >= limit {
                return Err(AhpError::PortCapacity {
                    path,
                    port: spec.name.clone(),
                    reason: format!("slot {slot} exceeds limit {limit}"),
                });
            }
        }
        if !used.insert(slot) {
            return Err(AhpError::PortCapacity {
                path,
                port: spec.name.clone(),
                reason: format!("slot {slot} already linked"),
            });
        }
        Ok(LinkEnd {
            device,
            port: PortRef::slot(spec.name.clone(), slot),
        })
    }

    fn release(&mut self, end: &LinkEnd) {
        if let Some(used) = self.occupied.get_mut(&(end.device, end.port.name.clone())) {
            used.remove(&end.port.slot.unwrap_or(0));
        }
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
            .with_port(PortSpec::bounded("bus", 2))
    }

    #[test]
    fn duplicate_device_name() {
        let mut g = DeviceGraph::new();
        g.add_device(leaf("a")).unwrap();
        let err = g.add_device(leaf("a")).unwrap_err();
        assert_eq!(err, AhpError::DuplicateName { path: "a".into() });
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn model_attribute_clash_is_rejected() {
        let mut g = DeviceGraph::new();
        let err = g
            .add_device(leaf("a").with_model("v2").with_attr("model", "v1"))
            .unwrap_err();
        assert_eq!(err, AhpError::ConflictingModel { path: "a".into() });
        assert!(g.is_empty());
    }

    #[test]
    fn unknown_port_and_device() {
        let mut g = DeviceGraph::new();
        g.add_device(leaf("a")).unwrap();
        g.add_device(leaf("b")).unwrap();
        assert!(matches!(
            g.link("a", "nope", "b", "in"),
            Err(AhpError::UnknownPort { .. })
        ));
        assert!(matches!(
            g.link("a", "out", "zz", "in"),
            Err(AhpError::UnknownDevice { .. })
        ));
        assert!(g.links().is_empty());
    }

    #[test]
    fn single_port_capacity() {
        let mut g = DeviceGraph::new();
        for n in ["a", "b", "c"] {
            g.add_device(leaf(n)).unwrap();
        }
        g.link("a", "out", "b", "in").unwrap();
        let err = g.link("a", "out", "c", "in").unwrap_err();
        assert!(matches!(err, AhpError::PortCapacity { .. }));
        // c.in was not left reserved by the failed link
        g.link("b", "out", "c", "in").unwrap();
    }

    #[test]
    fn multi_port_slots_allocate_and_bound() {
        let mut g = DeviceGraph::new();
        for n in ["a", "b"] {
            g.add_device(leaf(n)).unwrap();
        }
        g.link("a", "bus", "b", ("bus", 1)).unwrap();
        assert_eq!(g.links()[0].a.port, PortRef::slot("bus", 0));
        assert_eq!(g.links()[0].b.port, PortRef::slot("bus", 1));

        g.link("a", "bus", "b", ("bus", 0)).unwrap();
        assert_eq!(g.links()[1].a.port, PortRef::slot("bus", 1));

        // a.bus is full
        let err = g.link("a", "bus", "b", "in").unwrap_err();
        assert!(matches!(err, AhpError::PortCapacity { .. }));

        // b.bus slot 0 is taken; a.in must be released again
        let err = g.link("a", "in", "b", ("bus", 0)).unwrap_err();
        assert!(matches!(err, AhpError::PortCapacity { .. }));
        g.link("a", "in", "b", "out").unwrap();
    }

    #[test]
    fn port_types_must_match() {
        let mut g = DeviceGraph::new();
        g.add_device(Device::component("a", "A").with_port(PortSpec::single("o").typed("str")))
            .unwrap();
        g.add_device(Device::component("b", "B").with_port(PortSpec::single("i").typed("int")))
            .unwrap();
        assert!(matches!(
            g.link("a", "o", "b", "i"),
            Err(AhpError::PortTypeMismatch { .. })
        ));
    }

    #[test]
    fn forward_validates_target() {
        let mut g = DeviceGraph::new();
        g.add_device(leaf("x")).unwrap();
        g.forward("P", "x", "in").unwrap();
        assert!(matches!(
            g.forward("P", "x", "out"),
            Err(AhpError::DuplicateForward { .. })
        ));
        assert!(matches!(
            g.forward("Q", "x", "missing"),
            Err(AhpError::UnresolvedPort { .. })
        ));
        assert!(matches!(
            g.forward("R", "ghost", "in"),
            Err(AhpError::UnresolvedPort { .. })
        ));
        // the forwarded port now counts as linked
        assert!(g.is_linked(g.id_of("x").unwrap(), "in"));
    }

    #[test]
    fn count_devices_by_category() {
        let mut g = DeviceGraph::new();
        g.add_device(leaf("a")).unwrap();
        g.add_device(leaf("b").with_model("fast")).unwrap();
        g.add_device(leaf("c")).unwrap();
        let counts = g.count_devices();
        assert_eq!(counts["Leaf"], 2);
        assert_eq!(counts["Leaf_fast"], 1);
    }
}
