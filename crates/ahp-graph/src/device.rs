//! Devices: leaf components and composite assemblies.

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, OnceLock};

use ahp_core::{AhpError, AhpResult, AttrValue, Attributes, Partition, canonical_form};

use crate::graph::DeviceGraph;
use crate::port::PortSpec;

/// Builds the interior of an assembly from the assembly's own attributes.
///
/// Builders must be pure: the same attributes always produce the same graph. Every
/// rank of a distributed run rebuilds the hierarchy independently and relies on this.
pub type BuilderFn = dyn Fn(&Attributes) -> AhpResult<DeviceGraph> + Send + Sync;

/// The composite half of a device: a builder and its memoised result.
#[derive(Clone)]
pub struct Assembly {
    builder: Arc<BuilderFn>,
    /// Distinct for every builder function or closure expression.
    builder_type: TypeId,
    expansion: OnceLock<AhpResult<DeviceGraph>>,
}

impl Assembly {
    pub fn new<F>(builder: F) -> Self
    where
        F: Fn(&Attributes) -> AhpResult<DeviceGraph> + Send + Sync + 'static,
    {
        Self {
            builder: Arc::new(builder),
            builder_type: TypeId::of::<F>(),
            expansion: OnceLock::new(),
        }
    }

    /// Invoke the builder on first use; later calls return the same graph.
    pub fn expand(&self, attributes: &Attributes) -> AhpResult<&DeviceGraph> {
        match self.expansion.get_or_init(|| (self.builder)(attributes)) {
            Ok(graph) => Ok(graph),
            Err(err) => Err(err.clone()),
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expansion.get().is_some()
    }

    pub fn builder_type(&self) -> TypeId {
        self.builder_type
    }
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("expanded", &self.is_expanded())
            .finish_non_exhaustive()
    }
}

/// Component or assembly.
#[derive(Debug, Clone)]
pub enum DeviceKind {
    /// A leaf mapped directly onto a host model.
    Component,
    /// Replaced by its builder's graph during flattening.
    Assembly(Assembly),
}

/// A device owned by another component's slot. Travels with its owner.
#[derive(Debug, Clone)]
pub struct SubComponent {
    pub slot_name: String,
    pub slot_index: Option<u32>,
    pub device: Device,
}

/// A node in a `DeviceGraph`.
#[derive(Debug, Clone)]
pub struct Device {
    /// Unique within the immediately containing graph.
    pub name: String,
    /// Tag of the external model this device maps to.
    pub type_name: String,
    pub model: Option<String>,
    pub attributes: Attributes,
    pub ports: Vec<PortSpec>,
    pub subcomponents: Vec<SubComponent>,
    /// User-pinned placement; inherited by an assembly's interior.
    pub partition: Option<Partition>,
    pub kind: DeviceKind,
}

impl Device {
    fn new(name: impl Into<String>, type_name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            model: None,
            attributes: Attributes::new(),
            ports: Vec::new(),
            subcomponents: Vec::new(),
            partition: None,
            kind,
        }
    }

    pub fn component(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, type_name, DeviceKind::Component)
    }

    pub fn assembly<F>(name: impl Into<String>, type_name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&Attributes) -> AhpResult<DeviceGraph> + Send + Sync + 'static,
    {
        Self::new(name, type_name, DeviceKind::Assembly(Assembly::new(builder)))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_port(mut self, port: PortSpec) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Place `device` in one of this component's slots.
    ///
    /// Both devices must be components: an assembly has no host model to own or
    /// be owned.
    pub fn add_subcomponent(
        &mut self,
        slot_name: impl Into<String>,
        slot_index: Option<u32>,
        device: Device,
    ) -> AhpResult<()> {
        if self.is_assembly() {
            return Err(AhpError::InvalidSubComponent {
                path: self.name.clone(),
                reason: "an assembly cannot own subcomponents".into(),
            });
        }
        device.check_model()?;
        if device.is_assembly() {
            return Err(AhpError::InvalidSubComponent {
                path: device.name.clone(),
                reason: "a subcomponent must be a component".into(),
            });
        }
        self.subcomponents.push(SubComponent {
            slot_name: slot_name.into(),
            slot_index,
            device,
        });
        Ok(())
    }

    pub fn with_subcomponent(
        mut self,
        slot_name: impl Into<String>,
        slot_index: Option<u32>,
        device: Device,
    ) -> AhpResult<Self> {
        self.add_subcomponent(slot_name, slot_index, device)?;
        Ok(self)
    }

    /// The model travels to the host as the `model` parameter, so it cannot also
    /// be an attribute.
    pub fn check_model(&self) -> AhpResult<()> {
        if self.model.is_some() && self.attributes.contains_key("model") {
            return Err(AhpError::ConflictingModel {
                path: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn port(&self, name: &str) -> Option<&PortSpec> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn is_assembly(&self) -> bool {
        matches!(self.kind, DeviceKind::Assembly(_))
    }

    /// `type_model`, or just `type` without a model.
    pub fn category(&self) -> String {
        match &self.model {
            Some(model) => format!("{}_{}", self.type_name, model),
            None => self.type_name.clone(),
        }
    }

    /// Interior graph of an assembly (built on first call), `None` for a component.
    pub fn expand(&self) -> AhpResult<Option<&DeviceGraph>> {
        match &self.kind {
            DeviceKind::Component => Ok(None),
            DeviceKind::Assembly(assembly) => assembly.expand(&self.attributes).map(Some),
        }
    }

    /// Printable identity of an assembly: category plus canonical attributes.
    pub fn identity(&self) -> String {
        format!("{}{}", self.category(), canonical_form(&self.attributes))
    }

    /// Key under which a nested expansion of the same assembly is a containment cycle.
    ///
    /// Builders are pure functions of the attributes, so the same builder reached
    /// again with the same attributes would expand forever. Two different builders
    /// sharing a type name and attributes are unrelated. `None` for a component.
    pub fn cycle_key(&self) -> Option<(TypeId, String)> {
        match &self.kind {
            DeviceKind::Component => None,
            DeviceKind::Assembly(assembly) => Some((assembly.builder_type(), self.identity())),
        }
    }
}
