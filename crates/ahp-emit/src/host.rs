//! Construction calls against a host running in the same process.
//!
//! The calls are driven from a [`HostModel`], so in-process construction sees
//! exactly what a structured document would carry, in the same order: program
//! options, global parameters, components (each followed by its subcomponents),
//! then links.

use std::collections::HashMap;
use std::fmt;

use ahp_core::{AhpError, Partition};
use ahp_graph::FlatGraph;
use tracing::info;

use crate::error::EmitResult;
use crate::model::{HostModel, ModelOptions, Params, SubComponentRecord, build_model};

/// One side of a host connection.
#[derive(Debug, Clone, Copy)]
pub struct HostEndpoint<'a, H> {
    pub handle: &'a H,
    pub port: &'a str,
    pub latency: &'a str,
}

/// The construction surface of a simulation host.
pub trait HostApi {
    /// Host-side reference to an instantiated component or subcomponent.
    type Handle;

    fn set_program_option(&mut self, _key: &str, _value: &str) -> EmitResult<()> {
        Ok(())
    }

    fn add_global_param(&mut self, set: &str, key: &str, value: &str) -> EmitResult<()>;

    fn instantiate(
        &mut self,
        name: &str,
        type_name: &str,
        params: &Params,
        global_sets: &[String],
        partition: Option<Partition>,
    ) -> EmitResult<Self::Handle>;

    fn set_subcomponent(
        &mut self,
        parent: &Self::Handle,
        slot_name: &str,
        slot_number: Option<u32>,
        type_name: &str,
        params: &Params,
        global_sets: &[String],
    ) -> EmitResult<Self::Handle>;

    fn connect(
        &mut self,
        link: &str,
        a: HostEndpoint<'_, Self::Handle>,
        b: HostEndpoint<'_, Self::Handle>,
    ) -> EmitResult<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub components: usize,
    pub subcomponents: usize,
    pub links: usize,
}

/// Build `graph` (or one rank of it) inside `host`.
pub fn build_in_process<H: HostApi>(
    graph: &FlatGraph,
    options: &ModelOptions,
    rank: Option<u32>,
    host: &mut H,
) -> EmitResult<BuildSummary> {
    let model = build_model(graph, options, rank)?;
    replay(&model, host)
}

/// Issue the calls that construct `model`.
pub fn replay<H: HostApi>(model: &HostModel, host: &mut H) -> EmitResult<BuildSummary> {
    let mut summary = BuildSummary::default();

    for (key, value) in &model.program_options {
        host.set_program_option(key, value)?;
    }
    for (set, params) in &model.global_params {
        for (key, value) in params {
            host.add_global_param(set, key, value)?;
        }
    }

    let mut handles: HashMap<&str, H::Handle> = HashMap::new();
    for comp in &model.components {
        let handle = host.instantiate(
            &comp.name,
            &comp.type_name,
            &comp.params,
            &comp.params_global_sets,
            comp.partition,
        )?;
        summary.subcomponents += attach(host, &handle, &comp.subcomponents)?;
        handles.insert(comp.name.as_str(), handle);
        summary.components += 1;
    }

    for link in &model.links {
        let lookup = |name: &str| {
            handles.get(name).ok_or_else(|| {
                AhpError::invariant(format!("link {} references unknown component {name}", link.name))
            })
        };
        let a = lookup(&link.left.component)?;
        let b = lookup(&link.right.component)?;
        host.connect(
            &link.name,
            HostEndpoint {
                handle: a,
                port: &link.left.port,
                latency: &link.left.latency,
            },
            HostEndpoint {
                handle: b,
                port: &link.right.port,
                latency: &link.right.latency,
            },
        )?;
        summary.links += 1;
    }

    info!(
        components = summary.components,
        subcomponents = summary.subcomponents,
        links = summary.links,
        "built graph in host"
    );
    Ok(summary)
}

fn attach<H: HostApi>(host: &mut H, parent: &H::Handle, subs: &[SubComponentRecord]) -> EmitResult<usize> {
    let mut count = 0;
    for sub in subs {
        let handle = host.set_subcomponent(
            parent,
            &sub.slot_name,
            sub.slot_number,
            &sub.type_name,
            &sub.params,
            &sub.params_global_sets,
        )?;
        count += 1 + attach(host, &handle, &sub.subcomponents)?;
    }
    Ok(count)
}

/// A call received by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    ProgramOption {
        key: String,
        value: String,
    },
    GlobalParam {
        set: String,
        key: String,
        value: String,
    },
    Instantiate {
        name: String,
        type_name: String,
        params: Params,
        partition: Option<Partition>,
    },
    SubComponent {
        parent: String,
        slot_name: String,
        slot_number: Option<u32>,
        type_name: String,
    },
    Connect {
        link: String,
        a: (String, String),
        b: (String, String),
        latency: String,
    },
}

impl fmt::Display for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCall::ProgramOption { key, value } => write!(f, "option {key} = '{value}'"),
            HostCall::GlobalParam { set, key, value } => write!(f, "global {set}:{key} = '{value}'"),
            HostCall::Instantiate {
                name,
                type_name,
                params,
                partition,
            } => {
                write!(f, "component '{name}' of class '{type_name}'")?;
                if let Some(p) = partition {
                    write!(f, " on {p}")?;
                }
                for (key, value) in params {
                    write!(f, "\n    {name}:{key} = '{value}'")?;
                }
                Ok(())
            }
            HostCall::SubComponent {
                parent,
                slot_name,
                slot_number,
                type_name,
            } => {
                write!(f, "subcomponent '{parent}.{slot_name}")?;
                if let Some(n) = slot_number {
                    write!(f, "[{n}]")?;
                }
                write!(f, "' of class '{type_name}'")
            }
            HostCall::Connect { link, a, b, latency } => write!(
                f,
                "link '{link}' ({latency})\n    {}:{}\n    {}:{}",
                a.0, a.1, b.0, b.1
            ),
        }
    }
}

/// A host stand-in that records every call in order. Handles are the
/// qualified names of what was created.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    pub calls: Vec<HostCall>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The calls as a transcript, one call per entry.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for call in &self.calls {
            out.push_str(&call.to_string());
            out.push('\n');
        }
        out
    }
}

impl HostApi for RecordingHost {
    type Handle = String;

    fn set_program_option(&mut self, key: &str, value: &str) -> EmitResult<()> {
        self.calls.push(HostCall::ProgramOption {
            key: key.into(),
            value: value.into(),
        });
        Ok(())
    }

    fn add_global_param(&mut self, set: &str, key: &str, value: &str) -> EmitResult<()> {
        self.calls.push(HostCall::GlobalParam {
            set: set.into(),
            key: key.into(),
            value: value.into(),
        });
        Ok(())
    }

    fn instantiate(
        &mut self,
        name: &str,
        type_name: &str,
        params: &Params,
        _global_sets: &[String],
        partition: Option<Partition>,
    ) -> EmitResult<String> {
        self.calls.push(HostCall::Instantiate {
            name: name.into(),
            type_name: type_name.into(),
            params: params.clone(),
            partition,
        });
        Ok(name.to_string())
    }

    fn set_subcomponent(
        &mut self,
        parent: &String,
        slot_name: &str,
        slot_number: Option<u32>,
        type_name: &str,
        _params: &Params,
        _global_sets: &[String],
    ) -> EmitResult<String> {
        self.calls.push(HostCall::SubComponent {
            parent: parent.clone(),
            slot_name: slot_name.into(),
            slot_number,
            type_name: type_name.into(),
        });
        Ok(match slot_number {
            Some(n) => format!("{parent}.{slot_name}{n}"),
            None => format!("{parent}.{slot_name}"),
        })
    }

    fn connect(
        &mut self,
        link: &str,
        a: HostEndpoint<'_, String>,
        b: HostEndpoint<'_, String>,
    ) -> EmitResult<()> {
        self.calls.push(HostCall::Connect {
            link: link.into(),
            a: (a.handle.clone(), a.port.into()),
            b: (b.handle.clone(), b.port.into()),
            latency: a.latency.into(),
        });
        Ok(())
    }
}
