//! Structured host model: global parameters, components with their placement,
//! and named links.
//!
//! A distributed host loads one document per rank. The per-rank view keeps the
//! rank's own components, every component linked to them, and the links that
//! touch the rank, so each process reads only its neighbourhood.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use ahp_core::{Attributes, FlatId, Partition};
use ahp_graph::{FlatGraph, FlatLink, PartitionState, SubComponent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EmitError, EmitResult};
use crate::mode::StructuredFormat;

/// Host parameters, stringified.
pub type Params = BTreeMap<String, String>;

/// Program option naming the host's self partitioner.
pub const PARTITIONER_OPTION: &str = "partitioner";
pub const SELF_PARTITIONER: &str = "sst.self";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOptions {
    /// Forwarded to the host unchanged.
    #[serde(default)]
    pub program_options: BTreeMap<String, String>,
    /// Used for links declared without a latency or with a zero latency.
    #[serde(default = "default_latency")]
    pub default_latency: String,
}

fn default_latency() -> String {
    "1ps".to_string()
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            program_options: BTreeMap::new(),
            default_latency: default_latency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostModel {
    pub program_options: BTreeMap<String, String>,
    /// One parameter set per graph attribute, named after the attribute.
    pub global_params: BTreeMap<String, Params>,
    pub components: Vec<ComponentRecord>,
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub params: Params,
    pub params_global_sets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<Partition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcomponents: Vec<SubComponentRecord>,
    /// Names of the links attached to this component.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubComponentRecord {
    pub slot_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_number: Option<u32>,
    pub params: Params,
    pub params_global_sets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcomponents: Vec<SubComponentRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub name: String,
    pub left: LinkEndRecord,
    pub right: LinkEndRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEndRecord {
    pub component: String,
    pub port: String,
    pub latency: String,
}

/// Build the host model of `graph`, or of one rank of it.
///
/// Filtering by rank requires a graph placed by a partitioner. Components keep
/// their insertion order and links keep theirs.
pub fn build_model(
    graph: &FlatGraph,
    options: &ModelOptions,
    rank: Option<u32>,
) -> EmitResult<HostModel> {
    let rank_count = match graph.partition_state() {
        PartitionState::Assigned { rank_count } => Some(rank_count),
        PartitionState::Unassigned | PartitionState::HostDeferred => None,
    };
    if let Some(r) = rank {
        match rank_count {
            None => {
                return Err(EmitError::RankFilter {
                    rank: r,
                    reason: "the graph has no rank assignment".into(),
                });
            }
            Some(n) if r >= n => {
                return Err(EmitError::RankFilter {
                    rank: r,
                    reason: format!("only {n} ranks were assigned"),
                });
            }
            Some(_) => {}
        }
    }

    let mut program_options = options.program_options.clone();
    if rank_count.is_some_and(|n| n > 1) {
        program_options.insert(PARTITIONER_OPTION.into(), SELF_PARTITIONER.into());
    }

    let global_params: BTreeMap<String, Params> = graph
        .attributes()
        .iter()
        .map(|(k, v)| (k.clone(), Params::from([(k.clone(), v.to_string())])))
        .collect();
    let global_sets: Vec<String> = global_params.keys().cloned().collect();

    let on_rank = |id: FlatId| match rank {
        None => true,
        Some(r) => graph
            .component(id)
            .and_then(|c| c.partition)
            .is_some_and(|p| p.rank == r),
    };

    let mut linked: HashSet<FlatId> = HashSet::new();
    let mut attached: HashMap<FlatId, Vec<String>> = HashMap::new();
    let mut links = Vec::new();
    for link in graph.links() {
        if !on_rank(link.a.component) && !on_rank(link.b.component) {
            continue;
        }
        let record = link_record(graph, link, &options.default_latency)?;
        attached
            .entry(link.a.component)
            .or_default()
            .push(record.name.clone());
        if link.b.component != link.a.component {
            attached
                .entry(link.b.component)
                .or_default()
                .push(record.name.clone());
        }
        linked.insert(link.a.component);
        linked.insert(link.b.component);
        links.push(record);
    }

    let mut components = Vec::new();
    for (index, comp) in graph.components().iter().enumerate() {
        let id = FlatId::checked(index, "component")?;
        if !on_rank(id) && !linked.contains(&id) {
            continue;
        }
        components.push(ComponentRecord {
            name: comp.name.clone(),
            type_name: comp.type_name.clone(),
            params: params(&comp.attributes, comp.model.as_deref()),
            params_global_sets: global_sets.clone(),
            partition: comp.partition,
            subcomponents: comp
                .subcomponents
                .iter()
                .map(|s| sub_record(s, &global_sets))
                .collect(),
            links: attached.remove(&id).unwrap_or_default(),
        });
    }

    debug!(
        rank = ?rank,
        components = components.len(),
        links = links.len(),
        "built host model"
    );
    Ok(HostModel {
        program_options,
        global_params,
        components,
        links,
    })
}

/// Attributes as host parameters, plus `model` when set. Graph construction rejects
/// a device carrying both, so nothing is overwritten here.
fn params(attributes: &Attributes, model: Option<&str>) -> Params {
    let mut out: Params = attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    if let Some(model) = model {
        out.insert("model".into(), model.to_string());
    }
    out
}

fn sub_record(sub: &SubComponent, global_sets: &[String]) -> SubComponentRecord {
    let dev = &sub.device;
    SubComponentRecord {
        slot_name: sub.slot_name.clone(),
        type_name: dev.type_name.clone(),
        slot_number: sub.slot_index,
        params: params(&dev.attributes, dev.model.as_deref()),
        params_global_sets: global_sets.to_vec(),
        subcomponents: dev
            .subcomponents
            .iter()
            .map(|s| sub_record(s, global_sets))
            .collect(),
    }
}

fn link_record(graph: &FlatGraph, link: &FlatLink, default: &str) -> EmitResult<LinkRecord> {
    let a = graph.endpoint(&link.a)?;
    let b = graph.endpoint(&link.b)?;
    let port_a = graph.port_name(&link.a)?;
    let port_b = graph.port_name(&link.b)?;

    let latency = match link.latency.as_deref() {
        Some(l) if !is_zero_latency(l) => l.to_string(),
        _ => default.to_string(),
    };
    let end_a = format!("{}.{port_a}", a.name);
    let end_b = format!("{}.{port_b}", b.name);
    let name = if end_a <= end_b {
        format!("{end_a}__{latency}__{end_b}")
    } else {
        format!("{end_b}__{latency}__{end_a}")
    };

    Ok(LinkRecord {
        name,
        left: LinkEndRecord {
            component: a.name.clone(),
            port: port_a,
            latency: latency.clone(),
        },
        right: LinkEndRecord {
            component: b.name.clone(),
            port: port_b,
            latency,
        },
    })
}

/// `0s`, `0.0ns` and an empty string all mean "no latency given".
fn is_zero_latency(latency: &str) -> bool {
    let number = latency
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic());
    number.is_empty() || number.parse::<f64>().is_ok_and(|v| v == 0.0)
}

pub fn render_model(model: &HostModel, format: StructuredFormat) -> EmitResult<String> {
    Ok(match format {
        StructuredFormat::Json => serde_json::to_string_pretty(model)?,
        StructuredFormat::Yaml => serde_yaml::to_string(model)?,
    })
}

/// File name of one rank's document: the rank goes before the extension.
pub fn rank_file_name(path: &Path, rank: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{rank}.{}", ext.to_string_lossy()),
        None => format!("{stem}{rank}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_latencies() {
        assert!(is_zero_latency("0s"));
        assert!(is_zero_latency("0.0ns"));
        assert!(is_zero_latency(""));
        assert!(!is_zero_latency("10ns"));
        assert!(!is_zero_latency("1e-9s"));
    }

    #[test]
    fn rank_goes_before_extension() {
        assert_eq!(
            rank_file_name(Path::new("out/model.json"), 3),
            PathBuf::from("out/model3.json")
        );
        assert_eq!(rank_file_name(Path::new("model"), 0), PathBuf::from("model0"));
    }

    #[test]
    fn params_carry_model() {
        let mut attrs = Attributes::new();
        attrs.insert("size".into(), 4.into());
        let p = params(&attrs, Some("fast"));
        assert_eq!(p["size"], "4");
        assert_eq!(p["model"], "fast");
    }
}
