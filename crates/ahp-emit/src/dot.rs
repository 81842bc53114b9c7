//! Graphviz output.
//!
//! The flat view draws a lowered graph as one file. The hierarchical view
//! walks the device graph and writes one file per distinct assembly category;
//! assembly nodes link to the file of their category, and an assembly's own
//! ports appear as diamonds next to the cluster of its interior.
//!
//! Node labels list, in order: name, type, ports (`name:type` when typed), then
//! attributes sorted by key, with `model` first.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use ahp_core::{AhpError, Attributes, qualify};
use ahp_graph::{Device, DeviceGraph, FlatGraph, LinkDirection, LinkEnd, PortSpec, SubComponent};
use serde::{Deserialize, Serialize};

use crate::error::EmitResult;

/// Stylesheet referenced by every dot file, for hover highlighting in SVG output.
pub const HIGHLIGHT_STYLE: &str = ".edge:hover text {\n\tfill: red;\n}\n\
.edge:hover path, .node:hover polygon, .node:hover ellipse {\n\tstroke: red;\n\tstroke-width: 10;\n}\n";

pub const STYLESHEET_FILE: &str = "highlightStyle.css";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotOptions {
    /// Draw record-shaped nodes with one field per port.
    #[serde(default)]
    pub ports: bool,
    /// One file per assembly category instead of a single flat file.
    #[serde(default = "yes")]
    pub hierarchy: bool,
}

fn yes() -> bool {
    true
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            ports: false,
            hierarchy: true,
        }
    }
}

/// One rendered dot document; written as `<name>.dot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotFile {
    pub name: String,
    pub text: String,
}

impl DotFile {
    pub fn file_name(&self) -> String {
        format!("{}.dot", self.name)
    }
}

/// Draw a lowered graph.
pub fn flat_dot(graph: &FlatGraph, name: &str, options: DotOptions) -> EmitResult<DotFile> {
    let mut w = DotWriter::new(name, options.ports);
    for comp in graph.components() {
        let label = label(
            &comp.name,
            &comp.type_name,
            comp.model.as_deref(),
            &comp.ports,
            &comp.attributes,
            options.ports,
        );
        w.node(&comp.name, &label, &[]);
        w.subcomponents(&comp.name, &comp.subcomponents, options.ports);
    }

    let mut edges = EdgeSet::default();
    for link in graph.links() {
        let a = graph.endpoint(&link.a)?;
        let b = graph.endpoint(&link.b)?;
        edges.add(
            NodeRef::new(&a.name, &link.a.port.name, options.ports),
            NodeRef::new(&b.name, &link.b.port.name, options.ports),
            link.direction,
        );
    }
    edges.write_to(&mut w);
    Ok(DotFile {
        name: name.to_string(),
        text: w.finish(),
    })
}

/// Draw a device graph level by level, expanding each assembly category once.
///
/// The first file is the top level, named `name`; the others are named after
/// the category they draw.
pub fn hierarchy_dot(root: &DeviceGraph, name: &str, options: DotOptions) -> EmitResult<Vec<DotFile>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    write_level(root, name, None, options, &mut seen, &mut files)?;
    Ok(files)
}

fn write_level(
    graph: &DeviceGraph,
    name: &str,
    owner: Option<&Device>,
    options: DotOptions,
    seen: &mut HashSet<String>,
    files: &mut Vec<DotFile>,
) -> EmitResult<()> {
    let mut w = DotWriter::new(name, options.ports);

    if let Some(owner) = owner {
        for port in &owner.ports {
            w.node(
                &exposed_node(owner, &port.name),
                &port.name,
                &[("shape", "diamond"), ("color", "green"), ("fontcolor", "green")],
            );
        }
        w.open_cluster(&format!("cluster_{}", owner.type_name), "green");
    }

    for dev in graph.devices() {
        let label = label(
            &dev.name,
            &dev.type_name,
            dev.model.as_deref(),
            &dev.ports,
            &dev.attributes,
            options.ports,
        );
        if dev.is_assembly() {
            let href = format!("{}.svg", dev.category());
            w.node(
                &dev.name,
                &label,
                &[("href", href.as_str()), ("color", "blue"), ("fontcolor", "blue")],
            );
        } else {
            w.node(&dev.name, &label, &[]);
            w.subcomponents(&dev.name, &dev.subcomponents, options.ports);
        }
    }

    if owner.is_some() {
        w.close_cluster();
    }

    let mut edges = EdgeSet::default();
    for link in graph.links() {
        edges.add(
            level_node(graph, &link.a, options.ports)?,
            level_node(graph, &link.b, options.ports)?,
            link.direction,
        );
    }
    if let Some(owner) = owner {
        for fwd in graph.forwards() {
            edges.add(
                NodeRef {
                    node: exposed_node(owner, &fwd.exposed.name),
                    port: None,
                },
                level_node(graph, &fwd.target, options.ports)?,
                LinkDirection::Bidirectional,
            );
        }
    }
    edges.write_to(&mut w);

    files.push(DotFile {
        name: name.to_string(),
        text: w.finish(),
    });

    for dev in graph.devices() {
        if !dev.is_assembly() {
            continue;
        }
        let category = dev.category();
        if !seen.insert(category.clone()) {
            continue;
        }
        if let Some(inner) = dev.expand().map_err(|e| e.within(&dev.name))? {
            write_level(inner, &category, Some(dev), options, seen, files)?;
        }
    }
    Ok(())
}

fn exposed_node(owner: &Device, port: &str) -> String {
    format!("{}:{port}", owner.type_name)
}

fn level_node(graph: &DeviceGraph, end: &LinkEnd, ports: bool) -> EmitResult<NodeRef> {
    let dev = graph
        .device(end.device)
        .ok_or_else(|| AhpError::invariant(format!("link references missing device {}", end.device)))?;
    Ok(NodeRef::new(&dev.name, &end.port.name, ports))
}

fn label(
    name: &str,
    type_name: &str,
    model: Option<&str>,
    ports: &[PortSpec],
    attributes: &Attributes,
    record: bool,
) -> String {
    let text = |s: &str| if record { record_escape(s) } else { s.to_string() };
    let port_text = |p: &PortSpec| match &p.port_type {
        Some(t) => format!("{}:{t}", p.name),
        None => p.name.clone(),
    };

    let mut head = vec![text(name), text(type_name)];
    let mut attrs = Vec::with_capacity(attributes.len() + 1);
    if let Some(model) = model {
        attrs.push(text(&format!("model={model}")));
    }
    attrs.extend(attributes.iter().map(|(k, v)| text(&format!("{k}={v}"))));

    if !record {
        if !ports.is_empty() {
            let list: Vec<String> = ports.iter().map(port_text).collect();
            head.push(list.join(", "));
        }
        head.extend(attrs);
        return head.join("\\n");
    }

    let mut fields = vec![head.join("\\n")];
    if !ports.is_empty() {
        let cells: Vec<String> = ports
            .iter()
            .map(|p| format!("<{}> {}", record_escape(&p.name), text(&port_text(p))))
            .collect();
        fields.push(format!("{{{}}}", cells.join("|")));
    }
    if !attrs.is_empty() {
        fields.push(attrs.join("\\n"));
    }
    fields.join("|")
}

/// Record labels give `{ } | < >` a meaning of their own.
fn record_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '{' | '}' | '|' | '<' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct NodeRef {
    node: String,
    port: Option<String>,
}

impl NodeRef {
    fn new(node: &str, port: &str, with_port: bool) -> Self {
        Self {
            node: node.to_string(),
            port: with_port.then(|| port.to_string()),
        }
    }

    fn render(&self) -> String {
        match &self.port {
            Some(port) => format!("{}:{}", quote(&self.node), quote(port)),
            None => quote(&self.node),
        }
    }
}

type EdgeKey = (NodeRef, NodeRef, bool);

/// Parallel edges collapse into one, labelled with their count.
#[derive(Default)]
struct EdgeSet {
    order: Vec<EdgeKey>,
    counts: HashMap<EdgeKey, usize>,
}

impl EdgeSet {
    fn add(&mut self, a: NodeRef, b: NodeRef, direction: LinkDirection) {
        let directed = direction == LinkDirection::Forward;
        let key = if !directed && b < a { (b, a, directed) } else { (a, b, directed) };
        let count = self.counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            self.order.push(key);
        }
        *count += 1;
    }

    fn write_to(&self, w: &mut DotWriter) {
        for key in &self.order {
            let (a, b, directed) = key;
            let count = self.counts.get(key).copied().unwrap_or(1);
            let mut attrs = Vec::new();
            if count > 1 {
                attrs.push(format!("label={}", quote(&count.to_string())));
            }
            if *directed {
                attrs.push("dir=forward".to_string());
            }
            w.edge(&a.render(), &b.render(), &attrs);
        }
    }
}

struct DotWriter {
    out: String,
    indent: usize,
}

impl DotWriter {
    fn new(name: &str, record: bool) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "graph {} {{", quote(name));
        if record {
            let _ = writeln!(out, "\tgraph [rankdir=LR, stylesheet={}];", quote(STYLESHEET_FILE));
            let _ = writeln!(out, "\tnode [fillcolor=\"#EEEEEE\", shape=record, style=filled];");
        } else {
            let _ = writeln!(out, "\tgraph [stylesheet={}];", quote(STYLESHEET_FILE));
            let _ = writeln!(out, "\tnode [fillcolor=\"#EEEEEE\", style=filled];");
        }
        let _ = writeln!(out, "\tedge [penwidth=2];");
        Self { out, indent: 1 }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn node(&mut self, id: &str, label: &str, attrs: &[(&str, &str)]) {
        let mut parts = vec![format!("label={}", quote(label))];
        parts.extend(attrs.iter().map(|(k, v)| format!("{k}={}", quote(v))));
        self.line(&format!("{} [{}];", quote(id), parts.join(", ")));
    }

    fn edge(&mut self, a: &str, b: &str, attrs: &[String]) {
        if attrs.is_empty() {
            self.line(&format!("{a} -- {b};"));
        } else {
            self.line(&format!("{a} -- {b} [{}];", attrs.join(", ")));
        }
    }

    /// Subcomponents hang off their owner on dashed purple edges.
    fn subcomponents(&mut self, owner: &str, subs: &[SubComponent], ports: bool) {
        for sub in subs {
            let id = qualify(owner, &sub.device.name);
            let dev = &sub.device;
            let label = label(
                &id,
                &dev.type_name,
                dev.model.as_deref(),
                &dev.ports,
                &dev.attributes,
                ports,
            );
            self.node(&id, &label, &[("color", "purple"), ("fontcolor", "purple")]);
            self.line(&format!(
                "{} -- {} [color=purple, style=dashed];",
                quote(&id),
                quote(owner)
            ));
            self.subcomponents(&id, &sub.device.subcomponents, ports);
        }
    }

    fn open_cluster(&mut self, name: &str, color: &str) {
        self.line(&format!("subgraph {} {{", quote(name)));
        self.indent += 1;
        self.line(&format!("color={};", quote(color)));
    }

    fn close_cluster(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    fn finish(mut self) -> String {
        self.out.push_str("}\n");
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(name: &str) -> NodeRef {
        NodeRef {
            node: name.into(),
            port: None,
        }
    }

    #[test]
    fn parallel_edges_are_counted_once() {
        let mut edges = EdgeSet::default();
        edges.add(n("b"), n("a"), LinkDirection::Bidirectional);
        edges.add(n("a"), n("b"), LinkDirection::Bidirectional);
        edges.add(n("b"), n("a"), LinkDirection::Forward);
        let mut w = DotWriter::new("g", false);
        edges.write_to(&mut w);
        let text = w.finish();
        assert!(text.contains("\"a\" -- \"b\" [label=\"2\"];"));
        assert!(text.contains("\"b\" -- \"a\" [dir=forward];"));
    }

    #[test]
    fn labels_list_name_type_ports_then_attributes() {
        let ports = vec![PortSpec::single("in"), PortSpec::multi("out").typed("Event")];
        let mut attrs = Attributes::new();
        attrs.insert("speed".into(), 3_i64.into());
        attrs.insert("cores".into(), 2_i64.into());
        assert_eq!(
            label("cpu", "hw.Core", Some("fast"), &ports, &attrs, false),
            "cpu\\nhw.Core\\nin, out:Event\\nmodel=fast\\ncores=2\\nspeed=3"
        );
        assert_eq!(
            label("cpu", "hw.Core", None, &ports, &attrs, true),
            "cpu\\nhw.Core|{<in> in|<out> out:Event}|cores=2\\nspeed=3"
        );
        assert_eq!(label("l", "Leaf", None, &[], &Attributes::new(), true), "l\\nLeaf");
    }

    #[test]
    fn record_labels_escape_field_separators() {
        let mut attrs = Attributes::new();
        attrs.insert("route".into(), "a|b".into());
        assert_eq!(
            label("n", "T<1>", None, &[], &attrs, true),
            "n\\nT\\<1\\>|route=a\\|b"
        );
    }

    #[test]
    fn record_header_switches_layout() {
        let text = DotWriter::new("g", true).finish();
        assert!(text.contains("rankdir=LR"));
        assert!(text.contains("shape=record"));
        assert!(text.starts_with("graph \"g\" {"));
    }
}
