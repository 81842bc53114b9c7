//! Content hash of a lowered graph.

use ahp_graph::FlatGraph;
use sha2::{Digest, Sha256};

use crate::error::EmitResult;
use crate::model::{ModelOptions, build_model};

/// SHA-256 of the graph's full host model, as lowercase hex.
///
/// Processes that built the same hierarchy with the same partitioner get the
/// same digest, which lets ranks confirm agreement before loading.
pub fn digest(graph: &FlatGraph) -> EmitResult<String> {
    let model = build_model(graph, &ModelOptions::default(), None)?;
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&model)?);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahp_graph::{Device, DeviceGraph, PortSpec, flatten};

    fn graph(latency: &str) -> FlatGraph {
        let mut g = DeviceGraph::new();
        g.add_device(Device::component("a", "T").with_port(PortSpec::single("p")))
            .unwrap();
        g.add_device(Device::component("b", "T").with_port(PortSpec::single("p")))
            .unwrap();
        g.add_link("a", "p", "b", "p", ahp_graph::LinkAttrs::latency(latency))
            .unwrap();
        flatten(&g).unwrap()
    }

    #[test]
    fn digest_is_stable() {
        let d1 = digest(&graph("5ns")).unwrap();
        let d2 = digest(&graph("5ns")).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
    }

    #[test]
    fn digest_differs_for_different_graphs() {
        assert_ne!(digest(&graph("5ns")).unwrap(), digest(&graph("6ns")).unwrap());
    }
}
