//! Built-in demo architectures.

use ahp_core::{AhpError, AhpResult};
use ahp_graph::{Device, DeviceGraph, LinkAttrs, PortSpec};

/// Knobs shared by the demo architectures.
#[derive(Debug, Clone, Copy)]
pub struct ArchParams {
    /// Number of top-level assemblies.
    pub count: u32,
    /// Round trips per ping-pong pair.
    pub repeats: u32,
}

pub struct Architecture {
    pub name: &'static str,
    pub about: &'static str,
    build: fn(&ArchParams) -> AhpResult<DeviceGraph>,
}

impl Architecture {
    pub fn build(&self, params: &ArchParams) -> AhpResult<DeviceGraph> {
        (self.build)(params)
    }
}

pub const ARCHITECTURES: &[Architecture] = &[
    Architecture {
        name: "pingpong",
        about: "ring of ping/pong assemblies",
        build: pingpong,
    },
    Architecture {
        name: "two-assemblies",
        about: "two assemblies sharing a row of multi-port devices",
        build: two_assemblies,
    },
];

pub fn find(name: &str) -> Option<&'static Architecture> {
    ARCHITECTURES.iter().find(|a| a.name == name)
}

fn string_port(name: &str) -> PortSpec {
    PortSpec::single(name).typed("String")
}

fn pingpong_pair(name: &str, repeats: u32) -> Device {
    Device::assembly(name, "pingpong", |attrs| {
        let model = attrs.get("repeats").map(|v| v.to_string());
        let mut ping = Device::component("Ping", "pingpong.Ping")
            .with_port(string_port("input"))
            .with_port(string_port("output"));
        if let Some(model) = model {
            ping = ping.with_model(model);
        }
        let pong = Device::component("Pong", "pingpong.Pong")
            .with_port(string_port("input"))
            .with_port(string_port("output"));

        let mut g = DeviceGraph::new();
        g.add_device(ping)?;
        g.add_device(pong)?;
        g.add_link("Ping", "output", "Pong", "input", LinkAttrs::latency("1s"))?;
        g.forward("input", "Ping", "input")?;
        g.forward("output", "Pong", "output")?;
        Ok(g)
    })
    .with_model(repeats.to_string())
    .with_attr("repeats", repeats)
    .with_port(string_port("input"))
    .with_port(string_port("output"))
}

/// Ping-pong pairs linked output to input in a loop.
pub fn pingpong(params: &ArchParams) -> AhpResult<DeviceGraph> {
    if params.count == 0 {
        return Err(AhpError::InvalidConfig {
            what: "pingpong needs at least one pair".into(),
        });
    }
    let mut graph = DeviceGraph::new();
    for i in 0..params.count {
        graph.add_device(pingpong_pair(&format!("PingPong{i}"), params.repeats))?;
    }
    for i in 0..params.count {
        let next = (i + 1) % params.count;
        graph.add_link(
            &format!("PingPong{i}"),
            "output",
            &format!("PingPong{next}"),
            "input",
            LinkAttrs::latency("2s"),
        )?;
    }
    Ok(graph)
}

const DEVICE_C_COUNT: u32 = 2;
const LINKS_PER_B: u32 = 10;

fn group(name: &str) -> Device {
    Device::assembly(name, "Assembly", |_| {
        let mut g = DeviceGraph::new();
        g.add_device(
            Device::component("DEVA", "none.DeviceAComponent").with_port(
                PortSpec::bounded("a2b_inout", LINKS_PER_B * DEVICE_C_COUNT).typed("String"),
            ),
        )?;
        for i in 0..DEVICE_C_COUNT {
            let b = format!("DEVB{i}");
            g.add_device(
                Device::component(b.as_str(), "none.DeviceBComponent")
                    .with_port(PortSpec::bounded("a2b_inout", LINKS_PER_B).typed("String"))
                    .with_port(string_port("b2c_inout")),
            )?;
            for j in 0..LINKS_PER_B {
                g.link("DEVA", ("a2b_inout", i * LINKS_PER_B + j), &b, ("a2b_inout", j))?;
            }
            g.forward(("b2c_inout", i), &b, "b2c_inout")?;
        }
        Ok(g)
    })
    .with_port(PortSpec::bounded("b2c_inout", DEVICE_C_COUNT).typed("String"))
}

/// Two identical assemblies, each reaching every `DEVC` through one exposed slot.
pub fn two_assemblies(params: &ArchParams) -> AhpResult<DeviceGraph> {
    let assemblies = params.count.max(1);
    let mut graph = DeviceGraph::new();
    for i in 0..assemblies {
        graph.add_device(group(&format!("Assembly{i}")))?;
    }
    for dev in 0..DEVICE_C_COUNT {
        let c = format!("DEVC{dev}");
        graph.add_device(
            Device::component(c.as_str(), "none.DeviceCComponent")
                .with_port(PortSpec::bounded("b2c_inout", 2 * DEVICE_C_COUNT).typed("String")),
        )?;
        for i in 0..assemblies.min(2 * DEVICE_C_COUNT) {
            graph.link(&format!("Assembly{i}"), ("b2c_inout", dev), &c, ("b2c_inout", i))?;
        }
    }
    Ok(graph)
}
