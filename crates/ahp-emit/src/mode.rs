//! Output selection.

use std::fmt;
use std::str::FromStr;

use ahp_core::AhpError;
use serde::{Deserialize, Serialize};

/// Which kind of output the emitter produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmitMode {
    /// Graphviz dot text.
    #[default]
    Text,
    /// Host model as JSON or YAML.
    Structured,
    /// Construction calls against an in-process host.
    InProcess,
}

impl FromStr for EmitMode {
    type Err = AhpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "dot" => Ok(EmitMode::Text),
            "structured" => Ok(EmitMode::Structured),
            "in-process" | "inprocess" => Ok(EmitMode::InProcess),
            other => Err(AhpError::InvalidConfig {
                what: format!("unknown emit mode '{other}'"),
            }),
        }
    }
}

impl fmt::Display for EmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EmitMode::Text => "text",
            EmitMode::Structured => "structured",
            EmitMode::InProcess => "in-process",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredFormat {
    #[default]
    Json,
    Yaml,
}

impl StructuredFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StructuredFormat::Json => "json",
            StructuredFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for StructuredFormat {
    type Err = AhpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(StructuredFormat::Json),
            "yaml" | "yml" => Ok(StructuredFormat::Yaml),
            other => Err(AhpError::InvalidConfig {
                what: format!("unknown structured format '{other}'"),
            }),
        }
    }
}
