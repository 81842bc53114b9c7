//! Shared application service layer for ahp-graph.
//!
//! Turns a built hierarchy and a pipeline configuration into host artefacts:
//! flatten, partition, render, and only then write. Every artefact is rendered
//! in memory before the first file is touched, so a failing pass leaves no
//! partial output behind.

pub mod config_service;
pub mod error;
pub mod pipeline;

pub use config_service::{ConfigOverrides, load_config};
pub use error::{AppError, AppResult};
pub use pipeline::{
    EmitOutput, FlattenSummary, OutputFile, PipelineSummary, build_in_host, graph_digest,
    prepare, run_pipeline, summarize, write_output,
};
