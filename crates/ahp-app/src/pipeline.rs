//! Flatten, partition, render, write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ahp_emit::{
    BuildSummary, EmitMode, HIGHLIGHT_STYLE, HostApi, RecordingHost, STYLESHEET_FILE,
    build_in_process, build_model, digest, flat_dot, hierarchy_dot, rank_file_name, render_model,
};
use ahp_graph::{DeviceGraph, FlatGraph, GraphWarning, PartitionState, flatten, flatten_rank};
use ahp_partition::{PartitionReport, partition};
use ahp_project::{PipelineConfig, validate_config};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// A rendered artefact, with its path relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub components: usize,
    pub links: usize,
    pub warnings: Vec<GraphWarning>,
    pub report: PartitionReport,
    /// Set when the graph was built in a host.
    pub host: Option<BuildSummary>,
}

/// Everything a pipeline run produced, still in memory.
#[derive(Debug, Clone)]
pub struct EmitOutput {
    pub files: Vec<OutputFile>,
    /// Call transcript of an in-process build.
    pub transcript: Option<String>,
    pub summary: PipelineSummary,
}

/// What the flattener made of a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenSummary {
    pub components: Vec<String>,
    pub links: usize,
    pub categories: BTreeMap<String, usize>,
    pub warnings: Vec<GraphWarning>,
}

/// Flatten and summarize without partitioning.
pub fn summarize(root: &DeviceGraph) -> AppResult<FlattenSummary> {
    let mut warnings = root.validate();
    let flat = flatten(root)?;
    warnings.extend(flat.validate());
    Ok(FlattenSummary {
        components: flat.components().iter().map(|c| c.name.clone()).collect(),
        links: flat.links().len(),
        categories: flat.count_devices(),
        warnings,
    })
}

/// Flatten `root` and place it according to `config`.
pub fn prepare(root: &DeviceGraph, config: &PipelineConfig) -> AppResult<(FlatGraph, PipelineSummary)> {
    let mut warnings = root.validate();
    let mut flat = match config.rank {
        Some(rank) if config.partial_expand => flatten_rank(root, rank)?,
        _ => flatten(root)?,
    };
    warnings.extend(flat.validate());
    let report = partition(&mut flat, &config.partition_config())?;

    info!(
        components = flat.len(),
        links = flat.links().len(),
        ranks_used = report.ranks_used,
        cross_rank_links = report.cross_rank_links,
        warnings = warnings.len(),
        "graph prepared"
    );
    let summary = PipelineSummary {
        components: flat.len(),
        links: flat.links().len(),
        warnings,
        report,
        host: None,
    };
    Ok((flat, summary))
}

/// Run the whole pipeline in memory. `name` becomes the stem of every file.
pub fn run_pipeline(root: &DeviceGraph, name: &str, config: &PipelineConfig) -> AppResult<EmitOutput> {
    if name.is_empty() {
        return Err(AppError::InvalidInput("output name must not be empty".into()));
    }
    validate_config(config)?;
    let (flat, mut summary) = prepare(root, config)?;

    let mut files = Vec::new();
    let mut transcript = None;
    match config.emit_mode {
        EmitMode::Text => {
            let dot = if config.dot.hierarchy {
                hierarchy_dot(root, name, config.dot)?
            } else {
                vec![flat_dot(&flat, name, config.dot)?]
            };
            files.extend(dot.into_iter().map(|f| OutputFile {
                path: PathBuf::from(f.file_name()),
                contents: f.text,
            }));
            files.push(OutputFile {
                path: PathBuf::from(STYLESHEET_FILE),
                contents: HIGHLIGHT_STYLE.to_string(),
            });
        }
        EmitMode::Structured => files = structured(&flat, name, config)?,
        EmitMode::InProcess => {
            let mut host = RecordingHost::new();
            summary.host = Some(build_in_process(
                &flat,
                &config.model_options(),
                config.rank,
                &mut host,
            )?);
            transcript = Some(host.transcript());
        }
    }

    info!(mode = %config.emit_mode, files = files.len(), "rendered output");
    Ok(EmitOutput {
        files,
        transcript,
        summary,
    })
}

/// One document per rank when the graph spans several ranks, one otherwise.
fn structured(flat: &FlatGraph, name: &str, config: &PipelineConfig) -> AppResult<Vec<OutputFile>> {
    let options = config.model_options();
    let base = PathBuf::from(format!("{name}.{}", config.structured_format.extension()));
    let ranks: Vec<Option<u32>> = match (config.rank, flat.partition_state()) {
        (Some(r), _) => vec![Some(r)],
        (None, PartitionState::Assigned { rank_count }) if rank_count > 1 => {
            (0..rank_count).map(Some).collect()
        }
        _ => vec![None],
    };

    ranks
        .into_par_iter()
        .map(|rank| -> AppResult<OutputFile> {
            let model = build_model(flat, &options, rank)?;
            let contents = render_model(&model, config.structured_format)?;
            let path = match rank {
                Some(r) => rank_file_name(&base, r),
                None => base.clone(),
            };
            Ok(OutputFile { path, contents })
        })
        .collect()
}

/// Write every file under `dir`. Nothing is rendered here, so the only
/// failures left are I/O.
///
/// Files are staged next to their targets and renamed into place once all of
/// them are on disk. On failure every staged or renamed file is removed again.
pub fn write_output(output: &EmitOutput, dir: &Path) -> AppResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| AppError::OutputWrite {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(output.files.len());
    for file in &output.files {
        let path = dir.join(&file.path);
        let partial = staging_path(&path);
        if let Err(e) = std::fs::write(&partial, &file.contents) {
            let _ = std::fs::remove_file(&partial);
            remove_all(staged.iter().map(|(p, _)| p));
            return Err(AppError::OutputWrite { path, source: e });
        }
        staged.push((partial, path));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (i, (partial, path)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(partial, path) {
            warn!(path = %path.display(), "output write failed, removing written files");
            remove_all(written.iter());
            remove_all(staged[i..].iter().map(|(p, _)| p));
            return Err(AppError::OutputWrite {
                path: path.clone(),
                source: e,
            });
        }
        written.push(path.clone());
    }
    Ok(written)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

fn remove_all<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

/// Flatten, place and build `root` inside a caller-supplied host.
pub fn build_in_host<H: HostApi>(
    root: &DeviceGraph,
    config: &PipelineConfig,
    host: &mut H,
) -> AppResult<BuildSummary> {
    validate_config(config)?;
    let (flat, _) = prepare(root, config)?;
    Ok(build_in_process(&flat, &config.model_options(), config.rank, host)?)
}

/// Digest of the placed graph, for comparing builds across processes.
pub fn graph_digest(root: &DeviceGraph, config: &PipelineConfig) -> AppResult<String> {
    let (flat, _) = prepare(root, config)?;
    Ok(digest(&flat)?)
}
