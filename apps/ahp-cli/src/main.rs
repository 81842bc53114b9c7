mod architectures;

use std::path::{Path, PathBuf};

use ahp_app::{AppError, AppResult, ConfigOverrides};
use ahp_emit::{EmitMode, StructuredFormat};
use ahp_graph::DeviceGraph;
use ahp_partition::StrategyKind;
use architectures::{ARCHITECTURES, ArchParams};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ahp-cli")]
#[command(about = "AHP graph CLI - build, flatten, partition and emit device graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ArchArgs {
    /// Built-in architecture name (see `list`)
    arch: String,
    /// Number of top-level assemblies
    #[arg(long, default_value_t = 2)]
    count: u32,
    /// Round trips per ping-pong pair
    #[arg(long, default_value_t = 10)]
    repeats: u32,
}

#[derive(Args)]
struct PipelineArgs {
    /// Pipeline configuration file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Partition strategy: hierarchy-aware or deferred
    #[arg(long)]
    strategy: Option<StrategyKind>,
    /// Number of ranks
    #[arg(long)]
    ranks: Option<u32>,
    /// Cap on threads per rank
    #[arg(long)]
    threads: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in architectures
    List,
    /// Flatten an architecture and print its components
    Flatten {
        #[command(flatten)]
        arch: ArchArgs,
    },
    /// Partition an architecture and write host artefacts
    Emit {
        #[command(flatten)]
        arch: ArchArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Output mode: text, structured or in-process
        #[arg(long)]
        mode: Option<EmitMode>,
        /// Structured format: json or yaml
        #[arg(long)]
        format: Option<StructuredFormat>,
        /// Emit only this rank
        #[arg(long)]
        rank: Option<u32>,
        /// Expand only what the chosen rank needs
        #[arg(long, requires = "rank")]
        partial: bool,
        /// Draw ports in dot output
        #[arg(long)]
        ports: bool,
        /// One flat dot file instead of one per assembly
        #[arg(long)]
        flat: bool,
        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        /// File stem; defaults to the architecture name
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the digest of the partitioned graph
    Digest {
        #[command(flatten)]
        arch: ArchArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cmd_list(),
        Commands::Flatten { arch } => cmd_flatten(&arch),
        Commands::Emit {
            arch,
            pipeline,
            mode,
            format,
            rank,
            partial,
            ports,
            flat,
            output,
            name,
        } => {
            let overrides = ConfigOverrides {
                emit_mode: mode,
                structured_format: format,
                rank,
                partial_expand: partial.then_some(true),
                ports: ports.then_some(true),
                flat: flat.then_some(true),
                ..pipeline.overrides()
            };
            let name = name.unwrap_or_else(|| arch.arch.clone());
            cmd_emit(&arch, pipeline.config.as_deref(), &overrides, &output, &name)
        }
        Commands::Digest { arch, pipeline } => {
            cmd_digest(&arch, pipeline.config.as_deref(), &pipeline.overrides())
        }
    }
}

impl PipelineArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            strategy: self.strategy,
            rank_count: self.ranks,
            threads_per_rank: self.threads,
            ..ConfigOverrides::default()
        }
    }
}

fn build(arch: &ArchArgs) -> AppResult<DeviceGraph> {
    let found = architectures::find(&arch.arch)
        .ok_or_else(|| AppError::ArchitectureNotFound(arch.arch.clone()))?;
    let params = ArchParams {
        count: arch.count,
        repeats: arch.repeats,
    };
    let graph = found.build(&params)?;
    debug!(arch = found.name, devices = graph.len(), "built architecture");
    Ok(graph)
}

fn cmd_list() -> AppResult<()> {
    println!("Built-in architectures:");
    for arch in ARCHITECTURES {
        println!("  {} - {}", arch.name, arch.about);
    }
    Ok(())
}

fn cmd_flatten(arch: &ArchArgs) -> AppResult<()> {
    let graph = build(arch)?;
    let summary = ahp_app::summarize(&graph)?;

    println!(
        "✓ Flattened {}: {} components, {} links",
        arch.arch,
        summary.components.len(),
        summary.links
    );
    for (category, count) in &summary.categories {
        println!("  {category}: {count}");
    }
    for name in &summary.components {
        println!("  {name}");
    }
    for warning in &summary.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn cmd_emit(
    arch: &ArchArgs,
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    output: &Path,
    name: &str,
) -> AppResult<()> {
    let config = ahp_app::load_config(config_path, overrides)?;
    let graph = build(arch)?;
    let emitted = ahp_app::run_pipeline(&graph, name, &config)?;

    let report = &emitted.summary.report;
    println!(
        "✓ {} components, {} links; {} of {} ranks used, {} cross-rank links",
        emitted.summary.components,
        emitted.summary.links,
        report.ranks_used,
        report.rank_count,
        report.cross_rank_links
    );
    for warning in &emitted.summary.warnings {
        println!("  warning: {warning}");
    }

    if let Some(transcript) = &emitted.transcript {
        print!("{transcript}");
        return Ok(());
    }

    let written = ahp_app::write_output(&emitted, output)?;
    for path in written {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn cmd_digest(arch: &ArchArgs, config_path: Option<&Path>, overrides: &ConfigOverrides) -> AppResult<()> {
    let config = ahp_app::load_config(config_path, overrides)?;
    let graph = build(arch)?;
    println!("{}", ahp_app::graph_digest(&graph, &config)?);
    Ok(())
}
