use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mocap_stage_core::{parse_bvh, BvhFileLoader, Stage, StageConfig};
use tracing_subscriber::EnvFilter;

mod program;

use program::Runner;

fn main() -> mocap_stage_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            program,
            config,
            fps,
            frames,
        } => run_program(&program, config.as_deref(), fps, frames),
        Commands::Inspect { input } => run_inspect(&input),
    }
}

fn run_program(
    path: &Path,
    config: Option<&Path>,
    fps: f32,
    frames: u32,
) -> mocap_stage_core::Result<()> {
    tracing::info!(program = ?path, ?config, fps, frames, "running stage program");

    let config = match config {
        Some(path) => StageConfig::from_json_file(path)?,
        None => StageConfig::default(),
    };
    let commands = program::parse(&std::fs::read_to_string(path)?)?;

    let mut runner = Runner::new(Stage::new(config, BvhFileLoader::new()), fps);
    runner.run(&commands)?;
    if frames > 0 {
        runner.advance(frames);
    }

    let summary = runner.summary();
    for error in &summary.errors {
        tracing::warn!(%error, "stage reported an error");
    }
    tracing::info!(
        ticks = summary.ticks,
        rigs = summary.rigs.len(),
        ghosts = summary.ghosts,
        lines = summary.lines,
        "program finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_inspect(input: &Path) -> mocap_stage_core::Result<()> {
    let name = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("clip");
    let loaded = parse_bvh(name, &std::fs::read_to_string(input)?)?;

    tracing::info!(?input, joints = loaded.skeleton.joints().len(), "parsed clip");
    println!(
        "{name}: {} frames at {:.4}s, {:.3}s long",
        loaded.clip.frame_count(),
        loaded.clip.frame_time(),
        loaded.clip.duration()
    );
    for joint in loaded.skeleton.joints() {
        let parent = joint
            .parent
            .map(|index| loaded.skeleton.joints()[index].name.as_str())
            .unwrap_or("-");
        println!(
            "  {:<24} parent {:<24} channels {}",
            joint.name,
            parent,
            joint.channels.len()
        );
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Live-coded motion-capture stage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON stage program and print the final stage summary.
    Run {
        /// Path to the program: a JSON array of stage commands.
        program: PathBuf,
        /// Optional engine/scene configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Fixed frame rate used for `advance` commands.
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
        /// Extra frames to run after the program ends.
        #[arg(long, default_value_t = 0)]
        frames: u32,
    },
    /// Parse a BVH file and list its joints.
    Inspect {
        /// Path to the BVH file.
        input: PathBuf,
    },
}
