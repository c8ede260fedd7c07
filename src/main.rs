//! flow-rl command line
//!
//! # Usage
//!
//! ```bash
//! # Roll out the minicity experiment
//! flow-rl simulate --render drgb --num-runs 1 --num-steps 1500
//!
//! # Train the merge experiment with the in-process trainer
//! flow-rl train --iterations 10 --repeat 1 --checkpoint-dir checkpoints
//!
//! # Print a preset's canonical configuration, e.g. to edit and pass back
//! # with --config
//! flow-rl dump-config merge > merge.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use flow_rl::flow_params::FlowParams;
use flow_rl::params::RenderMode;
use flow_rl::presets;
use flow_rl::runner::ExperimentRunner;
use flow_rl::train::LocalTrainer;

#[derive(Parser, Debug)]
#[command(name = "flow-rl", version, about = "Traffic-control RL experiment runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Step one environment directly for a fixed budget
    Simulate {
        /// Rendering mode (defaults to the experiment's own setting)
        #[arg(long, value_enum)]
        render: Option<RenderMode>,

        /// Write rendered frames to disk
        #[arg(long)]
        save_render: bool,

        /// Number of episodes
        #[arg(long, default_value_t = presets::MINICITY_RUNS)]
        num_runs: usize,

        /// Steps per episode (a collision ends an episode early)
        #[arg(long, default_value_t = presets::MINICITY_STEPS)]
        num_steps: usize,

        /// Saved configuration to replay instead of the minicity preset
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Register the environment and run a training job
    Train {
        /// Override the number of training iterations
        #[arg(long)]
        iterations: Option<usize>,

        /// Override the number of independent trials
        #[arg(long)]
        repeat: Option<usize>,

        /// Directory for checkpoints
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Saved configuration to train instead of the merge preset
        #[arg(long)]
        config: Option<PathBuf>,

        /// Environment version to register
        #[arg(long, default_value_t = 0)]
        version: u32,
    },

    /// Print a preset's canonical configuration
    DumpConfig {
        /// Preset to print
        #[arg(value_enum)]
        preset: Preset,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    Minicity,
    Merge,
}

fn load_config(path: &Path) -> Result<FlowParams> {
    FlowParams::load_json(path).with_context(|| format!("Failed to load configuration {}", path.display()))
}

fn simulate(
    render: Option<RenderMode>,
    save_render: bool,
    num_runs: usize,
    num_steps: usize,
    config: Option<PathBuf>,
) -> Result<()> {
    let save_render = save_render.then_some(true);
    let params = match config {
        Some(path) => {
            let mut params = load_config(&path)?;
            if let Some(render) = render {
                params.sim.render = render;
            }
            if let Some(save) = save_render {
                params.sim.save_render = save;
            }
            params
        }
        None => presets::minicity(render, save_render)?,
    };

    tracing::info!("Experiment: {}", params.exp_tag);
    tracing::info!("  Environment: {}", params.env_name);
    tracing::info!("  Network: {}", params.scenario);
    tracing::info!("  Vehicles: {} ({} RL)", params.veh.num_vehicles(), params.veh.num_rl_vehicles());
    tracing::info!("  Render: {}", params.sim.render.as_str());

    let runner = ExperimentRunner::new();
    let summary = runner.run_rollout(&params, num_runs, num_steps, None)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn train(
    iterations: Option<usize>,
    repeat: Option<usize>,
    checkpoint_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    version: u32,
) -> Result<()> {
    let params = match config {
        Some(path) => load_config(&path)?,
        None => presets::merge()?,
    };

    let mut job = presets::merge_job();
    job.config = job.config.horizon(params.env.horizon);
    if let Some(iterations) = iterations {
        job.stop.training_iteration = iterations;
    }
    if let Some(repeat) = repeat {
        job.repeat = repeat;
    }

    let mut trainer = LocalTrainer::new();
    if let Some(dir) = checkpoint_dir {
        trainer = trainer.checkpoint_dir(dir);
    }

    let mut runner = ExperimentRunner::new();
    let records = runner.run_training(&params, version, job, &mut trainer)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Simulate { render, save_render, num_runs, num_steps, config } => {
            simulate(render, save_render, num_runs, num_steps, config)
        }
        Command::Train { iterations, repeat, checkpoint_dir, config, version } => {
            train(iterations, repeat, checkpoint_dir, config, version)
        }
        Command::DumpConfig { preset } => {
            let params = match preset {
                Preset::Minicity => presets::minicity(None, None)?,
                Preset::Merge => presets::merge()?,
            };
            println!("{}", params.to_canonical_json()?);
            Ok(())
        }
    }
}
