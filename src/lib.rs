// src/lib.rs

pub mod artifact;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod container;
pub mod demo;
pub mod errors;
pub mod fs;
pub mod key_value;
pub mod locator;
pub mod logging;
pub mod parameters;
pub mod resources;
pub mod scripts;
pub mod signature;
pub mod types;
pub mod workflow;

use anyhow::{Context, Result};
use tracing::info;

use crate::checkpoint::{AlwaysPurge, ConfirmPurge, InteractivePrompt, NeverPurge};
use crate::cli::{CliArgs, Command};
use crate::config::{WorkflowConfig, default_config_path, load_and_validate, resolve_config_path};
use crate::fs::RealFileSystem;
use crate::workflow::{FinalizedWorkflow, WorkflowBuilder};

/// High-level entry point used by `main.rs`.
pub fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Example {
            config,
            root,
            yes,
            no,
        } => {
            let mut cfg = match resolve_config_path(config, &default_config_path()) {
                Some(path) => load_and_validate(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => WorkflowConfig::local("plandag-demo", "plandag-demo"),
            };
            if let Some(root) = root {
                cfg.directory = root;
            }
            cfg.directory = std::path::absolute(&cfg.directory)?;

            let mut builder = WorkflowBuilder::from_config(cfg);
            demo::schedule_demo(&mut builder)?;

            let mut confirm: Box<dyn ConfirmPurge> = if yes {
                Box::new(AlwaysPurge)
            } else if no {
                Box::new(NeverPurge)
            } else {
                Box::new(InteractivePrompt::stdio())
            };
            let finalized = builder.finalize(None, confirm.as_mut())?;
            print_summary(&finalized);
        }
        Command::PurgeCheckpoints { root } => {
            let removed = checkpoint::purge_checkpoints(&RealFileSystem, &root)?;
            info!(root = %root.display(), removed = removed.len(), "purge complete");
            println!("removed {} checkpoint(s) under {}", removed.len(), root.display());
        }
    }
    Ok(())
}

fn print_summary(finalized: &FinalizedWorkflow) {
    let plan = &finalized.plan;
    println!("workflow {} ({} jobs, {} edges)", plan.name, plan.jobs.len(), plan.edges.len());
    for job in &plan.jobs {
        let marker = if job.checkpointed { " [checkpointed]" } else { "" };
        println!("  - {}{marker}", job.locator);
    }
    if finalized.purged {
        println!("checkpoints purged");
    }
    println!("plan written to {}", finalized.written.plan.display());
}
