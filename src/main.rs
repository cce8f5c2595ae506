use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use cascade::ast::NodeKind;
use cascade::engine::Engine;
use cascade::engines::reference::ReferenceEngine;
use cascade::runtime::Scheduler;
use cascade::{isolate, loader, march, save, streams, CascadeConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the run manifest (TOML)
    #[arg(short, long)]
    manifest: PathBuf,
    /// Path to the compiled-AST file the (external) front end produced
    #[arg(short, long)]
    ast: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = CascadeConfig::from_file(&args.manifest).context("loading run manifest")?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log_level.clone()))
        .init();

    let ast_path = args.ast.clone();
    let handle = tokio::task::spawn_blocking(move || run_simulation(ast_path, config));

    tokio::select! {
        result = handle => {
            result.context("simulation task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, shutting down");
        }
    }
    Ok(())
}

fn run_simulation(ast_path: PathBuf, config: CascadeConfig) -> Result<()> {
    let mut program = loader::load_program(&ast_path)?;

    if let Some(march_name) = &config.march {
        march::set_march(&mut program, &config.top, march_name)?;
    }

    let inst = NodeKind::ModuleInstantiation {
        module_name: config.top.clone(),
        iid: config.top.clone(),
        params: vec![],
        ports: vec![],
    };
    let inst_id = program.ast.push_synth(inst);
    program.eval(inst_id)?;

    let flat = isolate::flatten(&mut program, &config.top)?;
    let mut engine = ReferenceEngine::new(&mut program, flat);

    if let Some(restore_path) = &config.restore_file {
        let text = std::fs::read_to_string(restore_path).context("reading save file")?;
        let records = save::restore(&text)?;
        info!(count = records.len(), "restored save file");
        if let Some(first) = records.iter().find(|r| r.path == config.top) {
            engine.set_state(&first.state);
            engine.set_input(&first.input);
        }
    }

    let mut scheduler = Scheduler::new(engine);
    let max_ticks = config.max_ticks.unwrap_or(u64::MAX);
    scheduler.run_until(max_ticks, |e| e.is_finished());

    info!(ticks = scheduler.time, "simulation complete");

    if let Some(out) = scheduler.engine().stream_contents(streams::STDOUT) {
        print!("{}", String::from_utf8_lossy(out));
    }

    if let Some(save_path) = &config.save_file {
        let record = save::InstanceRecord {
            path: config.top.clone(),
            input: scheduler.engine().get_input(),
            state: scheduler.engine().get_state(),
        };
        std::fs::write(save_path, save::save(&[record])).context("writing save file")?;
    }

    Ok(())
}
