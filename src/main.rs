mod cli;
mod config;
mod error;
mod events;
mod gemini;
mod matrix;
mod scheduler;
mod sink;
mod source;
mod state_machine;
mod ui;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use cli::{Cli, Command};
use config::CaptionConfig;
use events::StopFlag;
use gemini::GeminiClient;
use matrix::{KeyModelMatrix, MODEL_CATALOG};
use scheduler::{FailoverScheduler, RunSettings};
use state_machine::Termination;
use ui::RunConsole;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { folder } => run(folder, cli.model, cli.verbose).await,
        Command::Scan { folder } => scan(folder),
        Command::Models => models(cli.model),
        Command::Init { force } => init(force),
    }
}

async fn run(folder: Option<PathBuf>, model_override: Option<String>, verbose: bool) -> Result<()> {
    let mut config = CaptionConfig::load().context("failed to load legenda.toml")?;
    if let Some(model) = model_override {
        config.start_model = model;
    }
    config.validate()?;

    let folder = resolve_folder(folder, &config)?;
    let scan = source::scan_folder(&folder)?;

    let matrix = KeyModelMatrix::new(config.api_keys.clone(), &config.start_model);
    let settings = RunSettings {
        prompt: config.prompt.clone(),
        system_instruction: config.system_instruction().map(str::to_string),
        cooldown: Duration::from_millis(config.cooldown_ms),
    };

    let (events, receiver) = events::channel();

    let stop = StopFlag::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.request();
            }
        });
    }

    let console = RunConsole::start(verbose);
    let renderer = tokio::spawn(async move {
        console.render(receiver).await;
        console
    });

    let mut scheduler = FailoverScheduler::new(GeminiClient::new(), matrix, settings, events, stop);
    let report = scheduler.run(scan).await;

    // Dropping the scheduler closes the event channel, which ends the
    // renderer task.
    drop(scheduler);
    let console = renderer.await.context("terminal renderer failed")?;
    console.print_report(&report);

    if report.termination == Termination::Exhausted {
        bail!(
            "every API key and model was exhausted; {} image(s) left pending",
            report.remaining
        );
    }
    Ok(())
}

fn scan(folder: Option<PathBuf>) -> Result<()> {
    let config = CaptionConfig::load().context("failed to load legenda.toml")?;
    let folder = resolve_folder(folder, &config)?;
    let scan = source::scan_folder(&folder)?;

    println!(
        "{} image(s) already captioned in {}",
        scan.already_captioned.len(),
        folder.display()
    );
    if scan.pending.is_empty() {
        println!("nothing left to caption");
    } else {
        println!("{} image(s) pending:", scan.pending.len());
        for item in &scan.pending {
            println!("  {}", item.file_name());
        }
    }
    Ok(())
}

fn models(model_override: Option<String>) -> Result<()> {
    let config = CaptionConfig::load().context("failed to load legenda.toml")?;
    let start = model_override.unwrap_or(config.start_model);
    // An unknown name starts the walk at the catalog head; mark that entry.
    let start_index = matrix::catalog_start_index(&start);

    for (index, name) in MODEL_CATALOG.iter().enumerate() {
        if index == start_index {
            println!("* {name} (start)");
        } else {
            println!("  {name}");
        }
    }
    Ok(())
}

fn init(force: bool) -> Result<()> {
    config::write_template(Path::new(config::CONFIG_FILE), force)?;
    println!("wrote {}", config::CONFIG_FILE);
    Ok(())
}

fn resolve_folder(folder: Option<PathBuf>, config: &CaptionConfig) -> Result<PathBuf> {
    folder.or_else(|| config.folder.clone()).context(
        "no folder given; pass one on the command line or set `folder` in legenda.toml",
    )
}
