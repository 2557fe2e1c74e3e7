pub mod app;
pub mod cli;
pub mod commands;

use anyhow::Result;
use cli::{CheckpointAction, Cli, Command, ConfigAction};
use hygro_config::{AppConfig, ConfigLoader};
use hygro_logging::init_logging;
use serde_json::json;

/// 加载配置（`--config` 显式给出时文件必须存在）
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::new(path).require_file(),
        None => ConfigLoader::default(),
    };
    loader.load()
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_logging(&config.logging)?;

    match &cli.command {
        Command::Replicate { dry_run } => {
            let report = commands::replicate(&config, *dry_run).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{}examined {} revisions, wrote {} records, skipped {} invalid; checkpoint {} -> {}",
                    if *dry_run { "[dry run] " } else { "" },
                    report.examined,
                    report.records_written(),
                    report.skipped_invalid,
                    report.previous_checkpoint,
                    report.new_checkpoint()
                );
            }
        }
        Command::Check => {
            let report = commands::check(&config).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{:?}: latest record {} is {}s old{}",
                    report.status,
                    report.record_timestamp.to_rfc3339(),
                    report.age_secs,
                    if report.notified { ", notification sent" } else { "" }
                );
            }
        }
        Command::Checkpoint { action } => {
            let checkpoint = match action {
                CheckpointAction::Show => commands::checkpoint_show(&config).await?,
                CheckpointAction::Reset => commands::checkpoint_reset(&config).await?,
            };
            if cli.json {
                println!("{}", json!({ "checkpoint": checkpoint }));
            } else if *action == CheckpointAction::Reset {
                println!("checkpoint reset (was {})", checkpoint);
            } else {
                println!("{}", checkpoint);
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Validate => {
                for warning in config.warnings() {
                    println!("warning: {}", warning);
                }
                println!("configuration is valid");
            }
            ConfigAction::Show => print!("{}", config.to_redacted_toml()?),
        },
    }

    Ok(())
}
