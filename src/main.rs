mod charts;
mod cli;
mod config;
mod fetcher;
mod history;
mod pipeline;

use crate::charts::ChartOutcome;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::fetcher::WikiApiClient;
use crate::history::store;
use crate::pipeline::UpdateOutcome;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Update) {
        Commands::Update => {
            handle_update(&cli.config);
            Ok(())
        }
        Commands::Charts => {
            handle_charts(&cli.config);
            Ok(())
        }
        Commands::Status => handle_status(&cli.config),
        Commands::Config { command } => handle_config_command(&cli.config, command),
    }
}

/// Scheduled entry point: failures are logged, never surfaced as an exit code.
fn handle_update(config_path: &Path) {
    let result = Config::load_or_default(config_path).and_then(|config| {
        let client = WikiApiClient::from_config(&config)?;
        pipeline::run_update(&config, &client)
    });

    match result {
        Ok(UpdateOutcome::Updated { date, rows, charts }) => {
            let rendered = charts.iter().filter(|chart| chart.is_rendered()).count();
            println!("Stats updated: {date} ({rows} rows, {rendered} charts)");
            print_charts(&charts);
        }
        Ok(UpdateOutcome::Skipped { reason }) => {
            println!("Error fetching data: {reason}");
        }
        Err(error) => {
            let message = format!("{error:#}");
            error!(error = %message, "stats update failed");
        }
    }
}

fn handle_charts(config_path: &Path) {
    let result = Config::load_or_default(config_path)
        .and_then(|config| pipeline::render_charts(&config));

    match result {
        Ok(charts) if charts.is_empty() => println!("No stats history to chart yet"),
        Ok(charts) => print_charts(&charts),
        Err(error) => {
            let message = format!("{error:#}");
            error!(error = %message, "chart rendering failed");
        }
    }
}

fn handle_status(config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let history = store::load(&config.csv_path)?;

    println!("wikistats status");
    println!("- wiki: {}", config.wiki);
    println!("- endpoint: {}", config.endpoint()?);
    println!("- csv_path: {}", config.csv_path.display());

    let Some(history) = history else {
        println!("- rows: 0");
        return Ok(());
    };

    println!("- rows: {}", history.len());
    if let Some(latest) = history.latest() {
        println!("- latest_date: {}", latest.date);
        history.columns().iter().for_each(|column| {
            let value = latest
                .get(column)
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {column}: {value}");
        });
    }

    Ok(())
}

fn handle_config_command(config_path: &Path, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_or_default(config_path)?;
            config.set_value(&key, &value)?;
            config.save(config_path)?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = Config::load_or_default(config_path)?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn print_charts(charts: &[ChartOutcome]) {
    charts.iter().for_each(|chart| match chart {
        ChartOutcome::Rendered { path, .. } => println!("- Chart: {}", path.display()),
        ChartOutcome::Skipped { column, reason } => println!("- Skipped {column}: {reason}"),
    });
}
