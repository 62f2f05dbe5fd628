//! Configuration view, validation and creation: `floorwatch config`.

use anyhow::Result;
use std::path::{Path, PathBuf};

use floorwatch::config::{Config, FloorwatchToml};

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(project_dir: &Path, cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => show(project_dir, cli),
        Some(ConfigCommands::Validate) => validate(project_dir, cli),
        Some(ConfigCommands::Init { yes }) => init(project_dir, cli, yes),
    }
}

fn show(project_dir: &Path, cli: &Cli) -> Result<()> {
    let mut config = Config::resolve(cli.config.as_deref(), project_dir)?;
    if let Some(url) = &cli.base_url {
        config.toml.backend.base_url = url.clone();
    }

    println!();
    println!("Floorwatch Configuration");
    println!("========================");
    println!();
    match &config.source {
        Some(path) => println!("Config file: {}", path.display()),
        None => {
            println!("No floorwatch.toml found; using defaults.");
            println!("Run 'floorwatch config init' to create one.");
        }
    }
    println!();

    println!("Effective values (with env/CLI overrides):");
    println!();
    print!("{}", toml::to_string_pretty(&config.toml)?);
    println!();
    println!(
        "Bearer token (${}): {}",
        config.toml.backend.token_env,
        if config.token().is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!();
    Ok(())
}

fn validate(project_dir: &Path, cli: &Cli) -> Result<()> {
    println!();
    println!("Validating configuration...");
    println!();

    let mut config = Config::resolve(cli.config.as_deref(), project_dir)?;
    if let Some(url) = &cli.base_url {
        config.toml.backend.base_url = url.clone();
    }
    if config.source.is_none() {
        println!("No floorwatch.toml found. Checking defaults.");
    }

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        println!("Configuration warnings:");
        for warning in warnings {
            println!("  - {}", warning);
        }
    }
    println!();
    Ok(())
}

fn init(project_dir: &Path, cli: &Cli, yes: bool) -> Result<()> {
    use dialoguer::Confirm;

    let config_path: PathBuf = cli
        .config
        .clone()
        .unwrap_or_else(|| Config::project_path(project_dir));

    if config_path.exists() && !yes {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "{} already exists. Overwrite it?",
                config_path.display()
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Left {} unchanged", config_path.display());
            return Ok(());
        }
    }

    FloorwatchToml::default().save(&config_path)?;

    println!("Created floorwatch.toml at {}", config_path.display());
    println!();
    println!("You can now customize:");
    println!("  - [backend] base_url, token_env, request_timeout_ms");
    println!("  - [feed] vendor_id, interval_ms, cycle_timeout_ms");
    println!("  - [filters] project, machine, operator, status, date_range");
    println!();
    Ok(())
}
