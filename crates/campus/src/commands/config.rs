//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and where it came from
    Show,

    /// Print the user config file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let session_file = ctx.session_file().ok();

    if ctx.json_output {
        return ctx.print_json(&json!({
            "server": {
                "url": config.server_url(),
                "timeout_secs": config.timeout().as_secs(),
                "user_agent": config.user_agent(),
            },
            "session_file": session_file,
            "sources": ctx.loaded.loaded_from(),
            "warnings": ctx.loaded.warnings,
        }));
    }

    println!("# Campus Configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Server:");
    println!("  url:        {}", config.server_url());
    println!("  timeout:    {}s", config.timeout().as_secs());
    if let Some(agent) = config.user_agent() {
        println!("  user agent: {agent}");
    }
    println!();

    println!("Session:");
    match &session_file {
        Some(path) => println!("  file: {}", path.display()),
        None => println!("  file: (no config directory)"),
    }
    println!();

    if !ctx.loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &ctx.loaded.warnings {
            println!("  ⚠ {w}");
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match &ctx.config_dir {
        Some(dir) => println!("{}", dir.join("config.toml").display()),
        None => eprintln!("Could not determine config directory"),
    }
    Ok(())
}
