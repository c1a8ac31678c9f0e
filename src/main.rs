//! Wizshell CLI - discovers modules and runs them headlessly.
//!
//! This is the main binary entry point. See the `wizshell` library for the
//! core functionality.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wizshell::env::Environment;
use wizshell::tree::{Component, Node};
use wizshell::{shell, AppConfig, RunRequest, Shell};

#[derive(Parser)]
#[command(name = "wizshell")]
#[command(version)]
#[command(about = "Terminal wizard shell for declarative modules")]
struct Cli {
    /// Config file (defaults to ./wizshell.conf, ~/.wizshellrc, /etc/wizshell.conf)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the module tree with each module's availability
    List,
    /// Load the content tree and evaluate every condition, then exit
    Check,
    /// Run a module's command
    Run {
        /// Module title
        module: String,
        /// Command title (defaults to the module's first command)
        #[arg(long)]
        command: Option<String>,
        /// Set an argument by name or label
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
        /// Add a flag to the command line
        #[arg(long = "flag", value_name = "FLAG", allow_hyphen_values = true)]
        flags: Vec<String>,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got \"{raw}\""))
}

fn init_logging() {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(Environment::current().default_log_filter()),
    );
    // Keep module output on stdout readable: logs can be sent to a file.
    if let Ok(path) = std::env::var("WIZSHELL_LOG_FILE") {
        match std::fs::File::create(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Logging to stderr, cannot open {path}: {e}"),
        }
    }
    builder.format_timestamp_secs().init();
}

fn print_tree(components: &[Component], depth: usize) {
    let indent = "  ".repeat(depth);
    for component in components {
        match component {
            Component::Module(m) => {
                println!("{indent}{} [{}]", m.title(), shell::availability(m));
            }
            Component::Group(_) => {
                println!("{indent}{}/", component.title());
                print_tree(component.children(), depth + 1);
            }
            Component::Command(_) => println!("{indent}{}", component.title()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Unable to load config")?;
    log::info!(
        "[Main] Starting ({}), content root {}",
        Environment::current(),
        config.content.display()
    );
    let mut app = Shell::new(config)?;

    match cli.command {
        Commands::List => {
            println!("{}", app.tree().title());
            print_tree(app.tree().components(), 1);
        }
        Commands::Check => {
            let modules = app.tree().modules();
            let available = modules
                .iter()
                .filter(|m| m.conditions().satisfied())
                .count();
            for m in &modules {
                println!("{}: {}", m.title(), shell::availability(m));
            }
            println!("{available}/{} modules available", modules.len());
        }
        Commands::Run {
            module,
            command,
            set,
            flags,
        } => {
            let request = RunRequest {
                module,
                command,
                set,
                flags,
            };
            let report = app.run(&request, |line| println!("{line}")).await?;
            log::info!("[Main] Ran with {:?}", report.argv);
            println!("{}", report.landing);
        }
    }

    Ok(())
}
