//! vigil - interactive security assessment shell
//!
//! Usage:
//!   vigil [--config <file>] [--catalog-dir <dir>]... [--no-builtin] [--log <filter>]

use anyhow::Context;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing::{error, info, warn};

use vigil::config::ShellConfig;
use vigil::session::Navigator;
use vigil::shell::{repl, Dispatcher};
use vigil::utils::init_logging_from_config;

#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Interactive security assessment shell")]
struct Args {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Additional catalog directory (repeatable)
    #[arg(long = "catalog-dir")]
    catalog_dirs: Vec<PathBuf>,

    /// Do not load the built-in catalog
    #[arg(long)]
    no_builtin: bool,

    /// Log filter, e.g. "vigil=debug"
    #[arg(long)]
    log: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<ShellConfig> {
    let mut config = match &args.config {
        Some(path) => ShellConfig::from_file(path)?,
        None => ShellConfig::default(),
    };
    config.apply_env_overrides();

    config.catalog.dirs.extend(args.catalog_dirs.iter().cloned());
    if args.no_builtin {
        config.catalog.builtin = false;
    }
    if let Some(filter) = &args.log {
        config.logging.filter = Some(filter.clone());
    }

    config.validate()?;
    Ok(config)
}

fn run(config: ShellConfig) -> anyhow::Result<()> {
    let sources = config.catalog_sources(vigil::builtin::catalog());
    let mut navigator = Navigator::new(sources, vigil::builtin::factories())
        .context("Failed to load module catalog")?;

    for (key, value) in config.global_options() {
        navigator
            .set(&key, value)
            .with_context(|| format!("Failed to apply global option {}", key))?;
    }

    let stdout = io::stdout();
    let mut dispatcher = Dispatcher::new(navigator, stdout.lock());
    if config.shell.banner {
        repl::banner(&mut dispatcher)?;
    }

    let stdin = io::stdin();
    repl::run(&mut dispatcher, stdin.lock())?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vigil: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging_from_config(&config.logging);
    info!("Starting vigil {}", env!("CARGO_PKG_VERSION"));
    if !config.catalog.builtin && config.catalog.dirs.is_empty() {
        warn!("No catalog configured; the shell starts empty");
    }

    if let Err(e) = run(config) {
        error!("{:#}", e);
        eprintln!("vigil: {:#}", e);
        std::process::exit(1);
    }
}
