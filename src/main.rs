//! Snowman - A static site generator for SPARQL backends.

mod build;
mod cli;
mod config;
mod error;
mod functions;
mod logger;
mod serve;
mod sparql;
mod template;
mod view;

#[cfg(test)]
mod test_util;

use anyhow::{Context, Result};
use build::{build_site, clean_site};
use clap::Parser;
use cli::{Cli, Commands};
use config::{ConfigError, SiteConfig};
use functions::FunctionRegistry;
use serve::serve_site;
use sparql::SparqlClient;
use std::{path::Path, process::ExitCode};

fn main() -> ExitCode {
    let cli = Cli::parse();
    log!("snowman"; "a static site generator for SPARQL backends");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log!("error"; "{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    match &cli.command {
        Commands::Build => {
            let registry = FunctionRegistry::new().context("Failed to set up template functions.")?;
            let client = SparqlClient::from_config(&config)
                .context("Failed to connect to SPARQL endpoint.")?;
            build_site(&config, &registry, &client).map(|_| ())
        }
        Commands::Clean => clean_site(&config),
        Commands::Serve { interface, port } => serve_site(&config, interface.as_deref(), *port),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));

    SiteConfig::load(root, &cli.config).map_err(|e| {
        let message = match &e {
            ConfigError::NotFound(_) => "Unable to locate the config file in the project root.",
            ConfigError::Io(..) => "Failed to read the config file.",
            ConfigError::Yaml(_) => "Failed to parse the config file.",
            ConfigError::InvalidEndpoint { .. } => "Failed to validate the config file.",
        };
        anyhow::Error::new(e).context(message)
    })
}
