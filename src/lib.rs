//! kompose CLI library
//!
//! Loads a compose application, converts it for Kubernetes or OpenShift,
//! and either renders the objects or applies them to a cluster.

pub mod commands;
pub mod docker;
pub mod error;
pub mod git;
pub mod loader;
pub mod output;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use kompose_common::Provider;

/// kompose - take a compose application to Kubernetes or OpenShift
#[derive(Parser, Debug)]
#[command(name = "kompose")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Compose file(s) to read; `-` reads stdin. Later files override
    /// earlier ones.
    #[arg(
        short = 'f',
        long = "file",
        global = true,
        env = "COMPOSE_FILE",
        value_delimiter = ','
    )]
    pub files: Vec<PathBuf>,

    /// Distributed application bundle to read instead of compose files
    #[arg(long, global = true, conflicts_with = "files")]
    pub bundle: Option<PathBuf>,

    /// Target platform
    #[arg(
        long,
        global = true,
        value_enum,
        env = "KOMPOSE_PROVIDER",
        default_value_t = ProviderArg::Kubernetes
    )]
    pub provider: ProviderArg,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target platform flag values
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// Plain Kubernetes
    Kubernetes,
    /// OpenShift
    Openshift,
}

impl From<ProviderArg> for Provider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Kubernetes => Provider::Kubernetes,
            ProviderArg::Openshift => Provider::OpenShift,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert the application into platform objects
    Convert(commands::convert::ConvertArgs),
    /// Deploy the application to the current cluster
    Up(commands::up::UpArgs),
    /// Remove a deployed application from the current cluster
    Down(commands::down::DownArgs),
}

impl Cli {
    /// Default log filter when RUST_LOG is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let input = commands::Input {
            files: self.files,
            bundle: self.bundle,
            provider: self.provider.into(),
        };
        match self.command {
            Commands::Convert(args) => commands::convert::run(input, args).await,
            Commands::Up(args) => commands::up::run(input, args).await,
            Commands::Down(args) => commands::down::run(input, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kompose",
            "convert",
            "-f",
            "a.yml,b.yml",
            "--provider",
            "openshift",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.files, vec![PathBuf::from("a.yml"), PathBuf::from("b.yml")]);
        assert_eq!(Provider::from(cli.provider), Provider::OpenShift);
        assert_eq!(cli.default_log_level(), "debug");
        assert!(matches!(cli.command, Commands::Convert(_)));
    }
}
