//! A core module for command line interface.
//!
//! See [`Cli`] for more information.

use std::path::PathBuf;

use clap::builder::{PathBufValueParser, TypedValueParser};
use clap::error::ErrorKind;
use clap::Command;
pub use clap::{CommandFactory, Parser};

use crate::config::{Config, Validate};

// keep in sync with the `crate::config` constants, checked by the tests
const ENV_HELP: &str = "\
Environment:
  YANDEX_DISK_TOKEN  OAuth token (required, falls back to YANDEX_TOKEN)
  YANDEX_FOLDER      comma separated folders, overrides the config
  RUST_LOG           log filter, defaults to `info`";

/// [`clap`] command line interface.
///
/// The only argument is an optional config file, parsed with [`toml`]
/// and checked with [`Config::validate`] while parsing.
/// Everything else comes from the environment, see [`Self::resolve_config`].
///
/// # Example
///
/// ```no_run
/// use yadisk_photos::cli::{Cli, Parser as _};
///
/// let cli = Cli::parse();
/// ```
#[non_exhaustive]
#[derive(Parser)]
#[command(version, about)]
#[command(after_help = ENV_HELP)]
pub struct Cli {
    /// The config file to use.
    ///
    /// If `None`, the embedded default config is used.
    #[arg(value_name = "PATH")]
    #[arg(value_parser = PathBufValueParser::new().try_map(Self::parse_config_from_filepath))]
    pub config: Option<Config>,
}

impl Cli {
    #[inline]
    fn parse_config_from_filepath(path: PathBuf) -> anyhow::Result<Config> {
        let config = std::fs::read_to_string(path)?;
        Config::from_toml_str(&config)
    }

    /// The config to run with: the parsed file or the embedded default,
    /// with environment overrides from `lookup` applied and validated again.
    ///
    /// # Errors
    ///
    /// If the embedded default is broken, or the overrides make the config invalid.
    pub fn resolve_config(
        config: Option<Config>,
        cmd: &mut Command,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, clap::Error> {
        let mut config = match config {
            Some(config) => config,
            None => Config::builtin().map_err(|err| cmd.error(ErrorKind::ValueValidation, err))?,
        };
        if config.apply_env(lookup) {
            config
                .validate()
                .map_err(|err| cmd.error(ErrorKind::ValueValidation, err))?;
        }
        Ok(config)
    }
}
