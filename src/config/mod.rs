//! Run configuration and credentials.
//!
//! A [`Config`] comes from a TOML document (the embedded [`DEFAULT_CONFIG_STR`] unless the
//! user passes a file), then the environment may override the folder list via [`FOLDER_ENV`].
//! The OAuth token is never part of the config file, see [`Token`].

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use validator::ValidationError;
pub use validator::Validate;

/// The embedded default config, used when no file is given.
pub const DEFAULT_CONFIG_STR: &str = include_str!("default.toml");

/// Primary variable holding the OAuth token.
pub const TOKEN_ENV: &str = "YANDEX_DISK_TOKEN";
/// Checked when [`TOKEN_ENV`] is unset or blank.
pub const LEGACY_TOKEN_ENV: &str = "YANDEX_TOKEN";
/// Comma separated list of folders, replaces [`Config::folders`] when non-empty.
pub const FOLDER_ENV: &str = "YANDEX_FOLDER";

/// How links are resolved for the retained images.
#[non_exhaustive]
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// List the folder, request a download href per image and save the bytes locally.
    Download,
    /// List files, publish each image and record its public and derived direct URLs.
    Publish,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Download => f.write_str("download"),
            Strategy::Publish => f.write_str("publish"),
        }
    }
}

/// Where the run writes its artifacts.
///
/// Relative file names are resolved against [`Output::dir`], downloaded images land there too.
/// The page must stay inside [`Output::dir`] so it can reach them, see [`Output::asset_prefix`].
#[non_exhaustive]
#[derive(Debug, Deserialize, Clone)]
pub struct Output {
    /// Base directory of every output, and where images are downloaded to.
    pub dir: PathBuf,
    /// The manifest file.
    pub manifest: PathBuf,
    /// Optional summary file.
    #[serde(default)]
    pub summary: Option<PathBuf>,
    /// Optional gallery page, a relative path inside [`Output::dir`].
    #[serde(default)]
    pub page: Option<PathBuf>,
}

impl Output {
    /// [`Output::manifest`] resolved against [`Output::dir`].
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(&self.manifest)
    }

    /// [`Output::summary`] resolved against [`Output::dir`].
    pub fn summary_path(&self) -> Option<PathBuf> {
        self.summary.as_deref().map(|path| self.dir.join(path))
    }

    /// [`Output::page`] resolved against [`Output::dir`].
    pub fn page_path(&self) -> Option<PathBuf> {
        self.page.as_deref().map(|path| self.dir.join(path))
    }

    /// Base directory of every output.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The way back from the page's directory to [`Output::dir`]: `""` for `index.html`,
    /// `"../"` for `site/index.html` and so on.
    pub fn asset_prefix(&self) -> String {
        let depth = self.page.as_deref().map_or(0, |page| {
            page.components()
                .filter(|component| matches!(component, Component::Normal(_)))
                .count()
                .saturating_sub(1)
        });
        "../".repeat(depth)
    }
}

/// Everything a run needs except the token.
#[non_exhaustive]
#[derive(Debug, Deserialize, Clone, Validate)]
#[validate(schema(function = "validate_output"))]
pub struct Config {
    /// Folders to scan, in order. Normalized to `disk:/...` when listed.
    #[validate(
        length(min = 1, message = "folders must not be empty"),
        custom(function = "validate_folders")
    )]
    pub folders: Vec<String>,
    /// How links are resolved.
    pub strategy: Strategy,
    /// Page size of each listing request.
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: u32,
    /// Base URL of the REST API.
    #[validate(url(message = "api_base must be a valid URL"))]
    pub api_base: String,
    /// Seconds, per API request.
    #[validate(range(min = 1, message = "api_timeout must be at least 1 second"))]
    pub api_timeout: u64,
    /// Seconds, per image download.
    #[validate(range(min = 1, message = "fetch_timeout must be at least 1 second"))]
    pub fetch_timeout: u64,
    /// `publish` only: keep images without a public link in the manifest, without URLs.
    #[serde(default)]
    pub keep_unresolved: bool,
    /// Where outputs are written.
    pub output: Output,
}

#[allow(clippy::ptr_arg)]
fn validate_folders(folders: &Vec<String>) -> Result<(), ValidationError> {
    if folders.iter().any(|folder| folder.trim().is_empty()) {
        let mut err = ValidationError::new("blank_folder");
        err.message = Some("folder paths must not be blank".into());
        return Err(err);
    }
    Ok(())
}

fn validate_output(config: &Config) -> Result<(), ValidationError> {
    let Some(page) = config.output.page.as_deref() else {
        return Ok(());
    };
    let inside = page
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if inside && page.file_name().is_some() {
        return Ok(());
    }
    let mut err = ValidationError::new("page_outside_dir");
    err.message = Some("output.page must be a relative path inside output.dir".into());
    Err(err)
}

/// Split a comma separated folder list, dropping blank entries.
pub fn parse_folder_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|folder| !folder.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// If the document is not valid TOML for [`Config`], or if [`Config::validate`] fails.
    #[cfg(feature = "__toml")]
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Config>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded default config.
    ///
    /// # Errors
    ///
    /// Only if [`DEFAULT_CONFIG_STR`] is broken, which the tests guard against.
    #[cfg(feature = "__toml")]
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG_STR)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    /// Returns `true` if anything was overridden. Call [`Config::validate`] afterwards.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        let Some(raw) = lookup(FOLDER_ENV) else {
            return false;
        };
        let folders = parse_folder_list(&raw);
        if folders.is_empty() {
            return false;
        }
        self.folders = folders;
        true
    }
}

/// The OAuth token used for API calls. Its `Debug` output is redacted.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    /// Read the token from [`TOKEN_ENV`], falling back to [`LEGACY_TOKEN_ENV`].
    ///
    /// Blank values count as unset. `None` means the run must stop before any network call.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        [TOKEN_ENV, LEGACY_TOKEN_ENV]
            .into_iter()
            .filter_map(|key| lookup(key))
            .map(|value| value.trim().to_owned())
            .find(|value| !value.is_empty())
            .map(Self)
    }

    /// The raw token, only for building the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}
