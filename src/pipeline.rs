//! A core module that runs one collection pass over the configured folders.
//!
//! See [`Pipeline`] for more information.
//!
//! Following are the low-level modules driven by this module:
//! - [`crate::api`]
//! - [`crate::filter`]
//! - [`crate::resolver`]
//! - [`crate::download`]
//! - [`crate::manifest`]
//! - [`crate::page`]

use std::collections::HashSet;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};
use reqwest::Client;
use tracing::{error, info, warn};

use crate::api::data::field::Resource;
use crate::api::{api_client, normalize_folder, Disk, Lister, Listing};
use crate::config::{Config, Strategy, Token, TOKEN_ENV};
use crate::download::{indexed_file_name, Fetcher};
use crate::filter::retain_images;
use crate::manifest::{write_json, FolderReport, Manifest, PhotoRecord, Summary};
use crate::page;
use crate::resolver::{resolve_download, resolve_public};

const PB_FINISH_MODE: ProgressFinish = ProgressFinish::AndClear;

/// What a finished run produced.
#[non_exhaustive]
#[derive(Debug)]
pub struct Report {
    /// The manifest as written.
    pub manifest: Manifest,
    /// Counts per configured folder, in configured order.
    pub folders: Vec<FolderReport>,
}

/** One linear pass: list, filter, resolve, fetch, then write.

- Folders are processed in configured order, items in listing order, one request at a time.
- A failed listing contributes zero records for its folder, a failed item is skipped.
    Both are logged and the run goes on.
- The manifest (and the optional summary and page) are rewritten from scratch at the end.

# Example
```no_run
use reqwest::Client;
use yadisk_photos::api::api_client;
use yadisk_photos::config::{Config, Token};
use yadisk_photos::pipeline::Pipeline;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::builtin()?;
    let token = Token::from("token");
    let api = api_client(Client::builder(), &token, config.api_timeout)?;

    let report = Pipeline::build(config, api, Client::new()).await?.run().await?;
    println!("{} photos", report.manifest.total_count);
    Ok(())
}
```
*/
pub struct Pipeline {
    config: Config,
    disk: Disk,
    fetcher: Fetcher,
}

impl Pipeline {
    /// `api` must be authorized (see [`crate::api::api_client`]), `fetch` must not be.
    ///
    /// # Errors
    ///
    /// If `config.api_base` is unusable, or the output directory cannot be created.
    pub async fn build(config: Config, api: Client, fetch: Client) -> anyhow::Result<Self> {
        let disk = Disk::new(api, &config.api_base).context("invalid api_base")?;
        let fetcher = Fetcher::session(
            fetch,
            config.output.dir(),
            Duration::from_secs(config.fetch_timeout),
        )
        .ensure()
        .await
        .with_context(|| {
            format!(
                "Unable to create the output directory: {}",
                config.output.dir().display()
            )
        })?;
        Ok(Self {
            config,
            disk,
            fetcher,
        })
    }

    #[inline]
    fn build_process_bar(len: usize, folder: &str) -> ProgressBar {
        const TEMPLATE: &str = "[{elapsed_precise}] {prefix} [{wide_bar:.cyan/blue}] {human_pos}/{human_len}";
        const PROCESS_CHARS: &str = "#>-";

        // the template is a constant, it parses
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(PROCESS_CHARS);

        ProgressBar::new(len as u64)
            .with_style(style)
            .with_prefix(folder.to_owned())
            .with_finish(PB_FINISH_MODE)
    }

    /// List `folder`; any failure is logged and yields no items.
    async fn list(&self, folder: &str) -> Vec<Resource> {
        let listing = match self.config.strategy {
            Strategy::Download => Listing::Folder,
            Strategy::Publish => Listing::Files,
        };
        let lister = match Lister::build(&self.disk, folder, self.config.limit, listing) {
            Ok(lister) => lister,
            Err(err) => {
                warn!(folder, "Skipping folder: {err:#}");
                return Vec::new();
            }
        };
        match lister.run().await {
            Ok(items) => items,
            Err(err) => {
                warn!(folder, "Failed to list folder: {err}");
                Vec::new()
            }
        }
    }

    /// Resolve the download href of `item` and save it as the next `photo_{n}` file.
    async fn collect_download(&self, item: &Resource, index: usize) -> anyhow::Result<PhotoRecord> {
        let href = resolve_download(&self.disk, &item.path)
            .await
            .with_context(|| format!("Failed to get a download link: {}", item.name))?;

        let filename = indexed_file_name(index, &item.name);
        let size = self
            .fetcher
            .fetch(&href, &filename, item.md5.as_deref())
            .await
            .with_context(|| format!("Failed to download: {}", item.name))?;

        Ok(PhotoRecord::from(item).with_local_path(filename.to_string_lossy(), size))
    }

    /// Publish `item` and record its links. `Ok(None)` when it has to be left out.
    async fn collect_publish(&self, item: &Resource) -> anyhow::Result<Option<PhotoRecord>> {
        let link = resolve_public(&self.disk, &item.path)
            .await
            .with_context(|| format!("Failed to publish: {}", item.name))?;

        let record = PhotoRecord::from(item);
        match link {
            Some(link) => Ok(Some(record.with_urls(link.direct_url, Some(link.public_url)))),
            None if self.config.keep_unresolved => Ok(Some(record)),
            None => Ok(None),
        }
    }

    async fn scan_folder(
        &self,
        folder: &str,
        records: &mut Vec<PhotoRecord>,
        seen: &mut HashSet<String>,
    ) -> FolderReport {
        let mut report = FolderReport::new(normalize_folder(folder));

        let items = self.list(folder).await;
        report.listed = items.len();
        let images = retain_images(items);
        report.images = images.len();
        info!(folder, listed = report.listed, images = report.images, "Folder listed");

        let process_bar = Self::build_process_bar(images.len(), &report.path);
        for item in images {
            process_bar.inc(1);
            if !seen.insert(item.path.clone()) {
                continue;
            }

            let collected = match self.config.strategy {
                Strategy::Download => self.collect_download(&item, records.len()).await.map(Some),
                Strategy::Publish => self.collect_publish(&item).await,
            };
            match collected {
                Ok(Some(record)) => {
                    process_bar.suspend(|| info!(name = %record.name, "Added"));
                    records.push(record);
                    report.recorded += 1;
                }
                Ok(None) => {
                    process_bar.suspend(|| warn!(name = %item.name, "No public link, skipped"));
                }
                // why `{:#}`: https://docs.rs/anyhow/1.0.86/anyhow/struct.Error.html#display-representations
                Err(err) => {
                    process_bar.suspend(|| warn!("{err:#}"));
                }
            }
        }
        process_bar.finish();

        report
    }

    /// Run the pass and write every configured output.
    ///
    /// # Errors
    ///
    /// Only if an output file cannot be written; listing and item failures are logged instead.
    pub async fn run(self) -> anyhow::Result<Report> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut folders = Vec::with_capacity(self.config.folders.len());

        info!(strategy = %self.config.strategy, "Scanning {} folder(s)", self.config.folders.len());
        for folder in &self.config.folders {
            folders.push(self.scan_folder(folder, &mut records, &mut seen).await);
        }

        let output = &self.config.output;
        let manifest = Manifest::new(
            Local::now(),
            folders.iter().map(|report| report.path.clone()).collect(),
            records,
        );

        let manifest_path = output.manifest_path();
        write_json(&manifest_path, &manifest)
            .await
            .with_context(|| format!("Failed to write manifest: {}", manifest_path.display()))?;
        info!(path = %manifest_path.display(), "Saved {} photo(s)", manifest.total_count);

        if let Some(summary_path) = output.summary_path() {
            let summary = Summary::new(&manifest, self.config.strategy, folders.clone());
            write_json(&summary_path, &summary)
                .await
                .with_context(|| format!("Failed to write summary: {}", summary_path.display()))?;
        }

        if let Some(page_path) = output.page_path() {
            let markup = page::render(&manifest.photos, manifest.last_updated, &output.asset_prefix());
            page::write_page(&page_path, markup)
                .await
                .with_context(|| format!("Failed to write page: {}", page_path.display()))?;
            info!(path = %page_path.display(), "Page rendered");
        }

        if manifest.total_count == 0 {
            warn!("No photos found in the configured folders");
        }

        Ok(Report { manifest, folders })
    }
}

/// Check the token, build both clients and run one pass.
///
/// `lookup` is usually `|key| std::env::var(key).ok()`.
/// A missing token returns [`ExitCode::FAILURE`] before any client exists, so nothing is sent.
/// Every other error is logged and the run still ends with [`ExitCode::SUCCESS`].
pub async fn launch(config: Config, lookup: impl Fn(&str) -> Option<String>) -> ExitCode {
    let Some(token) = Token::from_lookup(lookup) else {
        error!("{TOKEN_ENV} is not set");
        return ExitCode::FAILURE;
    };

    // why `{:#}`: https://docs.rs/anyhow/1.0.86/anyhow/struct.Error.html#display-representations
    if let Err(err) = collect(config, &token).await {
        error!("{err:#}");
    }
    ExitCode::SUCCESS
}

async fn collect(config: Config, token: &Token) -> anyhow::Result<()> {
    let api = api_client(Client::builder(), token, config.api_timeout)
        .context("failed to build the API client")?;
    let fetch = Client::builder()
        .build()
        .context("failed to build the download client")?;

    let report = Pipeline::build(config, api, fetch).await?.run().await?;
    info!("Done, {} photo(s) collected", report.manifest.total_count);
    Ok(())
}
