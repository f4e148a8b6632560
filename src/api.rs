//! A core module for interacting with the Yandex Disk REST API.
//!
//! Usually, you build a [`Disk`] from an authorized client (see [`api_client`]),
//! then use [`Lister`] to get the raw [`data::field::Resource`] items of a folder.
//! Link resolution lives in [`crate::resolver`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Token;

/// The URLs for the Yandex Disk API.
pub mod url {
    /// The default base URL of the REST API, every endpoint below is relative to it.
    pub const BASE_URL: &str = "https://cloud-api.yandex.net/v1/disk";

    /// Metadata of a resource, or the items of a folder when `path` is a directory.
    pub const RESOURCES: &str = "/resources";
    /// Flat list of all files on the disk.
    pub const FILES: &str = "/resources/files";
    /// Direct download link of a file.
    pub const DOWNLOAD: &str = "/resources/download";
    /// Publish a resource so that it gets a `public_url`.
    pub const PUBLISH: &str = "/resources/publish";

    /// Host serving published files by their public key.
    pub const DIRECT_DOWNLOAD_BASE: &str = "https://downloader.disk.yandex.ru/disk";
}

/// The data structures of the JSON responses from the Yandex Disk API.
pub mod data {
    use super::*;

    /// The fields of the responses.
    pub mod field {
        use super::*;

        /// The `type` of a resource.
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum ResourceKind {
            /// A regular file.
            File,
            /// A folder.
            Dir,
            /// Missing or not one of the above.
            #[default]
            #[serde(other)]
            Unknown,
        }

        /// A file or folder, restricted to the fields requested by [`ITEM_FIELDS`].
        #[non_exhaustive]
        #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
        pub struct Resource {
            /// File or folder name.
            pub name: String,
            /// Full path, e.g. `disk:/Photos/cat.jpg`.
            pub path: String,
            /// The `type` field.
            #[serde(rename = "type", default)]
            pub kind: ResourceKind,
            /// MIME type detected by the disk, files only.
            #[serde(default)]
            pub mime_type: Option<String>,
            /// Size in bytes, files only.
            #[serde(default)]
            pub size: Option<u64>,
            /// ISO 8601 timestamp as reported by the API.
            #[serde(default)]
            pub modified: Option<String>,
            /// Hex md5 of the content, files only.
            #[serde(default)]
            pub md5: Option<String>,
        }

        #[cfg(test)]
        impl Resource {
            pub(crate) fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    path: path.into(),
                    kind: ResourceKind::File,
                    mime_type: None,
                    size: None,
                    modified: None,
                    md5: None,
                }
            }

            pub(crate) fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
                self.mime_type = Some(mime_type.into());
                self
            }

            pub(crate) fn with_kind(mut self, kind: ResourceKind) -> Self {
                self.kind = kind;
                self
            }
        }

        /// The `_embedded` field of a folder resource.
        #[derive(Debug, Default, Deserialize)]
        pub struct Embedded {
            /// Children of the folder, at most `limit` of them.
            #[serde(default)]
            pub items: Vec<Resource>,
        }
    }

    /// Response of [`url::RESOURCES`] for a folder.
    #[derive(Debug, Deserialize)]
    pub struct FolderListing {
        /// Missing when the projection matched nothing, e.g. for an empty folder.
        #[serde(rename = "_embedded", default)]
        pub embedded: field::Embedded,
    }

    /// Response of [`url::FILES`].
    #[derive(Debug, Deserialize)]
    pub struct FileListing {
        /// Files across the whole disk, at most `limit` of them.
        #[serde(default)]
        pub items: Vec<field::Resource>,
    }

    /// A link object, e.g. the response of [`url::DOWNLOAD`] or [`url::PUBLISH`].
    #[derive(Debug, Deserialize)]
    pub struct Link {
        /// The target URL.
        pub href: String,
    }

    /// The `public_url` projection of a resource.
    #[derive(Debug, Deserialize)]
    pub struct PublicMeta {
        /// Missing until the resource is published.
        #[serde(default)]
        pub public_url: Option<String>,
    }
}

use data::field::Resource;

/// Fields requested for every listed item.
pub const ITEM_FIELDS: [&str; 7] = ["name", "path", "type", "mime_type", "size", "modified", "md5"];

fn projection(prefix: &str) -> String {
    ITEM_FIELDS
        .iter()
        .map(|field| format!("{prefix}{field}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// A failed API call.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ApiError {
    /// The API answered with an unexpected status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        /// One of the [`url`] endpoints.
        endpoint: &'static str,
        /// The status received.
        status: StatusCode,
        /// The response body, usually a JSON error description.
        body: String,
    },
    /// Transport error, timeout or a body that isn't the expected JSON.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

/// Build the client used for API calls: every request carries `Authorization: OAuth <token>`.
///
/// Byte fetches must use a separate client, download hosts don't need the token.
///
/// # Errors
///
/// If the token contains characters not allowed in a header, or the client can't be built.
pub fn api_client(builder: ClientBuilder, token: &Token, timeout: u64) -> anyhow::Result<Client> {
    let mut value = HeaderValue::from_str(&format!("OAuth {}", token.secret()))
        .map_err(|_| anyhow::anyhow!("token contains characters not allowed in a header"))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);

    Ok(builder
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout))
        .build()?)
}

/// Normalize a folder to the API's `<scheme>:/...` notation.
///
/// `"/a"`, `"a"` and `"disk:/a/"` all become `"disk:/a"`; the root stays `"disk:/"`.
/// Other schemes such as `app:/` or `trash:/` are kept.
pub fn normalize_folder(folder: &str) -> String {
    let folder = folder.trim();
    let (scheme, relative) = match folder.split_once(':') {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme.bytes().all(|b| b.is_ascii_lowercase())
                && (rest.is_empty() || rest.starts_with('/')) =>
        {
            (scheme, rest)
        }
        _ => ("disk", folder),
    };
    format!("{scheme}:/{}", relative.trim_matches('/'))
}

/// Whether `path` (as returned by the API) lies under the normalized `folder`.
pub fn is_under(folder: &str, path: &str) -> bool {
    if folder.ends_with(":/") {
        return path.starts_with(folder);
    }
    path.strip_prefix(folder)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// An authorized handle to the API rooted at a base URL.
#[derive(Debug, Clone)]
pub struct Disk {
    client: Client,
    base: Url,
}

impl Disk {
    /// `client` should come from [`api_client`].
    ///
    /// # Errors
    ///
    /// If `base` is not an absolute URL.
    pub fn new(client: Client, base: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(anyhow::anyhow!("{base} cannot be used as a base URL"));
        }
        Ok(Self { client, base })
    }

    fn endpoint(&self, endpoint: &str, query: &[(&str, &str)]) -> Url {
        let mut target_url = self.base.clone();
        let path = format!("{}{endpoint}", self.base.path().trim_end_matches('/'));
        target_url.set_path(&path);
        target_url.query_pairs_mut().extend_pairs(query);
        target_url
    }

    /// Send `request`, turning any status outside `accepted` (or non-success when empty) into
    /// [`ApiError::Status`] with the response body attached.
    async fn send(
        endpoint: &'static str,
        request: RequestBuilder,
        accepted: &[StatusCode],
    ) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let ok = if accepted.is_empty() {
            status.is_success()
        } else {
            accepted.contains(&status)
        };
        if ok {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            endpoint,
            status,
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let request = self.client.get(self.endpoint(endpoint, query));
        Ok(Self::send(endpoint, request, &[]).await?.json().await?)
    }

    /// Request the direct download href of the file at `path`.
    pub async fn download_link(&self, path: &str) -> Result<data::Link, ApiError> {
        self.get_json(url::DOWNLOAD, &[("path", path)]).await
    }

    /// Publish the resource at `path`. Both `200 OK` and `202 Accepted` count as success.
    pub async fn publish(&self, path: &str) -> Result<(), ApiError> {
        let request = self
            .client
            .put(self.endpoint(url::PUBLISH, &[("path", path)]));
        Self::send(url::PUBLISH, request, &[StatusCode::OK, StatusCode::ACCEPTED]).await?;
        Ok(())
    }

    /// Read back the `public_url` of the resource at `path`, `None` if it isn't published.
    pub async fn public_url(&self, path: &str) -> Result<Option<String>, ApiError> {
        let meta: data::PublicMeta = self
            .get_json(url::RESOURCES, &[("path", path), ("fields", "public_url")])
            .await?;
        Ok(meta.public_url.filter(|public_url| !public_url.is_empty()))
    }
}

/// Which listing endpoint a [`Lister`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// [`url::RESOURCES`]: the direct children of the folder.
    Folder,
    /// [`url::FILES`]: every file on the disk, narrowed to the folder on our side.
    Files,
}

/// A Consuming-Builders style request for the items of a folder.
///
/// # Example
///
/// ```no_run
/// use reqwest::Client;
/// use yadisk_photos::api::{api_client, url, Disk, Lister, Listing};
/// use yadisk_photos::config::Token;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = api_client(Client::builder(), &Token::from("token"), 30)?;
///     let disk = Disk::new(client, url::BASE_URL)?;
///
///     let items = Lister::build(&disk, "disk:/Photos", 10, Listing::Folder)?
///         .run()
///         .await?;
///
///     Ok(())
/// }
/// ```
pub struct Lister<'a> {
    disk: &'a Disk,
    folder: String,
    limit: u32,
    listing: Listing,
}

impl Lister<'_> {
    /// `folder` is normalized with [`normalize_folder`].
    ///
    /// # Errors
    ///
    /// If `folder` is blank, or `limit` is not in the range `1..=1000`.
    pub fn build<'a>(
        disk: &'a Disk,
        folder: &str,
        limit: u32,
        listing: Listing,
    ) -> anyhow::Result<Lister<'a>> {
        if folder.trim().is_empty() {
            return Err(anyhow::anyhow!("Folder cannot be empty"));
        }
        if !matches!(limit, 1..=1000) {
            return Err(anyhow::anyhow!("Limit can only be between 1 and 1000"));
        }
        Ok(Lister {
            disk,
            folder: normalize_folder(folder),
            limit,
            listing,
        })
    }

    /// Send the listing request and return the raw items in API order.
    ///
    /// # Errors
    ///
    /// If the request fails, the status is not a success, or the body is not the expected JSON.
    pub async fn run(self) -> Result<Vec<Resource>, ApiError> {
        let limit = self.limit.to_string();
        match self.listing {
            Listing::Folder => {
                let fields = projection("_embedded.items.");
                let listing: data::FolderListing = self
                    .disk
                    .get_json(
                        url::RESOURCES,
                        &[
                            ("path", self.folder.as_str()),
                            ("limit", limit.as_str()),
                            ("fields", fields.as_str()),
                        ],
                    )
                    .await?;
                Ok(listing.embedded.items)
            }
            Listing::Files => {
                let fields = projection("items.");
                let listing: data::FileListing = self
                    .disk
                    .get_json(
                        url::FILES,
                        &[
                            ("path", self.folder.as_str()),
                            ("limit", limit.as_str()),
                            ("fields", fields.as_str()),
                        ],
                    )
                    .await?;
                let folder = self.folder;
                Ok(listing
                    .items
                    .into_iter()
                    .filter(|item| is_under(&folder, &item.path))
                    .collect())
            }
        }
    }
}
